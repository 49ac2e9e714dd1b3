//! Chart repository catalog (`index.yaml`).
//!
//! Only the fields the plugin acts on are typed. Everything else a chart
//! repository publishes (descriptions, maintainers, dependencies, keys we do
//! not know about) is carried through verbatim in an opaque map so that the
//! rewritten catalog loses nothing Helm needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use time::OffsetDateTime;

use crate::uri::{translate_link, InvalidLink};
use crate::version::sort_versions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub api_version: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub generated: Option<OffsetDateTime>,
    /// Package name to published versions. Sorted by name, so iteration and
    /// serialization are deterministic.
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<VersionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One published version of one chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
    /// Chart metadata the plugin never interprets.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl Catalog {
    /// Parses a catalog document. Missing `apiVersion` or mistyped known
    /// fields are errors; unknown keys are kept.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(bytes)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Routes every origin link through the plugin scheme.
    pub fn translate_links(&mut self) -> Result<(), InvalidLink> {
        for records in self.entries.values_mut() {
            for record in records.iter_mut() {
                for url in &mut record.urls {
                    *url = translate_link(url)?;
                }
            }
        }
        Ok(())
    }

    /// Orders each package's versions newest first.
    pub fn sort_entries(&mut self) {
        for records in self.entries.values_mut() {
            sort_versions(records);
        }
    }

    /// Records with a URL ending in `suffix`, in package-name order and then
    /// record order.
    pub fn records_matching_suffix<'a>(
        &'a self,
        suffix: &'a str,
    ) -> impl Iterator<Item = &'a VersionRecord> + 'a {
        self.entries
            .values()
            .flatten()
            .filter(move |record| record.urls.iter().any(|url| url.ends_with(suffix)))
    }

    pub fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
apiVersion: v1
generated: "2024-03-01T10:00:00.123456789Z"
serverInfo:
  contextPath: /charts
annotations:
  owner: platform
entries:
  app:
    - name: app
      version: 1.2.0
      description: Demo application
      maintainers:
        - name: ops
          email: ops@example.com
      urls:
        - https://github.com/acme/app/releases/download/app-1.2.0/app-1.2.0.tgz
      created: "2024-02-01T10:00:00Z"
      digest: aaaa
    - name: app
      version: 1.10.0
      urls:
        - https://github.com/acme/app/releases/download/app-1.10.0/app-1.10.0.tgz
        - https://mirror.example.com/app-1.10.0.tgz
      digest: bbbb
    - name: app
      version: bad-version
      urls:
        - charts/app-bad.tgz
  db:
    - name: db
      version: 0.1.0
      urls:
        - http://github.com/acme/app/releases/download/db-0.1.0/db-0.1.0.tgz
      removed: true
      dependencies:
        - name: common
          repository: https://example.com/charts
"#;

    fn versions<'a>(catalog: &'a Catalog, name: &str) -> Vec<&'a str> {
        catalog.entries[name]
            .iter()
            .map(|r| r.version.as_str())
            .collect()
    }

    #[test]
    fn parses_known_and_opaque_fields() {
        let catalog = Catalog::from_yaml(INDEX.as_bytes()).expect("catalog");
        assert_eq!(catalog.api_version, "v1");
        assert!(catalog.generated.is_some());
        assert_eq!(catalog.annotations["owner"], "platform");
        assert!(catalog.server_info.is_some());
        assert_eq!(catalog.version_count(), 4);

        let app = &catalog.entries["app"][0];
        assert_eq!(app.digest, "aaaa");
        assert!(app.created.is_some());
        assert_eq!(
            app.metadata["description"],
            Value::String("Demo application".into())
        );
        assert!(catalog.entries["db"][0].removed);
        assert!(catalog.entries["db"][0].metadata.contains_key("dependencies"));
    }

    #[test]
    fn rejects_structurally_invalid_documents() {
        assert!(Catalog::from_yaml(b"entries: {}\n").is_err(), "apiVersion required");
        assert!(Catalog::from_yaml(b"apiVersion: v1\nentries: nope\n").is_err());
        assert!(
            Catalog::from_yaml(b"apiVersion: v1\nentries:\n  app:\n    - urls: 3\n").is_err()
        );
        assert!(Catalog::from_yaml(b"apiVersion: v1\ngenerated: yesterday\n").is_err());
        assert!(Catalog::from_yaml(b"apiVersion: v1\n").is_ok());
    }

    #[test]
    fn translate_and_sort_rewrites_origin_links() {
        let parsed = Catalog::from_yaml(INDEX.as_bytes()).expect("catalog");
        let mut catalog = parsed.clone();
        catalog.translate_links().expect("translate");
        catalog.sort_entries();

        assert_eq!(versions(&catalog, "app"), ["1.10.0", "1.2.0", "bad-version"]);
        let newest = &catalog.entries["app"][0];
        assert_eq!(
            newest.urls,
            [
                "github://github.com/acme/app/releases/download/app-1.10.0/app-1.10.0.tgz",
                "https://mirror.example.com/app-1.10.0.tgz",
            ]
        );
        assert_eq!(catalog.entries["app"][2].urls, ["charts/app-bad.tgz"]);
        assert_eq!(
            catalog.entries["db"][0].urls,
            ["github://github.com/acme/app/releases/download/db-0.1.0/db-0.1.0.tgz"]
        );
        assert_eq!(catalog.annotations, parsed.annotations);
        assert_eq!(catalog.server_info, parsed.server_info);
    }

    #[test]
    fn rewriting_twice_changes_nothing() {
        let mut once = Catalog::from_yaml(INDEX.as_bytes()).expect("catalog");
        once.translate_links().expect("translate");
        once.sort_entries();
        let mut twice = once.clone();
        twice.translate_links().expect("translate");
        twice.sort_entries();
        assert_eq!(once, twice);
    }

    #[test]
    fn serialized_catalog_parses_back() {
        let mut catalog = Catalog::from_yaml(INDEX.as_bytes()).expect("catalog");
        catalog.translate_links().expect("translate");
        catalog.sort_entries();
        let rendered = catalog.to_yaml().expect("render");
        assert!(rendered.contains("apiVersion: v1"));
        assert!(!rendered.contains("https://github.com/"));
        let reparsed = Catalog::from_yaml(rendered.as_bytes()).expect("reparse");
        assert_eq!(reparsed, catalog);
    }

    #[test]
    fn suffix_lookup_returns_first_match_in_name_order() {
        let catalog = Catalog::from_yaml(INDEX.as_bytes()).expect("catalog");
        let mut hits = catalog.records_matching_suffix("app-1.10.0/app-1.10.0.tgz");
        assert_eq!(hits.next().map(|r| r.digest.as_str()), Some("bbbb"));
        assert!(hits.next().is_none());
        assert_eq!(catalog.records_matching_suffix("missing.tgz").count(), 0);
    }
}
