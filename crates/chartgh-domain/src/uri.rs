//! Mapping between GitHub locators and the `github://` scheme Helm hands us.
//!
//! Locators look like `github.com/<owner>/<repo>/releases/download/<tag>/<file>`
//! once the scheme is stripped. The release tag is, by convention, the file
//! name without its final extension.

use std::fmt;

use url::Url;

/// Host of the origin whose links get routed through the plugin.
pub const GITHUB_HOST: &str = "github.com";
/// Scheme registered by the plugin's downloader.
pub const SCHEME: &str = "github";
/// Well-known name of a repository catalog.
pub const CATALOG_FILENAME: &str = "index.yaml";

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("invalid chart link '{link}': {source}")]
pub struct InvalidLink {
    pub link: String,
    #[source]
    pub source: url::ParseError,
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A retrieval target with the `github://` prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartLocator {
    path: String,
}

impl ChartLocator {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let path = trimmed
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .unwrap_or(trimmed);
        Self {
            path: path.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// True when the final path segment names the repository catalog.
    pub fn is_catalog(&self) -> bool {
        last_segment(strip_query(&self.path)) == CATALOG_FILENAME
    }

    /// Owner and repository, or `None` when either cannot be derived.
    pub fn repository(&self) -> Option<RepositoryRef> {
        let (owner, name) = parse_owner_repository(&self.path);
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(RepositoryRef { owner, name })
    }

    pub fn artifact_name(&self) -> &str {
        parse_artifact_name(&self.path)
    }
}

impl fmt::Display for ChartLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Returns the first two path segments after the GitHub host.
///
/// Never fails: anything with fewer than two non-empty segments yields a pair
/// of empty strings, which callers must reject.
pub fn parse_owner_repository(uri: &str) -> (String, String) {
    let trimmed = uri
        .strip_prefix(GITHUB_HOST)
        .unwrap_or(uri)
        .trim_start_matches('/');
    let mut segments = strip_query(trimmed).split('/');
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repository)) if !owner.is_empty() && !repository.is_empty() => {
            (owner.to_string(), repository.to_string())
        }
        _ => (String::new(), String::new()),
    }
}

/// File name of the locator without its final extension; doubles as the
/// release tag.
pub fn parse_artifact_name(uri: &str) -> &str {
    let file = last_segment(uri);
    match file.rfind('.') {
        Some(idx) => &file[..idx],
        None => file,
    }
}

/// Rewrites `http(s)://github.com/...` links to the plugin scheme.
///
/// Host, path, query and fragment are kept byte-for-byte. Links to other
/// hosts, relative links and links already using the plugin scheme come back
/// unchanged.
pub fn translate_link(link: &str) -> Result<String, InvalidLink> {
    let parsed = match Url::parse(link) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => return Ok(link.to_string()),
        Err(source) => {
            return Err(InvalidLink {
                link: link.to_string(),
                source,
            })
        }
    };
    let is_origin = matches!(parsed.scheme(), "http" | "https")
        && parsed.host_str() == Some(GITHUB_HOST)
        && parsed.port().is_none();
    if !is_origin {
        return Ok(link.to_string());
    }
    match link.split_once(':') {
        Some((_, rest)) => Ok(format!("{SCHEME}:{rest}")),
        None => Ok(link.to_string()),
    }
}

fn strip_query(uri: &str) -> &str {
    uri.split(|c: char| c == '?' || c == '#').next().unwrap_or_default()
}

fn last_segment(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}
