#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod catalog;
pub mod uri;
pub mod version;

pub use catalog::{Catalog, VersionRecord};
pub use uri::{
    parse_artifact_name, parse_owner_repository, translate_link, ChartLocator, InvalidLink,
    RepositoryRef, CATALOG_FILENAME, GITHUB_HOST, SCHEME,
};
pub use version::{parse_chart_version, sort_versions};
