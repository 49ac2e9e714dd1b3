#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

mod artifact;
mod catalog;
mod config;
mod deadline;
mod effects;
mod error;
mod github;
mod retrieve;
#[cfg(test)]
mod test_support;

pub use crate::artifact::{resolve_artifact, ArtifactReport, ArtifactSource};
pub use crate::catalog::{fetch_and_translate, render_catalog, translate_catalog};
pub use crate::config::{CacheConfig, Config, GithubConfig, IndexConfig, LoggingConfig};
pub use crate::deadline::Deadline;
pub use crate::effects::{AssetSource, CatalogSource, Effects, ReleaseAsset, SystemEffects};
pub use crate::error::ChartError;
pub use crate::github::GithubClient;
pub use crate::retrieve::{retrieve, RetrieveRequest, Retrieval};
