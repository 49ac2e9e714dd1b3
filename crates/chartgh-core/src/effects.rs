use std::io::Read;
use std::sync::Arc;

use chartgh_domain::RepositoryRef;
use chartgh_store::ChartCache;
use serde::Deserialize;

use crate::config::Config;
use crate::deadline::Deadline;
use crate::error::ChartError;
use crate::github::GithubClient;

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    pub browser_download_url: String,
}

pub trait CatalogSource: Send + Sync {
    /// Raw bytes of `path` in `repo` at `git_ref`.
    fn fetch_document(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: &str,
        deadline: Deadline,
    ) -> Result<Vec<u8>, ChartError>;
}

pub trait AssetSource: Send + Sync {
    fn release_assets(
        &self,
        repo: &RepositoryRef,
        tag: &str,
        deadline: Deadline,
    ) -> Result<Vec<ReleaseAsset>, ChartError>;

    fn open_asset(
        &self,
        repo: &RepositoryRef,
        asset: &ReleaseAsset,
        deadline: Deadline,
    ) -> Result<Box<dyn Read + Send>, ChartError>;
}

pub trait Effects: Send + Sync {
    fn catalogs(&self) -> &dyn CatalogSource;
    fn assets(&self) -> &dyn AssetSource;
    fn cache(&self) -> &ChartCache;
}

/// Production collaborators: one GitHub client and the on-disk cache.
pub struct SystemEffects {
    github: Arc<GithubClient>,
    cache: ChartCache,
}

impl SystemEffects {
    /// Builds the GitHub client and makes sure the chart directory exists.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built or the cache
    /// directory cannot be created.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let github = GithubClient::new(&config.github().api_url, &config.github().token)?;
        let cache = ChartCache::new(&config.cache().location.path);
        cache.ensure_layout()?;
        Ok(Self {
            github: Arc::new(github),
            cache,
        })
    }
}

impl Effects for SystemEffects {
    fn catalogs(&self) -> &dyn CatalogSource {
        self.github.as_ref()
    }

    fn assets(&self) -> &dyn AssetSource {
        self.github.as_ref()
    }

    fn cache(&self) -> &ChartCache {
        &self.cache
    }
}
