use chartgh_domain::{Catalog, ChartLocator, CATALOG_FILENAME};
use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::effects::Effects;
use crate::error::ChartError;

/// Fetches the repository catalog at `git_ref` and routes its links through
/// the plugin scheme, newest versions first.
pub fn fetch_and_translate(
    effects: &dyn Effects,
    locator: &ChartLocator,
    git_ref: &str,
    deadline: Deadline,
) -> Result<Catalog, ChartError> {
    let repo = locator
        .repository()
        .ok_or_else(|| ChartError::InvalidLocator(locator.to_string()))?;
    let raw = effects
        .catalogs()
        .fetch_document(&repo, CATALOG_FILENAME, git_ref, deadline)?;
    debug!(%repo, git_ref, bytes = raw.len(), "fetched catalog");
    let catalog = translate_catalog(&raw)?;
    info!(
        %repo,
        packages = catalog.entries.len(),
        versions = catalog.version_count(),
        "translated catalog"
    );
    Ok(catalog)
}

/// Parses a raw catalog, rewrites its links and sorts its versions.
pub fn translate_catalog(raw: &[u8]) -> Result<Catalog, ChartError> {
    let mut catalog = Catalog::from_yaml(raw)?;
    catalog.translate_links()?;
    catalog.sort_entries();
    Ok(catalog)
}

pub fn render_catalog(catalog: &Catalog) -> Result<String, ChartError> {
    Ok(catalog.to_yaml()?)
}
