use std::io::Write;

use chartgh_domain::ChartLocator;
use tracing::debug;

use crate::artifact::{resolve_artifact, ArtifactReport};
use crate::catalog::{fetch_and_translate, render_catalog};
use crate::deadline::Deadline;
use crate::effects::Effects;
use crate::error::ChartError;

/// One downloader invocation: Helm hands us a single URL per process.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    pub url: String,
    /// Branch or tag the catalog is read from.
    pub git_ref: String,
    pub deadline: Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    Catalog { repository: String, versions: usize },
    Artifact(ArtifactReport),
}

/// Routes the request to the catalog or the artifact flow and writes the
/// result to `out`.
///
/// A catalog is rendered completely before the first byte is written, so a
/// failed catalog retrieval leaves `out` untouched.
///
/// # Errors
/// Propagates the failure of whichever flow handled the request.
pub fn retrieve(
    effects: &dyn Effects,
    request: &RetrieveRequest,
    out: &mut dyn Write,
) -> Result<Retrieval, ChartError> {
    let locator = ChartLocator::parse(&request.url);
    if locator.is_catalog() {
        debug!(%locator, git_ref = %request.git_ref, "retrieving catalog");
        let catalog = fetch_and_translate(effects, &locator, &request.git_ref, request.deadline)?;
        let rendered = render_catalog(&catalog)?;
        out.write_all(rendered.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|err| ChartError::io("writing catalog", err))?;
        let repository = locator
            .repository()
            .map(|repo| repo.to_string())
            .unwrap_or_default();
        return Ok(Retrieval::Catalog {
            repository,
            versions: catalog.version_count(),
        });
    }

    debug!(%locator, "retrieving artifact");
    let report = resolve_artifact(effects, &locator, out, request.deadline)?;
    out.flush()
        .map_err(|err| ChartError::io("flushing artifact", err))?;
    Ok(Retrieval::Artifact(report))
}
