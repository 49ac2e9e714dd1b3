//! Chart archive retrieval through the local cache.
//!
//! A slot is served from disk only when its digest matches the digest the
//! catalog snapshot records for it. Anything else goes to the release asset,
//! streamed to the caller and into the slot at the same time. A failed fetch
//! never leaves a partial slot behind.

use std::io::{self, ErrorKind, Read, Write};

use chartgh_domain::{Catalog, ChartLocator, RepositoryRef};
use chartgh_store::{CacheSlot, ChartCache, TeeWriter};
use tracing::{debug, info, warn};

use crate::deadline::Deadline;
use crate::effects::{Effects, ReleaseAsset};
use crate::error::ChartError;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Cache,
    Remote,
}

impl ArtifactSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
        }
    }
}

/// What a successful retrieval wrote to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReport {
    pub artifact: String,
    pub source: ArtifactSource,
    pub bytes: u64,
    pub digest: String,
}

/// Writes the chart archive named by `locator` to `out`.
///
/// # Errors
/// `InvalidLocator` when no repository or artifact name can be derived,
/// `NotFound` when the release has no matching asset, and
/// `DigestMismatchAfterFetch` when the fetched bytes disagree with the
/// snapshot. Bytes already written to `out` are not retracted.
pub fn resolve_artifact(
    effects: &dyn Effects,
    locator: &ChartLocator,
    out: &mut dyn Write,
    deadline: Deadline,
) -> Result<ArtifactReport, ChartError> {
    let repo = locator
        .repository()
        .ok_or_else(|| ChartError::InvalidLocator(locator.to_string()))?;
    let artifact = locator.artifact_name();
    if artifact.is_empty() {
        return Err(ChartError::InvalidLocator(locator.to_string()));
    }

    let cache = effects.cache();
    let expected = expected_digest(cache, &repo, locator);
    let slot = cache.slot(artifact);
    slot.open_or_create()
        .map_err(|err| ChartError::io(format!("opening {}", slot.path().display()), err))?;

    if let Some(report) = serve_cached(&slot, expected.as_deref(), out)? {
        return Ok(report);
    }

    match fetch_into_slot(effects, &repo, locator, &slot, expected.as_deref(), out, deadline) {
        Ok(report) => Ok(report),
        Err(err) => {
            debug!(artifact, error = %err, "discarding cache slot after failed fetch");
            if let Err(cleanup) = slot.remove() {
                warn!(
                    slot = %slot.path().display(),
                    error = %cleanup,
                    "failed to remove cache slot"
                );
            }
            Err(err)
        }
    }
}

/// Digest recorded for `locator` in the repository's catalog snapshot.
///
/// A missing or unreadable snapshot only costs a cache hit, so problems are
/// logged and treated as "no digest".
fn expected_digest(
    cache: &ChartCache,
    repo: &RepositoryRef,
    locator: &ChartLocator,
) -> Option<String> {
    let raw = match cache.read_snapshot(&repo.name) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(repository = %repo.name, "no catalog snapshot");
            return None;
        }
        Err(err) => {
            warn!(repository = %repo.name, error = %err, "unreadable catalog snapshot");
            return None;
        }
    };
    let catalog = match Catalog::from_yaml(&raw) {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(repository = %repo.name, error = %err, "malformed catalog snapshot");
            return None;
        }
    };
    let mut matches = catalog.records_matching_suffix(locator.as_str());
    let record = matches.next()?;
    if matches.next().is_some() {
        debug!(locator = %locator, version = %record.version, "several snapshot records match; using the first");
    }
    let digest = record.digest.trim().to_ascii_lowercase();
    (!digest.is_empty()).then_some(digest)
}

fn serve_cached(
    slot: &CacheSlot,
    expected: Option<&str>,
    out: &mut dyn Write,
) -> Result<Option<ArtifactReport>, ChartError> {
    let slot_io = |err: io::Error| ChartError::io(format!("reading {}", slot.path().display()), err);
    let Some(expected) = expected else {
        debug!(artifact = slot.name(), "no recorded digest; cache slot not trusted");
        return Ok(None);
    };
    if slot.is_empty().map_err(slot_io)? {
        return Ok(None);
    }
    let actual = slot.digest().map_err(slot_io)?;
    if actual != expected {
        debug!(artifact = slot.name(), expected, actual = %actual, "stale cache slot");
        return Ok(None);
    }
    let mut reader = slot.reader().map_err(slot_io)?;
    let bytes = io::copy(&mut reader, out)
        .map_err(|err| ChartError::io(format!("serving {} from cache", slot.name()), err))?;
    info!(artifact = slot.name(), bytes, "served chart from cache");
    Ok(Some(ArtifactReport {
        artifact: slot.name().to_string(),
        source: ArtifactSource::Cache,
        bytes,
        digest: actual,
    }))
}

fn fetch_into_slot(
    effects: &dyn Effects,
    repo: &RepositoryRef,
    locator: &ChartLocator,
    slot: &CacheSlot,
    expected: Option<&str>,
    out: &mut dyn Write,
    deadline: Deadline,
) -> Result<ArtifactReport, ChartError> {
    let tag = slot.name();
    let assets = effects.assets().release_assets(repo, tag, deadline)?;
    let asset = select_asset(&assets, locator).ok_or_else(|| {
        ChartError::not_found(format!("asset '{locator}' in release {tag} of {repo}"))
    })?;
    info!(%repo, tag, asset = %asset.name, "fetching chart from GitHub");

    let mut body = effects.assets().open_asset(repo, asset, deadline)?;
    let file = slot
        .writer()
        .map_err(|err| ChartError::io(format!("writing {}", slot.path().display()), err))?;
    let mut tee = TeeWriter::new(file, &mut *out);
    let context = format!("downloading {}", asset.name);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        deadline.check(&context)?;
        let read = match body.read(&mut buffer) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(read_error(err, deadline, &context)),
        };
        if read == 0 {
            break;
        }
        tee.write_all(&buffer[..read])
            .map_err(|err| ChartError::io(format!("writing {}", asset.name), err))?;
    }
    tee.flush()
        .map_err(|err| ChartError::io(format!("flushing {}", asset.name), err))?;
    let (bytes, actual) = tee.finish();

    if let Some(expected) = expected {
        if actual != expected {
            return Err(ChartError::DigestMismatchAfterFetch {
                artifact: tag.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }
    info!(artifact = tag, bytes, digest = %actual, "cached chart");
    Ok(ArtifactReport {
        artifact: tag.to_string(),
        source: ArtifactSource::Remote,
        bytes,
        digest: actual,
    })
}

/// First asset whose browser download URL ends with the locator.
fn select_asset<'a>(assets: &'a [ReleaseAsset], locator: &ChartLocator) -> Option<&'a ReleaseAsset> {
    let mut matches = assets
        .iter()
        .filter(|asset| asset.browser_download_url.ends_with(locator.as_str()));
    let first = matches.next()?;
    if matches.next().is_some() {
        debug!(locator = %locator, asset = %first.name, "several release assets match; using the first");
    }
    Some(first)
}

fn read_error(err: io::Error, deadline: Deadline, context: &str) -> ChartError {
    if deadline.is_expired() || err.kind() == ErrorKind::TimedOut {
        return ChartError::DeadlineExceeded {
            context: context.to_string(),
        };
    }
    ChartError::io(context, err)
}
