use std::collections::HashMap;
use std::io::{self, Cursor, ErrorKind, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chartgh_domain::RepositoryRef;
use chartgh_store::ChartCache;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::deadline::Deadline;
use crate::effects::{AssetSource, CatalogSource, Effects, ReleaseAsset};
use crate::error::ChartError;

pub(crate) const ARTIFACT_LOCATOR: &str =
    "github.com/acme/app/releases/download/app-1.0.0/app-1.0.0.tgz";

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Catalog snapshot as Helm stores it after `helm repo add`.
pub(crate) fn snapshot_yaml(digest: &str) -> String {
    format!(
        "apiVersion: v1\nentries:\n  app:\n    - name: app\n      version: 1.0.0\n      urls:\n        - github://{ARTIFACT_LOCATOR}\n      digest: {digest}\n"
    )
}

#[derive(Clone)]
pub(crate) enum FakeBody {
    Complete(Vec<u8>),
    /// Yields the bytes, then fails with a connection reset.
    FailsAfter(Vec<u8>),
    /// Yields one chunk per read, sleeping before every chunk after the first.
    Slow(Vec<Vec<u8>>, Duration),
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    pub catalog: Option<Vec<u8>>,
    pub assets: Vec<ReleaseAsset>,
    pub bodies: HashMap<u64, FakeBody>,
    pub catalog_calls: AtomicUsize,
    pub asset_calls: AtomicUsize,
    pub requested_refs: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub(crate) fn with_asset(mut self, id: u64, url: &str, body: FakeBody) -> Self {
        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        self.assets.push(ReleaseAsset {
            id,
            name,
            browser_download_url: url.to_string(),
        });
        self.bodies.insert(id, body);
        self
    }

    pub(crate) fn asset_calls(&self) -> usize {
        self.asset_calls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for FakeRemote {
    fn fetch_document(
        &self,
        repo: &RepositoryRef,
        path: &str,
        git_ref: &str,
        _deadline: Deadline,
    ) -> Result<Vec<u8>, ChartError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_refs
            .lock()
            .expect("refs lock")
            .push(git_ref.to_string());
        self.catalog
            .clone()
            .ok_or_else(|| ChartError::not_found(format!("{path} in {repo}@{git_ref}")))
    }
}

impl AssetSource for FakeRemote {
    fn release_assets(
        &self,
        _repo: &RepositoryRef,
        _tag: &str,
        _deadline: Deadline,
    ) -> Result<Vec<ReleaseAsset>, ChartError> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.assets.clone())
    }

    fn open_asset(
        &self,
        _repo: &RepositoryRef,
        asset: &ReleaseAsset,
        _deadline: Deadline,
    ) -> Result<Box<dyn Read + Send>, ChartError> {
        self.asset_calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.get(&asset.id).cloned() {
            Some(FakeBody::Complete(bytes)) => Ok(Box::new(Cursor::new(bytes))),
            Some(FakeBody::FailsAfter(bytes)) => {
                Ok(Box::new(Cursor::new(bytes).chain(ResetReader)))
            }
            Some(FakeBody::Slow(chunks, pause)) => Ok(Box::new(SlowReader {
                chunks,
                pause,
                served: 0,
            })),
            None => Err(ChartError::not_found(asset.name.clone())),
        }
    }
}

struct ResetReader;

impl Read for ResetReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(ErrorKind::ConnectionReset, "connection reset"))
    }
}

struct SlowReader {
    chunks: Vec<Vec<u8>>,
    pause: Duration,
    served: usize,
}

impl Read for SlowReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.chunks.get(self.served) else {
            return Ok(0);
        };
        if self.served > 0 {
            thread::sleep(self.pause);
        }
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        self.served += 1;
        Ok(len)
    }
}

pub(crate) struct FakeEffects {
    pub remote: FakeRemote,
    cache: ChartCache,
    _root: TempDir,
}

impl FakeEffects {
    pub(crate) fn new(remote: FakeRemote) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = ChartCache::new(root.path());
        cache.ensure_layout().expect("cache layout");
        Self {
            remote,
            cache,
            _root: root,
        }
    }

    pub(crate) fn write_snapshot(&self, repository: &str, contents: &str) {
        std::fs::write(self.cache.snapshot_path(repository), contents).expect("write snapshot");
    }
}

impl Effects for FakeEffects {
    fn catalogs(&self) -> &dyn CatalogSource {
        &self.remote
    }

    fn assets(&self) -> &dyn AssetSource {
        &self.remote
    }

    fn cache(&self) -> &ChartCache {
        &self.cache
    }
}
