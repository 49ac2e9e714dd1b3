//! Local chart cache: digest computation and per-artifact cache slots.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

const CHART_DIR: [&str; 2] = ["github", "chart"];
const CHART_EXTENSION: &str = "tgz";
const SNAPSHOT_SUFFIX: &str = "-index.yaml";
const BUFFER_SIZE: usize = 64 * 1024;

/// Where the cache root came from, for diagnostics.
#[derive(Debug, Clone)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Resolves the cache root: an explicit override, otherwise the platform
/// user cache directory.
pub fn resolve_cache_root(override_path: Option<&Path>) -> Result<CacheLocation> {
    if let Some(path) = override_path {
        return Ok(CacheLocation {
            path: absolutize(path.to_path_buf())?,
            source: "HELM_REPOSITORY_CACHE",
        });
    }
    let base = dirs_next::cache_dir()
        .ok_or_else(|| anyhow!("unable to determine the user cache directory"))?;
    Ok(CacheLocation {
        path: base,
        source: "user cache dir",
    })
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// SHA-256 of everything `reader` yields, as lowercase hex.
///
/// Reads in fixed-size chunks, so input size is unbounded. Read errors are
/// returned, never mistaken for end of input.
pub fn digest<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn digest_file(path: &Path) -> io::Result<String> {
    digest(File::open(path)?)
}

/// Repository cache shared with Helm.
///
/// Helm keeps `<repo>-index.yaml` snapshots directly under the root; chart
/// archives live under `github/chart/<artifact>.tgz`.
#[derive(Debug, Clone)]
pub struct ChartCache {
    root: PathBuf,
}

impl ChartCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chart_dir(&self) -> PathBuf {
        CHART_DIR
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Creates the chart directory if it does not exist yet.
    pub fn ensure_layout(&self) -> Result<()> {
        let dir = self.chart_dir();
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))
    }

    pub fn slot(&self, artifact: &str) -> CacheSlot {
        CacheSlot {
            name: artifact.to_string(),
            path: self
                .chart_dir()
                .join(format!("{artifact}.{CHART_EXTENSION}")),
        }
    }

    pub fn snapshot_path(&self, repository: &str) -> PathBuf {
        self.root.join(format!("{repository}{SNAPSHOT_SUFFIX}"))
    }

    /// Raw bytes of the catalog snapshot Helm stored for `repository`, if any.
    pub fn read_snapshot(&self, repository: &str) -> Result<Option<Vec<u8>>> {
        let path = self.snapshot_path(repository);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }
}

/// The single on-disk copy of one artifact, addressed by artifact name.
#[derive(Debug, Clone)]
pub struct CacheSlot {
    name: String,
    path: PathBuf,
}

impl CacheSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the slot, creating an empty file on first use.
    pub fn open_or_create(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
    }

    pub fn len(&self) -> io::Result<u64> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err),
        }
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn digest(&self) -> io::Result<String> {
        digest_file(&self.path)
    }

    pub fn reader(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    /// Truncates the slot and returns a handle positioned at the start.
    pub fn writer(&self) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
    }

    /// Deletes the slot. A slot that is already gone is not an error.
    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(slot = %self.path.display(), "removed cache slot");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Writes every chunk to the cache file and to the caller before returning,
/// hashing what passes through.
pub struct TeeWriter<A, B> {
    cache: A,
    out: B,
    hasher: Sha256,
    written: u64,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    pub fn new(cache: A, out: B) -> Self {
        Self {
            cache,
            out,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Bytes written and their lowercase hex SHA-256.
    pub fn finish(self) -> (u64, String) {
        (self.written, hex::encode(self.hasher.finalize()))
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cache.write_all(buf)?;
        self.out.write_all(buf)?;
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.cache.flush()?;
        self.out.flush()
    }
}
