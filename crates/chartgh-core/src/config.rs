use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use chartgh_store::{resolve_cache_root, CacheLocation};

use crate::deadline::MAX_BUDGET;

const TOKEN_ENV: &str = "GITHUB_TOKEN";
const TOKEN_FILE_ENV: &str = "GIT_ASKPASS";
const CACHE_ENV: &str = "HELM_REPOSITORY_CACHE";
const INDEX_BRANCH_ENV: &str = "HELMGITHUB_INDEX_BRANCH";
const DEBUG_LOG_ENV: &str = "HELMGITHUB_DEBUG_LOG";
const TIMEOUT_ENV: &str = "HELMGITHUB_TIMEOUT";
const API_URL_ENV: &str = "HELMGITHUB_API_URL";

const DEFAULT_INDEX_BRANCH: &str = "gh-pages";
const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Variables whose name or value is not UTF-8 are skipped.
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Settings resolved once at startup and threaded into every component.
#[derive(Debug)]
pub struct Config {
    pub(crate) github: GithubConfig,
    pub(crate) cache: CacheConfig,
    pub(crate) index: IndexConfig,
    pub(crate) logging: LoggingConfig,
    pub(crate) timeout: Duration,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error when no token is available, the token file cannot be
    /// read, the cache root cannot be resolved, or the timeout is malformed.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> anyhow::Result<Self> {
        let cache_override = snapshot.var(CACHE_ENV).map(Path::new);
        Ok(Self {
            github: GithubConfig {
                token: load_token(snapshot)?,
                api_url: snapshot
                    .var(API_URL_ENV)
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or(DEFAULT_API_URL)
                    .to_string(),
            },
            cache: CacheConfig {
                location: resolve_cache_root(cache_override)?,
            },
            index: IndexConfig {
                git_ref: snapshot
                    .var(INDEX_BRANCH_ENV)
                    .unwrap_or(DEFAULT_INDEX_BRANCH)
                    .to_string(),
            },
            logging: LoggingConfig {
                debug_log: snapshot
                    .var(DEBUG_LOG_ENV)
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from),
            },
            timeout: match snapshot.var(TIMEOUT_ENV) {
                Some(raw) => parse_timeout(raw)?,
                None => DEFAULT_TIMEOUT,
            },
        })
    }

    #[must_use]
    pub fn github(&self) -> &GithubConfig {
        &self.github
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn index(&self) -> &IndexConfig {
        &self.index
    }

    #[must_use]
    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn load_token(snapshot: &EnvSnapshot) -> anyhow::Result<String> {
    if let Some(token) = snapshot.var(TOKEN_ENV) {
        return Ok(token.trim().to_string());
    }
    if let Some(path) = snapshot.var(TOKEN_FILE_ENV) {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading GitHub token from {TOKEN_FILE_ENV}={path}"))?;
        return Ok(contents.trim().to_string());
    }
    bail!("GitHub token not found: set {TOKEN_ENV} or point {TOKEN_FILE_ENV} at a token file")
}

fn parse_timeout(raw: &str) -> anyhow::Result<Duration> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("{TIMEOUT_ENV} must be a whole number of seconds, got '{raw}'"))?;
    if secs == 0 {
        bail!("{TIMEOUT_ENV} must be greater than zero");
    }
    if secs > MAX_BUDGET.as_secs() {
        bail!(
            "{TIMEOUT_ENV} must be at most {} seconds, got {secs}",
            MAX_BUDGET.as_secs()
        );
    }
    Ok(Duration::from_secs(secs))
}

pub struct GithubConfig {
    pub token: String,
    pub api_url: String,
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug)]
pub struct CacheConfig {
    pub location: CacheLocation,
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub git_ref: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub debug_log: Option<PathBuf>,
}

impl LoggingConfig {
    #[must_use]
    pub fn debug_log(&self) -> Option<&Path> {
        self.debug_log.as_deref()
    }
}
