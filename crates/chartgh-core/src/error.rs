use std::io;

use chartgh_domain::InvalidLink;

/// Failures surfaced by a retrieval. None of them are retried here.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("GitHub rejected the credentials for {what} (HTTP {status})")]
    Auth { what: String, status: u16 },
    #[error("invalid chart catalog: {0}")]
    Parse(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("digest mismatch for {artifact} after fetch (expected {expected}, got {actual})")]
    DigestMismatchAfterFetch {
        artifact: String,
        expected: String,
        actual: String,
    },
    #[error("deadline exceeded while {context}")]
    DeadlineExceeded { context: String },
    #[error("cannot derive a GitHub owner and repository from '{0}'")]
    InvalidLocator(String),
    #[error("GitHub request for {what} failed: {detail}")]
    Remote { what: String, detail: String },
}

impl ChartError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not-found",
            Self::Auth { .. } => "auth",
            Self::Parse(_) => "parse",
            Self::Io { .. } => "io",
            Self::DigestMismatchAfterFetch { .. } => "digest-mismatch",
            Self::DeadlineExceeded { .. } => "deadline",
            Self::InvalidLocator(_) => "invalid-locator",
            Self::Remote { .. } => "remote",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

impl From<InvalidLink> for ChartError {
    fn from(err: InvalidLink) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChartError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
