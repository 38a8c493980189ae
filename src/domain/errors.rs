//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use crate::domain::VodId;
use thiserror::Error;

/// Classified failure of a single page fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection errors, 429 and 5xx. Safe to retry.
    #[error("transient: {0}")]
    Transient(String),

    /// Bad request, auth failure, not found, malformed response. Never retried.
    #[error("fatal: {0}")]
    Fatal(String),

    /// Caller aborted the wait or the in-flight request.
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum DomainError {
    /// A page failed terminally; `offset` is where a manual resume would start.
    #[error("chat download for VOD {vod_id} failed at offset {offset}s: {source}")]
    Chat {
        vod_id: VodId,
        offset: u64,
        #[source]
        source: FetchError,
    },

    #[error("cancelled at offset {offset}s")]
    Cancelled { offset: u64 },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Video download failed: {0}")]
    Video(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("UI error: {0}")]
    Ui(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl DomainError {
    /// The classified page error behind a failed chat run, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            DomainError::Chat { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled { .. })
    }
}
