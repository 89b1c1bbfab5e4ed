//! Error types for cairn-store.

use std::path::PathBuf;

use thiserror::Error;

use cairn_core::ReleaseError;

/// All errors that can arise from loading, reconciling and storing documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An error from validation or reconciliation.
    #[error(transparent)]
    Release(#[from] ReleaseError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request failed for a reason other than 404.
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// `ssh` / `scp` could not be run or exited non-zero.
    #[error("{command} failed: {detail}")]
    Transfer { command: String, detail: String },

    /// The release manifest for the requested build does not exist.
    #[error("release manifest not found at {location}")]
    ManifestNotFound { location: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// `true` when the underlying failure is a reconciliation conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Release(err) if err.is_conflict())
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
