//! Error types for cairn-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from release validation, reconciliation and
/// configuration loading.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A required input (stream, version, metadata base, ...) was not supplied.
    #[error("missing required value: {field}")]
    MissingField { field: &'static str },

    /// The manifest names a different stream than the one requested.
    #[error("manifest belongs to stream {found:?}, expected {expected:?}")]
    StreamMismatch { expected: String, found: String },

    /// A manifest architecture carries no commit checksum.
    #[error("architecture {architecture} has no commit checksum")]
    EmptyCommit { architecture: String },

    /// A release entry lists more than one commit for the same architecture.
    #[error("release {version} lists architecture {architecture} more than once")]
    DuplicateArchitecture {
        version: String,
        architecture: String,
    },

    /// The build is already recorded, but not as the latest release.
    #[error("build {version} is already present at position {position} of {total} and is not the latest release")]
    NotLatest {
        version: String,
        position: usize,
        total: usize,
    },

    /// The build is the latest release, but the candidate commits do not
    /// extend the recorded ones.
    #[error("build {version} is present but its commit hashes are not a superset of the latest release")]
    CommitsNotSuperset { version: String },

    /// The release index has no entries to select from.
    #[error("release index for stream {stream:?} has no releases")]
    NoReleases { stream: String },

    /// A JSON document failed to parse.
    #[error("failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error on config load — includes the file path.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Underlying I/O failure while reading configuration.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.cairn/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

impl ReleaseError {
    /// `true` for the reconciler's fatal outcomes. The index must not be
    /// persisted when one of these is returned.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ReleaseError::NotLatest { .. } | ReleaseError::CommitsNotSuperset { .. }
        )
    }

    /// `true` for missing or contradictory input detected before any
    /// reconciliation runs.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReleaseError::MissingField { .. }
                | ReleaseError::StreamMismatch { .. }
                | ReleaseError::EmptyCommit { .. }
                | ReleaseError::DuplicateArchitecture { .. }
        )
    }
}

pub(crate) fn parse_err(what: impl Into<String>, source: serde_json::Error) -> ReleaseError {
    ReleaseError::Parse {
        what: what.into(),
        source,
    }
}
