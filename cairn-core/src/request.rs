//! Release request: which build of which stream an invocation acts on.

use crate::error::ReleaseError;
use crate::types::{ReleaseManifest, StaticReleaseInfo};

// ---------------------------------------------------------------------------
// Storage keys (relative to a backend root)
// ---------------------------------------------------------------------------

/// `<stream>/builds/<version>/release.json`
pub fn manifest_key(stream: &str, version: &str) -> String {
    format!("{stream}/builds/{version}/release.json")
}

/// `<stream>/releases.json`
pub fn index_key(stream: &str) -> String {
    format!("{stream}/releases.json")
}

/// `<stream>.json`
pub fn stream_metadata_key(stream: &str) -> String {
    format!("{stream}.json")
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Explicit inputs of one invocation, validated before any core work runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub stream: String,
    pub version: String,
    /// Public base under which `<stream>/builds/<version>/release.json` is
    /// served; used to build the index entry's metadata URL.
    pub metadata_base: String,
}

impl ReleaseRequest {
    /// Build a request, rejecting blank fields.
    pub fn new(
        stream: impl Into<String>,
        version: impl Into<String>,
        metadata_base: impl Into<String>,
    ) -> Result<Self, ReleaseError> {
        let request = Self {
            stream: stream.into().trim_matches('/').to_string(),
            version: version.into().trim().to_string(),
            metadata_base: metadata_base.into().trim_end_matches('/').to_string(),
        };
        if request.stream.is_empty() {
            return Err(ReleaseError::MissingField { field: "stream" });
        }
        if request.version.is_empty() {
            return Err(ReleaseError::MissingField { field: "version" });
        }
        if request.metadata_base.is_empty() {
            return Err(ReleaseError::MissingField {
                field: "metadata_base",
            });
        }
        Ok(request)
    }

    pub fn manifest_key(&self) -> String {
        manifest_key(&self.stream, &self.version)
    }

    pub fn index_key(&self) -> String {
        index_key(&self.stream)
    }

    pub fn metadata_url(&self) -> String {
        format!("{}/{}", self.metadata_base, self.manifest_key())
    }

    pub fn static_info(&self) -> StaticReleaseInfo {
        StaticReleaseInfo {
            version: self.version.clone(),
            metadata_url: self.metadata_url(),
        }
    }

    pub fn check_manifest(&self, manifest: &ReleaseManifest) -> Result<(), ReleaseError> {
        check_manifest_stream(&self.stream, manifest)
    }
}

/// A manifest that names a stream must name `stream`.
pub fn check_manifest_stream(stream: &str, manifest: &ReleaseManifest) -> Result<(), ReleaseError> {
    if !manifest.stream.is_empty() && manifest.stream != stream {
        return Err(ReleaseError::StreamMismatch {
            expected: stream.to_string(),
            found: manifest.stream.clone(),
        });
    }
    Ok(())
}
