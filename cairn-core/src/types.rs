//! Domain types for release manifests and release indexes.
//!
//! Field names follow the stream-metadata release formats so existing
//! `release.json` / `releases.json` documents deserialize unchanged. Fields
//! the tool does not inspect are captured in `extra` maps and written back
//! verbatim.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{parse_err, ReleaseError};

/// `lastModified` format used in release indexes (UTC, second precision).
pub const LAST_MODIFIED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Note written into every index this tool persists.
pub const INDEX_NOTE: &str = "For use only by release tooling. All other applications should obtain release info from stream metadata endpoints.";

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// One (architecture, commit checksum) pair of a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitRef {
    pub architecture: String,
    pub checksum: String,
}

impl CommitRef {
    pub fn new(architecture: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            checksum: checksum.into(),
        }
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.architecture, self.checksum)
    }
}

// ---------------------------------------------------------------------------
// Release manifest (`<stream>/builds/<version>/release.json`)
// ---------------------------------------------------------------------------

/// A single image published in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionImage {
    pub image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-platform media of one architecture: downloadable artifacts and
/// region-scoped images.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlatformMedia {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, RegionImage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Build output of one architecture.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArchRelease {
    #[serde(default, alias = "checksum")]
    pub commit: String,
    /// Keyed by platform / cloud provider name (`aws`, `qemu`, ...).
    #[serde(default)]
    pub media: BTreeMap<String, PlatformMedia>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArchRelease {
    /// Region → image id for `provider`, if this architecture publishes there.
    pub fn images_for(&self, provider: &str) -> Option<&BTreeMap<String, RegionImage>> {
        self.media
            .get(provider)
            .map(|media| &media.images)
            .filter(|images| !images.is_empty())
    }
}

/// Metadata describing one build. Produced once per build, never mutated here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default)]
    pub stream: String,
    #[serde(default)]
    pub architectures: BTreeMap<String, ArchRelease>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReleaseManifest {
    /// Parse a manifest document. Commits are not checked here; publishing
    /// and stream generation never look at them.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReleaseError> {
        serde_json::from_slice(bytes).map_err(|e| parse_err("release manifest", e))
    }

    /// Every architecture must name the commit it was built from. Required
    /// before the manifest is merged into a release index.
    pub fn validate_commits(&self) -> Result<(), ReleaseError> {
        for (architecture, build) in &self.architectures {
            if build.commit.trim().is_empty() {
                return Err(ReleaseError::EmptyCommit {
                    architecture: architecture.clone(),
                });
            }
        }
        Ok(())
    }

    /// One commit per architecture, ordered by architecture name.
    pub fn commits(&self) -> Vec<CommitRef> {
        self.architectures
            .iter()
            .map(|(arch, build)| CommitRef::new(arch.clone(), build.commit.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Release index (`<stream>/releases.json`)
// ---------------------------------------------------------------------------

/// Identity of "the same build", independent of its commit contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StaticReleaseInfo {
    pub version: String,
    pub metadata_url: String,
}

/// One entry of the persisted index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRelease {
    #[serde(default)]
    pub commits: Vec<CommitRef>,
    pub version: String,
    #[serde(rename = "metadata", alias = "metadataURL")]
    pub metadata_url: String,
}

impl IndexRelease {
    /// Build the candidate entry for `manifest` under `info`.
    pub fn from_manifest(manifest: &ReleaseManifest, info: StaticReleaseInfo) -> Self {
        Self {
            commits: manifest.commits(),
            version: info.version,
            metadata_url: info.metadata_url,
        }
    }

    pub fn static_info(&self) -> StaticReleaseInfo {
        StaticReleaseInfo {
            version: self.version.clone(),
            metadata_url: self.metadata_url.clone(),
        }
    }

    pub fn matches(&self, info: &StaticReleaseInfo) -> bool {
        self.version == info.version && self.metadata_url == info.metadata_url
    }

    fn check_unique_architectures(&self) -> Result<(), ReleaseError> {
        let mut seen = BTreeSet::new();
        for commit in &self.commits {
            if !seen.insert(commit.architecture.as_str()) {
                return Err(ReleaseError::DuplicateArchitecture {
                    version: self.version.clone(),
                    architecture: commit.architecture.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexMetadata {
    #[serde(rename = "last-modified", default)]
    pub last_modified: String,
}

/// Ordered record of every release published for a stream. The last element
/// is the latest release.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReleaseIndex {
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub releases: Vec<IndexRelease>,
    #[serde(default)]
    pub metadata: IndexMetadata,
    #[serde(default)]
    pub stream: String,
}

impl ReleaseIndex {
    /// Parse and validate an index document. `{}` is an empty index.
    ///
    /// Rejects entries that list an architecture twice: the commit-set
    /// comparison assumes at most one commit per architecture.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReleaseError> {
        let index: ReleaseIndex =
            serde_json::from_slice(bytes).map_err(|e| parse_err("release index", e))?;
        for release in &index.releases {
            release.check_unique_architectures()?;
        }
        Ok(index)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ReleaseError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ReleaseError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The tail entry, i.e. the current latest release.
    pub fn latest(&self) -> Option<&IndexRelease> {
        self.releases.last()
    }

    /// Refresh index-level metadata after a successful merge.
    pub fn refresh(&mut self, stream: &str, now: DateTime<Utc>) {
        self.metadata.last_modified = now.format(LAST_MODIFIED_FORMAT).to_string();
        self.note = INDEX_NOTE.to_string();
        self.stream = stream.to_string();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
