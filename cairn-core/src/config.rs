//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.cairn/
//!   config.yaml
//! ```
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! A missing default config yields [`CairnConfig::default`]; a missing file
//! passed explicitly is an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReleaseError;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Remote-copy destination for the mirror backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScpTarget {
    pub user: String,
    pub host: String,
    pub key_file: PathBuf,
    /// Remote directory that corresponds to the mirror's base URL.
    pub target_path: String,
}

/// Where manifests and indexes are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// A directory tree laid out like the published bucket.
    Local { root: PathBuf },
    /// Read over HTTP(S) from `base_url`, write with scp to `scp`.
    Mirror { base_url: String, scp: ScpTarget },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub profile: String,
    pub credentials_file: Option<PathBuf>,
    /// `aws` executable used to publish images.
    pub cli: PathBuf,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            credentials_file: None,
            cli: PathBuf::from("aws"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Media key in the manifest whose images get published.
    pub provider: String,
    pub timeout_secs: u64,
    pub max_parallel: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            provider: "aws".to_string(),
            timeout_secs: 120,
            max_parallel: 8,
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CairnConfig {
    pub metadata_base: Option<String>,
    pub backend: Option<BackendConfig>,
    pub aws: AwsConfig,
    pub publish: PublishConfig,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.cairn/config.yaml` — pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".cairn").join("config.yaml")
}

/// Load `<home>/.cairn/config.yaml`, or defaults if it does not exist.
pub fn load_at(home: &Path) -> Result<CairnConfig, ReleaseError> {
    let path = config_path_at(home);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(CairnConfig::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<CairnConfig, ReleaseError> {
    load_at(&home()?)
}

/// Load an explicitly named config file. The file must exist.
pub fn load_from(path: &Path) -> Result<CairnConfig, ReleaseError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ReleaseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(CairnConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ReleaseError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn home() -> Result<PathBuf, ReleaseError> {
    dirs::home_dir().ok_or(ReleaseError::HomeNotFound)
}
