use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Error surface for region clients and the fan-out runtime.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid region name '{region}'")]
    InvalidRegion { region: String },

    #[error("credentials file not found: {path}")]
    Credentials { path: PathBuf },

    #[error("publish in {region} failed: {detail}")]
    Command { region: String, detail: String },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("publish call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("all {attempted} publish attempts failed")]
    Systemic { attempted: usize },

    #[error("publish runtime error: {0}")]
    Runtime(String),
}
