//! Region clients backed by the system `aws` CLI.

use std::path::{Path, PathBuf};
use std::process::Command;

use cairn_core::AwsConfig;

use crate::client::{RegionClient, RegionClientFactory};
use crate::error::PublishError;

const CREDENTIALS_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// Factory for [`AwsCliClient`]s sharing one profile and credentials file.
#[derive(Debug, Clone)]
pub struct AwsCliFactory {
    cli: PathBuf,
    profile: String,
    credentials_file: Option<PathBuf>,
}

impl AwsCliFactory {
    pub fn new(cli: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            cli: cli.into(),
            profile: profile.into(),
            credentials_file: None,
        }
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    pub fn from_config(config: &AwsConfig) -> Self {
        let factory = Self::new(&config.cli, &config.profile);
        match &config.credentials_file {
            Some(path) => factory.with_credentials_file(path),
            None => factory,
        }
    }
}

impl RegionClientFactory for AwsCliFactory {
    type Client = AwsCliClient;

    fn new_region_client(&self, region: &str) -> Result<AwsCliClient, PublishError> {
        validate_region(region)?;
        if let Some(path) = &self.credentials_file {
            if !path.is_file() {
                return Err(PublishError::Credentials { path: path.clone() });
            }
        }
        Ok(AwsCliClient {
            region: region.to_string(),
            cli: self.cli.clone(),
            profile: self.profile.clone(),
            credentials_file: self.credentials_file.clone(),
        })
    }
}

/// Runs `aws ec2 modify-image-attribute` against one region.
#[derive(Debug, Clone)]
pub struct AwsCliClient {
    region: String,
    cli: PathBuf,
    profile: String,
    credentials_file: Option<PathBuf>,
}

impl AwsCliClient {
    pub fn region(&self) -> &str {
        &self.region
    }

    fn args(&self, image_id: &str) -> Vec<String> {
        vec![
            "ec2".to_string(),
            "modify-image-attribute".to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--profile".to_string(),
            self.profile.clone(),
            "--image-id".to_string(),
            image_id.to_string(),
            "--launch-permission".to_string(),
            "Add=[{Group=all}]".to_string(),
        ]
    }
}

impl RegionClient for AwsCliClient {
    fn publish(&self, image_id: &str) -> Result<(), PublishError> {
        let mut command = Command::new(&self.cli);
        command.args(self.args(image_id));
        if let Some(path) = &self.credentials_file {
            command.env(CREDENTIALS_ENV, path);
        }
        tracing::debug!(region = %self.region, image = image_id, cli = %self.cli.display(), "running aws cli");

        let output = command.output().map_err(|source| PublishError::Spawn {
            program: self.cli.display().to_string(),
            source,
        })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => format!("{} exited with {}", display_name(&self.cli), output.status),
            text => text.to_string(),
        };
        Err(PublishError::Command {
            region: self.region.clone(),
            detail,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Region names look like `us-east-1` or `us-gov-west-1`.
pub fn validate_region(region: &str) -> Result<(), PublishError> {
    let invalid = || PublishError::InvalidRegion {
        region: region.to_string(),
    };
    let mut parts = region.split('-');
    let first = parts.next().ok_or_else(invalid)?;
    if first.is_empty() || !first.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(invalid());
    }
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return Err(invalid());
    }
    for part in rest {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(invalid());
        }
    }
    Ok(())
}
