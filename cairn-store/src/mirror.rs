//! HTTP mirror backend: read over HTTP(S), write with `scp`.
//!
//! Writes stage the document in a local temporary file, create the remote
//! directory with `ssh … mkdir -p`, then copy the file with `scp`. Both
//! tools run in batch mode so a missing key fails instead of prompting.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use cairn_core::ScpTarget;

use crate::backend::DocumentStore;
use crate::error::{io_err, StoreError};
use crate::local::set_file_permissions;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

pub struct MirrorStore {
    base_url: String,
    scp: ScpTarget,
    agent: ureq::Agent,
    ssh_program: PathBuf,
    scp_program: PathBuf,
}

impl MirrorStore {
    pub fn new(base_url: impl Into<String>, scp: ScpTarget) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scp,
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            ssh_program: PathBuf::from("ssh"),
            scp_program: PathBuf::from("scp"),
        }
    }

    /// Use these executables instead of `ssh` and `scp` from `PATH`.
    pub fn with_transfer_programs(mut self, ssh: impl Into<PathBuf>, scp: impl Into<PathBuf>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }

    fn remote_path_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.scp.target_path.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

impl DocumentStore for MirrorStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let url = self.url_for(key);
        tracing::debug!(%url, "fetching document");
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(err) => {
                return Err(StoreError::Http {
                    url,
                    source: Box::new(err),
                })
            }
        };
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| io_err(&url, e))?;
        Ok(Some(bytes))
    }

    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let remote = self.remote_path_for(key);

        let mut staged = tempfile::Builder::new()
            .prefix("cairn-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        staged
            .write_all(bytes)
            .map_err(|e| io_err(staged.path(), e))?;
        // scp gives a new remote file the source mode; tempfiles start at 0600.
        set_file_permissions(staged.path())?;

        if let Some((dir, _)) = remote.rsplit_once('/') {
            if !dir.is_empty() {
                run(&self.ssh_program, &ssh_mkdir_args(&self.scp, dir))?;
            }
        }
        let local = staged.path().display().to_string();
        run(&self.scp_program, &scp_args(&self.scp, &local, &remote))?;

        tracing::info!(
            destination = %format!("{}@{}:{}", self.scp.user, self.scp.host, remote),
            bytes = bytes.len(),
            "uploaded document"
        );
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        self.url_for(key)
    }
}

// ---------------------------------------------------------------------------
// Command construction
// ---------------------------------------------------------------------------

fn common_args(target: &ScpTarget) -> Vec<String> {
    vec![
        "-i".to_string(),
        target.key_file.display().to_string(),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
    ]
}

pub(crate) fn ssh_mkdir_args(target: &ScpTarget, dir: &str) -> Vec<String> {
    let mut args = common_args(target);
    args.push(format!("{}@{}", target.user, target.host));
    args.push(format!("mkdir -p {}", shell_quote(dir)));
    args
}

pub(crate) fn scp_args(target: &ScpTarget, local: &str, remote: &str) -> Vec<String> {
    let mut args = common_args(target);
    args.push(local.to_string());
    args.push(format!("{}@{}:{}", target.user, target.host, remote));
    args
}

/// Single-quote `value` for the remote shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn run(program: &Path, args: &[String]) -> Result<(), StoreError> {
    let command = program.display().to_string();
    tracing::debug!(program = %command, ?args, "running transfer command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| StoreError::Transfer {
            command: command.clone(),
            detail: format!("failed to spawn: {e}"),
        })?;
    if !output.status.success() {
        return Err(StoreError::Transfer {
            command,
            detail: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}
