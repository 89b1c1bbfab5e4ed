//! Global flags and their merge over `~/.cairn/config.yaml`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use cairn_core::{config, BackendConfig, CairnConfig, ReleaseError, ScpTarget};
use cairn_store::DocumentStore;

/// Flags shared by every subcommand. Each one overrides the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct GlobalArgs {
    /// Config file (default: ~/.cairn/config.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use a local directory tree as the backend.
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "mirror_url")]
    pub local_root: Option<PathBuf>,

    /// Read documents over HTTP(S) from this base URL; write them with scp.
    #[arg(long, global = true, value_name = "URL")]
    pub mirror_url: Option<String>,

    #[arg(long, global = true, requires = "mirror_url")]
    pub scp_user: Option<String>,

    #[arg(long, global = true, requires = "mirror_url")]
    pub scp_host: Option<String>,

    #[arg(long, global = true, value_name = "PATH", requires = "mirror_url")]
    pub scp_key_file: Option<PathBuf>,

    /// Remote directory matching the mirror's base URL.
    #[arg(long, global = true, value_name = "DIR", requires = "mirror_url")]
    pub scp_target_path: Option<String>,

    /// Public base URL that release manifests are served under.
    #[arg(long, global = true, value_name = "URL")]
    pub metadata_base: Option<String>,
}

/// Effective configuration of one invocation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: CairnConfig,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let config = load_config(args.config.as_deref())?;
        let config = apply_overrides(config, args)?;
        Ok(Self { config })
    }

    pub fn store(&self) -> Result<Box<dyn DocumentStore>> {
        let Some(backend) = &self.config.backend else {
            bail!("no backend configured: pass --local-root or --mirror-url, or set `backend` in the config file");
        };
        Ok(cairn_store::open(backend))
    }

    pub fn metadata_base(&self) -> Result<&str> {
        self.config
            .metadata_base
            .as_deref()
            .filter(|base| !base.trim().is_empty())
            .context("no metadata base URL: pass --metadata-base or set `metadata_base` in the config file")
    }
}

fn load_config(explicit: Option<&Path>) -> Result<CairnConfig> {
    if let Some(path) = explicit {
        return config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    match config::load() {
        Ok(config) => Ok(config),
        Err(ReleaseError::HomeNotFound) => {
            tracing::debug!("home directory unknown; using default config");
            Ok(CairnConfig::default())
        }
        Err(err) => Err(err).context("failed to load ~/.cairn/config.yaml"),
    }
}

/// Layer command-line flags over `config`.
pub fn apply_overrides(mut config: CairnConfig, args: &GlobalArgs) -> Result<CairnConfig> {
    if let Some(base) = &args.metadata_base {
        config.metadata_base = Some(base.clone());
    }

    if let Some(root) = &args.local_root {
        config.backend = Some(BackendConfig::Local { root: root.clone() });
    } else if let Some(base_url) = &args.mirror_url {
        let fallback = match &config.backend {
            Some(BackendConfig::Mirror { scp, .. }) => Some(scp.clone()),
            _ => None,
        };
        let scp = ScpTarget {
            user: pick(&args.scp_user, fallback.as_ref().map(|s| &s.user), "--scp-user")?,
            host: pick(&args.scp_host, fallback.as_ref().map(|s| &s.host), "--scp-host")?,
            key_file: pick(
                &args.scp_key_file,
                fallback.as_ref().map(|s| &s.key_file),
                "--scp-key-file",
            )?,
            target_path: pick(
                &args.scp_target_path,
                fallback.as_ref().map(|s| &s.target_path),
                "--scp-target-path",
            )?,
        };
        config.backend = Some(BackendConfig::Mirror {
            base_url: base_url.clone(),
            scp,
        });
    }

    match &mut config.backend {
        Some(BackendConfig::Local { root }) => *root = expand_tilde(root),
        Some(BackendConfig::Mirror { scp, .. }) => scp.key_file = expand_tilde(&scp.key_file),
        None => {}
    }
    if let Some(path) = &config.aws.credentials_file {
        config.aws.credentials_file = Some(expand_tilde(path));
    }
    Ok(config)
}

fn pick<T: Clone>(flag: &Option<T>, fallback: Option<&T>, name: &str) -> Result<T> {
    match (flag, fallback) {
        (Some(value), _) => Ok(value.clone()),
        (None, Some(value)) => Ok(value.clone()),
        (None, None) => bail!("--mirror-url requires {name} (or a mirror backend in the config file)"),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
