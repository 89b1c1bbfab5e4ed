//! `cairn stream-generate` — build the public stream metadata document.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgGroup, Args};

use cairn_core::{request, stream, ReleaseManifest};
use cairn_store::{fetch_manifest, load_index};

use crate::settings::Settings;

/// Arguments for `cairn stream-generate`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["release", "from_index"])))]
pub struct StreamArgs {
    #[arg(long)]
    pub stream: String,

    /// Local release manifest to generate from.
    #[arg(long, value_name = "FILE")]
    pub release: Option<PathBuf>,

    /// Generate from the latest release in the stream's index.
    #[arg(long)]
    pub from_index: bool,

    /// JSON document deep-merged over the generated metadata.
    #[arg(long = "override", value_name = "FILE")]
    pub override_file: Option<PathBuf>,

    /// Write to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    #[arg(long)]
    pub pretty_print: bool,

    /// Also store the document on the backend as `<stream>.json`.
    #[arg(long)]
    pub upload: bool,
}

impl StreamArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let (manifest, version) = self.source_manifest(settings)?;
        let mut metadata = stream::generate(&manifest, version.as_deref(), Utc::now())
            .context("failed to generate stream metadata")?;
        if metadata.stream.is_empty() {
            metadata.stream = self.stream.clone();
        }

        if let Some(path) = &self.override_file {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read override {}", path.display()))?;
            let overlay = stream::parse_override(&bytes)
                .with_context(|| format!("invalid override {}", path.display()))?;
            metadata = stream::apply_override(&metadata, overlay)?;
        }

        let mut text = if self.pretty_print {
            serde_json::to_string_pretty(&metadata)?
        } else {
            serde_json::to_string(&metadata)?
        };
        text.push('\n');

        match &self.output_file {
            Some(path) => {
                fs::write(path, &text)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "wrote stream metadata");
            }
            None => print!("{text}"),
        }

        if self.upload {
            let store = settings.store()?;
            let key = request::stream_metadata_key(&self.stream);
            store
                .store(&key, text.as_bytes())
                .with_context(|| format!("failed to upload {}", store.locate(&key)))?;
            tracing::info!(location = %store.locate(&key), "uploaded stream metadata");
        }
        Ok(())
    }

    /// The manifest to render and, for `--from-index`, its version label.
    fn source_manifest(&self, settings: &Settings) -> Result<(ReleaseManifest, Option<String>)> {
        if let Some(path) = &self.release {
            let bytes =
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let manifest = ReleaseManifest::from_slice(&bytes)
                .with_context(|| format!("invalid release manifest {}", path.display()))?;
            request::check_manifest_stream(&self.stream, &manifest)?;
            return Ok((manifest, None));
        }

        let store = settings.store()?;
        let mut index = load_index(store.as_ref(), &self.stream)?;
        if index.stream.is_empty() {
            index.stream = self.stream.clone();
        }
        let version = stream::latest_version(&index)?.to_string();
        tracing::info!(stream = %self.stream, %version, "generating from latest indexed release");
        let manifest = fetch_manifest(store.as_ref(), &self.stream, &version)?;
        Ok((manifest, Some(version)))
    }
}
