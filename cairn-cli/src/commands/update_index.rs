//! `cairn update-release-index` — merge a build into its stream's index.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use cairn_core::ReleaseRequest;
use cairn_store::{update_release_index, UpdateAction, UpdateReport};

use crate::settings::Settings;

/// Arguments for `cairn update-release-index`.
#[derive(Args, Debug)]
pub struct UpdateIndexArgs {
    /// Stream whose index is updated (e.g. `stable`).
    #[arg(long)]
    pub stream: String,

    /// Build version whose manifest is merged.
    #[arg(long)]
    pub version: String,

    /// Print the index diff instead of storing it.
    #[arg(long)]
    pub dry_run: bool,
}

impl UpdateIndexArgs {
    pub fn run(self, settings: &Settings) -> Result<()> {
        let request = ReleaseRequest::new(&self.stream, &self.version, settings.metadata_base()?)?;
        let store = settings.store()?;

        let report = update_release_index(store.as_ref(), &request, Utc::now(), self.dry_run)
            .with_context(|| {
                format!(
                    "failed to update release index for {} {}",
                    request.stream, request.version
                )
            })?;
        print_report(&request, &report);
        Ok(())
    }
}

fn print_report(request: &ReleaseRequest, report: &UpdateReport) {
    let version = &request.version;
    let location = &report.location;
    match report.action {
        UpdateAction::Unchanged => {
            println!("✓ {version} is already the latest release in {location}; nothing to do")
        }
        UpdateAction::Appended => println!("✓ appended {version} to {location}"),
        UpdateAction::Replaced => println!("✓ updated commits of {version} in {location}"),
        UpdateAction::WouldAppend | UpdateAction::WouldReplace => {
            let verb = if report.action == UpdateAction::WouldAppend {
                "append"
            } else {
                "update"
            };
            println!("[dry-run] would {verb} {version} in {location}");
            print_diff(&report.diff);
        }
    }
}

fn print_diff(diff: &str) {
    for line in diff.lines() {
        let line = if line.starts_with("+++") || line.starts_with("---") {
            line.bold().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with("@@") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        println!("{line}");
    }
}
