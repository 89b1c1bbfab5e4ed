//! `cairn make-amis-public` — make a release's images launchable by everyone.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cairn_publish::{
    publish_blocking, AwsCliFactory, FanoutConfig, PublishOutcome, PublishReport, UnitStatus,
};
use cairn_store::fetch_manifest;

use crate::settings::Settings;

/// Arguments for `cairn make-amis-public`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    #[arg(long)]
    pub stream: String,

    #[arg(long)]
    pub version: String,

    /// Media key in the manifest whose images are published.
    #[arg(long)]
    pub provider: Option<String>,

    /// Per-region call timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Maximum number of regions published concurrently.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_parallel: Option<u64>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "arch")]
    architecture: String,
    #[tabled(rename = "region")]
    region: String,
    #[tabled(rename = "image")]
    image: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "time")]
    elapsed: String,
}

impl PublishArgs {
    pub fn run(self, settings: &Settings) -> Result<PublishOutcome> {
        let store = settings.store()?;
        let manifest = fetch_manifest(store.as_ref(), &self.stream, &self.version)
            .with_context(|| format!("failed to load manifest for {} {}", self.stream, self.version))?;

        let mut fanout = FanoutConfig::from_config(&settings.config.publish);
        if let Some(provider) = self.provider {
            fanout.provider = provider;
        }
        if let Some(secs) = self.timeout_secs {
            fanout.call_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_parallel {
            fanout.max_parallel = usize::try_from(n).unwrap_or(usize::MAX);
        }

        let factory = Arc::new(AwsCliFactory::from_config(&settings.config.aws));
        let report = publish_blocking(&manifest, factory, &fanout)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize publish report")?
            );
        } else {
            print_table(&self.stream, &self.version, &fanout.provider, &report);
        }

        if let Some(err) = report.systemic_error() {
            return Err(anyhow::Error::new(err).context(format!(
                "no {} image of {} {} could be published",
                fanout.provider, self.stream, self.version
            )));
        }
        Ok(report.outcome)
    }
}

fn print_table(stream: &str, version: &str, provider: &str, report: &PublishReport) {
    if report.outcome == PublishOutcome::Skip {
        println!("No {provider} images in {stream} {version}; nothing to publish.");
        return;
    }

    let rows: Vec<UnitRow> = report
        .units
        .iter()
        .map(|u| UnitRow {
            architecture: u.unit.architecture.clone(),
            region: u.unit.region.clone(),
            image: u.unit.image.clone(),
            result: match &u.status {
                UnitStatus::Succeeded => "public".green().to_string(),
                UnitStatus::Failed { stage, error } => {
                    format!("{} ({stage:?}): {error}", "failed".red())
                }
            },
            elapsed: format!("{:.1}s", u.elapsed.as_secs_f64()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let summary = format!(
        "{}/{} regions public",
        report.succeeded(),
        report.attempted()
    );
    match report.outcome {
        PublishOutcome::Success => println!("✓ {summary}"),
        PublishOutcome::Incomplete => {
            println!("{} {summary}; retry the failed regions", "!".yellow().bold())
        }
        PublishOutcome::Fatal => println!("{} {summary}", "✗".red().bold()),
        PublishOutcome::Skip => {}
    }
}
