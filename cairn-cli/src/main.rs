//! cairn — release index reconciliation and image publication.
//!
//! # Usage
//!
//! ```text
//! cairn update-release-index --stream <s> --version <v> [--dry-run]
//! cairn make-amis-public --stream <s> --version <v> [--provider aws] [--timeout-secs N] [--max-parallel N] [--json]
//! cairn stream-generate --stream <s> (--release <file> | --from-index) [--override <file>]
//!                       [--output-file <file>] [--pretty-print] [--upload]
//! ```
//!
//! Backend and metadata base come from `~/.cairn/config.yaml` or the global
//! flags `--local-root`, `--mirror-url` (+ `--scp-*`) and `--metadata-base`.
//!
//! Exit status: 0 on success (including "nothing to do"), 77 when some but
//! not all images were published, 1 on any error.

mod commands;
mod settings;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cairn_publish::PublishOutcome;
use commands::{publish::PublishArgs, stream::StreamArgs, update_index::UpdateIndexArgs};
use settings::{GlobalArgs, Settings};

/// Exit status for a partially successful publish.
const EXIT_INCOMPLETE: u8 = 77;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cairn",
    version,
    about = "Maintain release indexes and publish cloud images for OS streams",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge a build's manifest into its stream's release index.
    UpdateReleaseIndex(UpdateIndexArgs),

    /// Make every AWS image of a build launchable by everyone.
    #[command(name = "make-amis-public")]
    MakeAmisPublic(PublishArgs),

    /// Generate stream metadata from a release manifest.
    StreamGenerate(StreamArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::resolve(&cli.global)?;
    match cli.command {
        Commands::UpdateReleaseIndex(args) => args.run(&settings).map(|()| ExitCode::SUCCESS),
        Commands::MakeAmisPublic(args) => args.run(&settings).map(exit_code_for),
        Commands::StreamGenerate(args) => args.run(&settings).map(|()| ExitCode::SUCCESS),
    }
}

fn exit_code_for(outcome: PublishOutcome) -> ExitCode {
    match outcome {
        PublishOutcome::Skip | PublishOutcome::Success => ExitCode::SUCCESS,
        PublishOutcome::Incomplete => ExitCode::from(EXIT_INCOMPLETE),
        PublishOutcome::Fatal => ExitCode::FAILURE,
    }
}

/// Logs go to stderr so stdout stays clean for JSON output.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
