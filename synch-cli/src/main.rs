//! Synch: publish a git branch's working tree to an S3 bucket.
//!
//! # Usage
//!
//! ```text
//! synch sync [--settings synch.yaml] [--repo <name>] [--force] [--dry-run] [--workers N] [--json]
//! synch diff [--settings synch.yaml] [--repo <name>] [--json]
//! synch etag <file>... [--chunk-size BYTES]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, etag::EtagArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "synch",
    version,
    about = "Mirror a git branch into an S3 bucket, uploading only what changed",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror every configured repository and upload what differs.
    Sync(SyncArgs),

    /// Show what `sync` would upload, without uploading.
    Diff(DiffArgs),

    /// Print the store-compatible etag of local files.
    Etag(EtagArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Diff(args) => args.run(),
        Commands::Etag(args) => args.run(),
    }
}

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
