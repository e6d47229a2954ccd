//! `synch sync`: mirror, reconcile and upload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

/// Arguments for `synch sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Settings document (YAML or JSON).
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Only process the repository with this name.
    #[arg(long)]
    pub repo: Option<String>,

    /// Upload every file, whatever the bucket holds.
    #[arg(long)]
    pub force: bool,

    /// Show what would be uploaded without uploading.
    #[arg(long)]
    pub dry_run: bool,

    /// Fingerprint and upload this many files at once.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let workers = super::workers(self.workers)?;
        let (force, dry_run) = (self.force, self.dry_run);
        super::execute(
            &super::settings_path(self.settings),
            self.repo,
            |options| {
                options.force |= force;
                options.dry_run = dry_run;
                if let Some(w) = workers {
                    options.workers = w;
                }
            },
            self.json,
        )
    }
}
