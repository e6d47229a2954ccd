//! `synch diff`: list what `sync` would upload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

/// Arguments for `synch diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Settings document (YAML or JSON).
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Only process the repository with this name.
    #[arg(long)]
    pub repo: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        super::execute(
            &super::settings_path(self.settings),
            self.repo,
            |options| options.dry_run = true,
            self.json,
        )
    }
}
