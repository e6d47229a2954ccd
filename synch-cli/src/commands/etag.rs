//! `synch etag <file>...`: print local fingerprints in the store's etag format.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use synch_core::DEFAULT_CHUNK_SIZE;
use synch_engine::fingerprint_path;

/// Arguments for `synch etag`.
#[derive(Args, Debug)]
pub struct EtagArgs {
    /// Files to fingerprint.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Multi-part chunk size in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
}

impl EtagArgs {
    pub fn run(self) -> Result<()> {
        let chunk_size =
            NonZeroUsize::new(self.chunk_size).context("--chunk-size must be at least 1")?;
        for file in &self.files {
            let fp = fingerprint_path(file, chunk_size)
                .with_context(|| format!("failed to fingerprint {}", file.display()))?;
            println!("{fp}  {}", file.display());
        }
        Ok(())
    }
}
