//! Error types for synch-engine.

use std::path::PathBuf;

use thiserror::Error;

use synch_core::ConfigError;
use synch_store::StoreError;

/// All errors that can arise during a pass.
///
/// `Config`, `Mirror` and `Connection` end the pass for one repository.
/// `Read` and `Upload` only ever concern a single file and are folded
/// into the pass report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or incomplete repository settings.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A clone / checkout / pull step failed.
    #[error("mirror {step} failed: {message}")]
    Mirror { step: &'static str, message: String },

    /// The bucket could not be reached or listed.
    #[error("connection error: {0}")]
    Connection(#[source] StoreError),

    /// A local file could not be read.
    #[error("can not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single object write failed.
    #[error("can not upload {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Convenience constructor for [`SyncError::Read`].
pub(crate) fn read_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Read {
        path: path.into(),
        source,
    }
}
