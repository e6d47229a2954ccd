//! Error types for synch-store.

use thiserror::Error;

/// All errors that can arise from object-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The bucket could not be reached, authenticated against, or does not exist.
    #[error("problem connecting to {bucket}: {message}")]
    Connection { bucket: String, message: String },

    /// Listing objects under a prefix failed.
    #[error("failed to list objects under '{prefix}': {message}")]
    List { prefix: String, message: String },

    /// Writing a single object failed.
    #[error("failed to write '{key}': {message}")]
    Put { key: String, message: String },

    /// The content to write could not be read.
    #[error("failed to read the body of '{key}': {source}")]
    Body {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The async runtime backing the client could not be started.
    #[error("store runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
