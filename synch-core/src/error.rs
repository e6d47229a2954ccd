//! Error types for synch-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, cache root not creatable, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The settings file did not exist at the given path.
    #[error("settings not found at {path}")]
    NotFound { path: PathBuf },

    /// No repository name can be derived from the source url.
    #[error("this is not a git reference: {url}")]
    NotAGitReference { url: String },

    /// A required destination field is empty or absent.
    #[error("repository '{repository}' is missing required field `{field}`")]
    MissingField {
        repository: String,
        field: &'static str,
    },

    /// A field is present but unusable.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
