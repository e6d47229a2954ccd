//! The settings document.
//!
//! # Layout
//!
//! ```yaml
//! local_cache: /var/cache/synch     # mirror root, created on demand
//! force: false                       # OR-ed with each repository's `force`
//! debug: false                       # echo git output at info level
//! chunk_size: 8388608                # the store's multi-part part size, at least 5 MiB
//! workers: 1                         # fingerprint / upload pool width
//! path_rewrites:
//!   - {from: "qb/Qb", to: "qb/qb"}
//! repos:
//!   - source: {url: "https://github.com/org/site.git", branch: gh-pages, directory: html}
//!     destination: {bucket: static.example.org, region: us-west-2, directory: site}
//! ```
//!
//! A single `repo:` mapping is accepted as well and is processed before `repos`.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::fingerprint::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::normalize::{PathRewrite, Rewrites};
use crate::types::RepositorySpec;

const DEFAULT_CHUNK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CHUNK_SIZE) {
    Some(n) => n,
    None => panic!("default chunk size is zero"),
};

/// Root of the settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub local_cache: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepositorySpec>,
    #[serde(default)]
    pub repos: Vec<RepositorySpec>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: NonZeroUsize,
    #[serde(default = "default_workers")]
    pub workers: NonZeroUsize,
    #[serde(default)]
    pub path_rewrites: Vec<PathRewrite>,
}

fn default_chunk_size() -> NonZeroUsize {
    DEFAULT_CHUNK
}

fn default_workers() -> NonZeroUsize {
    NonZeroUsize::MIN
}

impl Settings {
    /// Parse a settings document. `origin` is only used for error context.
    pub fn from_yaml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Settings =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                path: origin.to_path_buf(),
                source: e,
            })?;
        if settings.local_cache.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "local_cache",
                reason: "must not be empty".to_owned(),
            });
        }
        if settings.chunk_size.get() < MIN_CHUNK_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                reason: format!(
                    "{} is below the store's minimum part size of {MIN_CHUNK_SIZE} bytes",
                    settings.chunk_size
                ),
            });
        }
        Ok(settings)
    }

    /// Every configured repository, `repo` first, then `repos` in order.
    pub fn repositories(&self) -> Vec<&RepositorySpec> {
        self.repo.iter().chain(self.repos.iter()).collect()
    }

    /// The configured path rewrites as a normalization hook.
    pub fn normalizer(&self) -> Rewrites {
        Rewrites::new(self.path_rewrites.clone())
    }

    /// Create the local cache root if absent and return it.
    pub fn ensure_cache(&self) -> Result<PathBuf, ConfigError> {
        let dir = &self.local_cache;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        Ok(dir.clone())
    }
}

/// Load settings from `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Settings, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Settings::from_yaml_str(&contents, path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
