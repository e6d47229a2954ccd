//! Repository descriptors: where to mirror from and where to publish to.
//!
//! All types deserialize from the settings document via serde + serde_yaml.
//! A [`RepositorySpec`] is immutable for the duration of one pass.

use std::fmt;
use std::path::{Component, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// The logical name of a repository; also the mirror's directory name
/// under the local cache root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryName(pub String);

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RepositoryName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepositoryName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Where the content comes from: a git url, a branch, and the subdirectory
/// of the working tree to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Overrides the name derived from `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Subdirectory of the working tree to publish; empty means the whole tree.
    #[serde(default)]
    pub directory: PathBuf,
}

/// Where the content goes: a bucket, its region, a key prefix, and
/// optional static credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationSpec {
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default, skip_serializing)]
    pub aws_access_key_id: Option<String>,
    #[serde(default, skip_serializing)]
    pub aws_secret_access_key: Option<String>,
}

impl DestinationSpec {
    /// The destination directory with surrounding `/` removed.
    pub fn directory(&self) -> &str {
        self.directory.trim_matches('/')
    }

    /// Remote key prefix: `<directory>/`, or empty when publishing at the
    /// bucket root.
    pub fn prefix(&self) -> String {
        let dir = self.directory();
        if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        }
    }

    /// Static credentials, if both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

// Keeps secrets out of logs and panic messages.
impl fmt::Debug for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationSpec")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("directory", &self.directory)
            .field("credentials", &self.credentials().map(|_| "<redacted>"))
            .finish()
    }
}

/// One repository to mirror and publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: SourceSpec,
    pub destination: DestinationSpec,
    /// Upload every scanned file regardless of remote state.
    #[serde(default)]
    pub force: bool,
}

impl RepositorySpec {
    /// Repository name: `source.name` if set, otherwise derived from the url.
    pub fn name(&self) -> Result<RepositoryName, ConfigError> {
        if let Some(name) = self.source.name.as_deref().filter(|n| !n.is_empty()) {
            return Ok(RepositoryName::from(name));
        }
        derive_name(&self.source.url)
            .map(RepositoryName::from)
            .ok_or_else(|| ConfigError::NotAGitReference {
                url: self.source.url.clone(),
            })
    }

    /// Human-readable label used in logs and reports.
    pub fn label(&self) -> String {
        match (&self.description, self.name()) {
            (Some(d), _) if !d.is_empty() => d.clone(),
            (_, Ok(name)) => name.0,
            _ => self.source.url.clone(),
        }
    }

    /// Check everything a pass needs before any external call is made.
    ///
    /// The url must yield a repository name (even when `source.name`
    /// overrides it), `source.directory` must stay inside the mirror,
    /// `source.branch` must not look like an option, and the destination
    /// must name a bucket and a region.
    pub fn validate(&self) -> Result<RepositoryName, ConfigError> {
        if derive_name(&self.source.url).is_none() {
            return Err(ConfigError::NotAGitReference {
                url: self.source.url.clone(),
            });
        }
        let name = self.name()?;
        if name.0 == "." || name.0 == ".." || name.0.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "source.name",
                reason: format!("'{name}' cannot be used as a directory name"),
            });
        }
        let directory = &self.source.directory;
        let escapes = directory.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(ConfigError::InvalidValue {
                field: "source.directory",
                reason: format!(
                    "'{}' must be a relative path inside the mirror",
                    directory.display()
                ),
            });
        }
        if let Some(branch) = self.source.branch.as_deref().filter(|b| b.starts_with('-')) {
            return Err(ConfigError::InvalidValue {
                field: "source.branch",
                reason: format!("'{branch}' is not a branch name"),
            });
        }
        if self.destination.bucket.trim().is_empty() {
            return Err(ConfigError::MissingField {
                repository: name.0,
                field: "destination.bucket",
            });
        }
        if self.destination.region.trim().is_empty() {
            return Err(ConfigError::MissingField {
                repository: name.0,
                field: "destination.region",
            });
        }
        Ok(name)
    }
}

/// Text between the last `/` (or scp-style `:`) and a `.git` suffix.
///
/// `https://github.com/org/site.git` → `site`. Returns `None` when the url
/// does not end in `.git` or the name would be empty.
pub fn derive_name(url: &str) -> Option<&str> {
    let stem = url.trim().trim_end_matches('/').strip_suffix(".git")?;
    let start = stem.rfind(['/', ':'])? + 1;
    let name = &stem[start..];
    (!name.is_empty()).then_some(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
