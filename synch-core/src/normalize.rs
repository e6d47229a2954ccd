//! Relative-path normalization hook.
//!
//! Applied to every local relative path and every remote key (after the
//! destination prefix is stripped) so that both sides of the comparison,
//! and the keys written by the uploader, go through the same rewrite.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Rewrites a `/`-separated relative path before lookup and upload.
pub trait PathNormalizer: Send + Sync {
    fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str>;
}

/// Leaves paths untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl PathNormalizer for Identity {
    fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(path)
    }
}

/// A literal substring substitution, e.g. `{from: "qb/Qb", to: "qb/qb"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    pub from: String,
    pub to: String,
}

/// Applies each configured [`PathRewrite`] in order, replacing every occurrence.
#[derive(Debug, Clone, Default)]
pub struct Rewrites(Vec<PathRewrite>);

impl Rewrites {
    pub fn new(rules: Vec<PathRewrite>) -> Self {
        Self(rules.into_iter().filter(|r| !r.from.is_empty()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PathNormalizer for Rewrites {
    fn normalize<'a>(&self, path: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(path);
        for rule in &self.0 {
            if out.contains(rule.from.as_str()) {
                out = Cow::Owned(out.replace(rule.from.as_str(), &rule.to));
            }
        }
        out
    }
}
