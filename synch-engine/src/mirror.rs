//! Local mirror maintenance.
//!
//! [`prepare_mirror`] runs clone (only when the mirror directory is
//! absent), checkout, then pull, each to completion before the next. The
//! scanner must not start until it returns.

use std::path::{Path, PathBuf};
use std::process::Command;

use synch_core::{RepositoryName, RepositorySpec};

use crate::error::SyncError;

/// Remote name pulled from.
pub const ORIGIN: &str = "origin";

/// Version-control operations a pass needs. Each call blocks until done.
pub trait Mirror {
    /// Clone `url` into `<cache_root>/<name>`.
    fn clone_repo(&self, url: &str, cache_root: &Path, name: &str) -> Result<(), SyncError>;

    /// Switch the working tree at `repo_dir` to `branch`.
    fn checkout(&self, repo_dir: &Path, branch: &str) -> Result<(), SyncError>;

    /// Update the working tree from `remote`; `None` pulls the current
    /// branch's default.
    fn pull(&self, repo_dir: &Path, remote: &str, branch: Option<&str>) -> Result<(), SyncError>;
}

/// Bring the mirror of `spec` under `cache_root` up to date and return
/// its working-tree root.
pub fn prepare_mirror(
    mirror: &dyn Mirror,
    spec: &RepositorySpec,
    name: &RepositoryName,
    cache_root: &Path,
) -> Result<PathBuf, SyncError> {
    let repo_dir = cache_root.join(&name.0);
    if !repo_dir.exists() {
        tracing::info!("clone {} into {}", spec.source.url, repo_dir.display());
        mirror.clone_repo(&spec.source.url, cache_root, &name.0)?;
    }

    let branch = spec.source.branch.as_deref().filter(|b| !b.is_empty());
    match branch {
        Some(branch) => mirror.checkout(&repo_dir, branch)?,
        None => tracing::info!("{name} has no branch property; staying on the current branch"),
    }
    mirror.pull(&repo_dir, ORIGIN, branch)?;
    Ok(repo_dir)
}

// ---------------------------------------------------------------------------
// git CLI
// ---------------------------------------------------------------------------

/// Runs the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    debug: bool,
}

impl GitCli {
    /// `debug` echoes git's output at info level instead of debug.
    pub fn new(debug: bool) -> Self {
        Self {
            program: PathBuf::from("git"),
            debug,
        }
    }

    /// Use a specific git executable.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, step: &'static str, cwd: &Path, args: &[&str]) -> Result<(), SyncError> {
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| SyncError::Mirror {
                step,
                message: format!("could not run {}: {e}", self.program.display()),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            if self.debug {
                tracing::info!("git {step}: {line}");
            } else {
                tracing::debug!("git {step}: {line}");
            }
        }

        if output.status.success() {
            return Ok(());
        }
        Err(SyncError::Mirror {
            step,
            message: format!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            ),
        })
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(false)
    }
}

/// `url` and `name` are never parsed as options.
fn clone_args<'a>(url: &'a str, name: &'a str) -> [&'a str; 4] {
    ["clone", "--", url, name]
}

/// `branch` is always read as a revision, never as a path.
fn checkout_args(branch: &str) -> [&str; 3] {
    ["checkout", branch, "--"]
}

impl Mirror for GitCli {
    fn clone_repo(&self, url: &str, cache_root: &Path, name: &str) -> Result<(), SyncError> {
        self.run("clone", cache_root, &clone_args(url, name))
    }

    fn checkout(&self, repo_dir: &Path, branch: &str) -> Result<(), SyncError> {
        self.run("checkout", repo_dir, &checkout_args(branch))
    }

    fn pull(&self, repo_dir: &Path, remote: &str, branch: Option<&str>) -> Result<(), SyncError> {
        match branch {
            Some(branch) => self.run("pull", repo_dir, &["pull", remote, branch]),
            None => self.run("pull", repo_dir, &["pull", remote]),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
