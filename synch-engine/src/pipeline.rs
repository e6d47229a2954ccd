//! One pass per repository: mirror → connect → index → scan → diff → upload.
//!
//! Configuration, mirror and connection failures end the pass for that
//! repository only; [`run`] moves on to the next one. Per-file read and
//! upload failures never end a pass, they are collected in the
//! [`PassReport`].

use std::num::NonZeroUsize;
use std::path::Path;

use synch_core::{
    ConfigError, DestinationSpec, PathNormalizer, RepositorySpec, Settings,
};
use synch_store::{ObjectStore, StoreError};

use crate::error::SyncError;
use crate::index::build_index;
use crate::mirror::{prepare_mirror, Mirror};
use crate::reconcile::Reconciler;
use crate::scan::{scan, LocalFile};
use crate::upload::{Dispatcher, FileOutcome};

/// Opens the bucket named by a destination.
pub type Connect<'a> = dyn Fn(&DestinationSpec) -> Result<Box<dyn ObjectStore>, StoreError> + 'a;

/// Which configured repositories to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every configured repository, in settings order.
    All,
    /// The repository with this name.
    Repository(String),
}

/// Knobs for one pass, threaded explicitly into every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub force: bool,
    pub dry_run: bool,
    pub chunk_size: NonZeroUsize,
    pub workers: NonZeroUsize,
}

impl PassOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            force: settings.force,
            dry_run: false,
            chunk_size: settings.chunk_size,
            workers: settings.workers,
        }
    }
}

/// What one repository pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub repository: String,
    /// Files yielded by the scanner.
    pub scanned: usize,
    /// Relative paths that already matched the bucket.
    pub unchanged: Vec<String>,
    /// One outcome per file that was selected, could not be read, or
    /// collided with another file's key.
    pub outcomes: Vec<FileOutcome>,
}

impl PassReport {
    pub fn uploaded(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Uploaded { .. }))
    }

    pub fn would_upload(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::WouldUpload { .. }))
    }

    pub fn failures(&self) -> usize {
        self.count(FileOutcome::is_failure)
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }

    fn count(&self, f: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

/// Outcome for one repository in a batch.
#[derive(Debug)]
pub struct RepositoryOutcome {
    /// Repository name, when the url yields one.
    pub name: Option<String>,
    /// Description, falling back to the name or the url.
    pub label: String,
    pub result: Result<PassReport, SyncError>,
}

/// Run one pass for `spec`.
pub fn run_pass(
    spec: &RepositorySpec,
    cache_root: &Path,
    options: &PassOptions,
    normalizer: &dyn PathNormalizer,
    mirror: &dyn Mirror,
    connect: &Connect<'_>,
) -> Result<PassReport, SyncError> {
    let name = spec.validate()?;
    let force = options.force || spec.force;

    let repo_dir = prepare_mirror(mirror, spec, &name, cache_root)?;
    let local_dir = repo_dir.join(&spec.source.directory);
    if !local_dir.is_dir() {
        return Err(ConfigError::InvalidValue {
            field: "source.directory",
            reason: format!("{} is not a directory", local_dir.display()),
        }
        .into());
    }

    let store = connect(&spec.destination).map_err(SyncError::Connection)?;
    let prefix = spec.destination.prefix();
    let index = build_index(store.as_ref(), &prefix, normalizer)?;

    tracing::info!("look for differences in {}", local_dir.display());
    let mut outcomes = Vec::new();
    let mut files: Vec<LocalFile> = Vec::new();
    for entry in scan(&local_dir).iter() {
        match entry {
            Ok(file) => files.push(file),
            Err(err) => {
                tracing::warn!("{err}");
                outcomes.push(unreadable(err));
            }
        }
    }
    let scanned = files.len();

    let reconciliation = Reconciler::new(&index, options.chunk_size)
        .with_normalizer(normalizer)
        .with_workers(options.workers)
        .diff(files, force);
    outcomes.extend(
        reconciliation
            .unreadable
            .into_iter()
            .map(|u| unreadable(u.error)),
    );
    outcomes.extend(
        reconciliation
            .conflicts
            .into_iter()
            .map(|c| FileOutcome::Conflict {
                key: format!("{prefix}{}", c.relative),
                path: c.path,
                kept: c.kept,
            }),
    );
    tracing::info!(
        "{}: {} to upload, {} unchanged",
        name,
        reconciliation.diff_set.len(),
        reconciliation.unchanged.len()
    );

    let dispatched = Dispatcher::new(store.as_ref(), &prefix)
        .with_workers(options.workers)
        .dry_run(options.dry_run)
        .upload(&reconciliation.diff_set);
    outcomes.extend(dispatched);

    Ok(PassReport {
        repository: name.0,
        scanned,
        unchanged: reconciliation.unchanged,
        outcomes,
    })
}

/// Run a pass for every repository in `scope`, isolating failures.
///
/// Only a failure to create the cache root, or an unknown repository
/// name, aborts the whole batch.
pub fn run(
    settings: &Settings,
    scope: &SyncScope,
    options: &PassOptions,
    mirror: &dyn Mirror,
    connect: &Connect<'_>,
) -> Result<Vec<RepositoryOutcome>, SyncError> {
    let cache_root = settings.ensure_cache()?;
    let normalizer = settings.normalizer();

    let selected: Vec<&RepositorySpec> = match scope {
        SyncScope::All => settings.repositories(),
        SyncScope::Repository(wanted) => {
            let found: Vec<_> = settings
                .repositories()
                .into_iter()
                .filter(|r| r.name().map(|n| &n.0 == wanted).unwrap_or(false))
                .collect();
            if found.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "repository",
                    reason: format!("no repository named '{wanted}'"),
                }
                .into());
            }
            found
        }
    };

    let mut outcomes = Vec::new();
    for spec in selected {
        let label = spec.label();
        tracing::info!("synch {label}");
        let result = run_pass(spec, &cache_root, options, &normalizer, mirror, connect);
        if let Err(err) = &result {
            tracing::error!("{label}: {err}");
        }
        outcomes.push(RepositoryOutcome {
            name: spec.name().ok().map(|n| n.0),
            label,
            result,
        });
    }
    Ok(outcomes)
}

fn unreadable(err: SyncError) -> FileOutcome {
    let path = match &err {
        SyncError::Read { path, .. } => path.clone(),
        _ => Default::default(),
    };
    FileOutcome::Unreadable {
        path,
        error: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
