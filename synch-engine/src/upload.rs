//! Upload dispatcher.
//!
//! Writes every entry of a [`DiffSet`] to `destination_prefix + relative`,
//! public-read, with the guessed content type. Each file is attempted
//! exactly once and independently: a failure is logged at warn level,
//! recorded, and the remaining files are still attempted.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use synch_store::{Body, ObjectStore, PutRequest};

use crate::error::{read_err, SyncError};
use crate::pool::map_ordered;
use crate::reconcile::{DiffEntry, DiffSet};

/// Outcome of one file in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Written to the bucket.
    Uploaded { key: String, content_type: String },
    /// Dry run: would have been written.
    WouldUpload { key: String, content_type: String },
    /// The write was attempted and failed.
    Failed { key: String, error: String },
    /// The local file could not be read; nothing was written.
    Unreadable { path: PathBuf, error: String },
    /// Another file already claimed this key; nothing was written.
    Conflict { key: String, path: PathBuf, kept: PathBuf },
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failed { .. } | Self::Unreadable { .. } | Self::Conflict { .. }
        )
    }
}

/// Pushes a [`DiffSet`] to a bucket.
pub struct Dispatcher<'a> {
    store: &'a dyn ObjectStore,
    prefix: &'a str,
    workers: NonZeroUsize,
    dry_run: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a dyn ObjectStore, destination_prefix: &'a str) -> Self {
        Self {
            store,
            prefix: destination_prefix,
            workers: NonZeroUsize::MIN,
            dry_run: false,
        }
    }

    /// Upload up to `workers` files concurrently.
    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    /// Report what would be written without calling `put`.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Attempt every entry; outcomes are returned in diff-set order.
    pub fn upload(&self, diff_set: &DiffSet) -> Vec<FileOutcome> {
        let total = diff_set.len();
        let done = AtomicUsize::new(0);
        let entries: Vec<&DiffEntry> = diff_set.iter().collect();
        map_ordered(entries, self.workers, |entry| {
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.dry_run {
                tracing::info!("Upload {n} of {total}");
            }
            self.upload_one(entry)
        })
    }

    fn upload_one(&self, entry: &DiffEntry) -> FileOutcome {
        let key = format!("{}{}", self.prefix, entry.relative);
        let content_type = entry.file.content_type.clone();

        if self.dry_run {
            tracing::info!("[dry-run] would upload {key} ({content_type})");
            return FileOutcome::WouldUpload { key, content_type };
        }

        let len = match std::fs::metadata(&entry.file.path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                let err = read_err(&entry.file.path, e);
                tracing::warn!("{err}");
                return FileOutcome::Unreadable {
                    path: entry.file.path.clone(),
                    error: err.to_string(),
                };
            }
        };

        tracing::info!("upload {key} ({content_type})");
        let put = self.store.put(PutRequest {
            key: &key,
            body: Body::File {
                path: &entry.file.path,
                len,
            },
            content_type: &content_type,
            public_read: true,
        });
        match put {
            Ok(()) => FileOutcome::Uploaded { key, content_type },
            Err(source) => {
                let err = SyncError::Upload {
                    key: key.clone(),
                    source,
                };
                tracing::warn!("{err} ({content_type})");
                FileOutcome::Failed {
                    key,
                    error: err.to_string(),
                }
            }
        }
    }
}

/// Sequential upload of `diff_set` under `destination_prefix`.
pub fn upload(
    diff_set: &DiffSet,
    store: &dyn ObjectStore,
    destination_prefix: &str,
) -> Vec<FileOutcome> {
    Dispatcher::new(store, destination_prefix).upload(diff_set)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
