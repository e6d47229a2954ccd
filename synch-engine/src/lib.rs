//! # synch-engine
//!
//! Mirrors the working tree of a git branch into an object-store bucket,
//! uploading only files whose content differs from what the bucket holds.
//!
//! Call [`pipeline::run`] to process every configured repository, or
//! [`pipeline::run_pass`] for a single one. The building blocks are
//! usable on their own: [`scan`](scan::scan) → [`fingerprint`] →
//! [`diff`](reconcile::diff) against a [`RemoteIndex`] → [`upload`](upload::upload).

pub mod error;
pub mod fingerprint;
pub mod index;
pub mod mirror;
pub mod pipeline;
mod pool;
pub mod reconcile;
pub mod scan;
pub mod upload;

pub use error::SyncError;
pub use fingerprint::{fingerprint, fingerprint_path};
pub use index::{build_index, RemoteIndex};
pub use mirror::{prepare_mirror, GitCli, Mirror};
pub use pipeline::{run, run_pass, PassOptions, PassReport, RepositoryOutcome, SyncScope};
pub use reconcile::{diff, Conflict, DiffEntry, DiffSet, Reason, Reconciler, Reconciliation};
pub use scan::{is_hidden, scan, LocalFile, Scanner};
pub use upload::{upload, Dispatcher, FileOutcome};
