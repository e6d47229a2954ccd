//! File-level fingerprinting.
//!
//! Streams a file through the store's etag scheme (see
//! [`synch_core::fingerprint`]), so memory use does not grow with file
//! size. A read failure is returned to the caller; it is never mapped to
//! "changed" or "unchanged".

use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::Path;

use synch_core::{fingerprint_reader, Fingerprint};

use crate::error::{read_err, SyncError};
use crate::scan::LocalFile;

/// Fingerprint a scanned file.
pub fn fingerprint(file: &LocalFile, chunk_size: NonZeroUsize) -> Result<Fingerprint, SyncError> {
    fingerprint_path(&file.path, chunk_size)
}

/// Fingerprint an arbitrary path.
pub fn fingerprint_path(path: &Path, chunk_size: NonZeroUsize) -> Result<Fingerprint, SyncError> {
    let file = File::open(path).map_err(|e| read_err(path, e))?;
    fingerprint_reader(BufReader::new(file), chunk_size).map_err(|e| read_err(path, e))
}
