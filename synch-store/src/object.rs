//! The object-store seam.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::StoreError;

/// One object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full key, including the destination prefix.
    pub key: String,
    /// Store-reported content identity, quotes included.
    pub etag: String,
}

/// Content of a write: bytes already in memory, or a file the store reads
/// one part at a time.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    Bytes(&'a [u8]),
    File { path: &'a Path, len: u64 },
}

impl<'a> Body<'a> {
    pub fn len(&self) -> u64 {
        match self {
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole body.
    pub fn read_all(&self) -> io::Result<Cow<'a, [u8]>> {
        match *self {
            Body::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
            Body::File { path, .. } => std::fs::read(path).map(Cow::Owned),
        }
    }

    /// Up to `len` bytes starting at `offset`.
    pub fn read_range(&self, offset: u64, len: usize) -> io::Result<Cow<'a, [u8]>> {
        match *self {
            Body::Bytes(bytes) => {
                let start = usize::try_from(offset).map_or(bytes.len(), |o| o.min(bytes.len()));
                let end = start.saturating_add(len).min(bytes.len());
                Ok(Cow::Borrowed(&bytes[start..end]))
            }
            Body::File { path, .. } => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::Start(offset))?;
                let mut part = Vec::with_capacity(len);
                file.take(len as u64).read_to_end(&mut part)?;
                Ok(Cow::Owned(part))
            }
        }
    }
}

/// A single object write.
#[derive(Debug, Clone, Copy)]
pub struct PutRequest<'a> {
    pub key: &'a str,
    pub body: Body<'a>,
    pub content_type: &'a str,
    pub public_read: bool,
}

/// Minimal bucket surface a pass needs. No delete, no read-back.
///
/// Implementations must be shareable across upload workers.
pub trait ObjectStore: Send + Sync {
    /// Every object whose key starts with `prefix`.
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError>;

    /// Write `request.body` at `request.key`, replacing any existing object.
    fn put(&self, request: PutRequest<'_>) -> Result<(), StoreError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Box<T> {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError> {
        (**self).list(prefix)
    }

    fn put(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        (**self).put(request)
    }
}

impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError> {
        (**self).list(prefix)
    }

    fn put(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        (**self).put(request)
    }
}
