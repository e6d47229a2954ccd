//! Content fingerprints that reproduce the object store's etag.
//!
//! The store identifies an object by the MD5 of its bytes when it was
//! written in one part, and by the MD5 of the concatenated per-part MD5
//! digests, suffixed with `-<part count>`, when it was written as a
//! multi-part upload. Both forms are reported wrapped in double quotes.
//!
//! `chunk_size` must equal the part size the uploader uses, otherwise
//! multi-part fingerprints never match.

use std::fmt;
use std::io::{self, Read};
use std::num::NonZeroUsize;

/// Part size and multi-part threshold: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Smallest part size the store accepts for every part but the last.
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Most parts a single multi-part upload may have.
pub const MAX_PARTS: usize = 10_000;

/// Etag of zero-length content, exactly as the store reports it.
pub const EMPTY_FINGERPRINT: &str = "\"d41d8cd98f00b204e9800998ecf8427e\"";

const READ_BUFFER: usize = 64 * 1024;

const EMPTY_DIGEST: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// A locally computed content identity.
///
/// `Display` renders the etag form, which is what gets compared against
/// the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: String,
    parts: Option<usize>,
}

impl Fingerprint {
    /// Lower-case hex digest, without quotes or part suffix.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Number of chunks, when the content spans more than one.
    pub fn parts(&self) -> Option<usize> {
        self.parts
    }

    pub fn is_multipart(&self) -> bool {
        self.parts.is_some()
    }

    /// Exact string comparison against a store-reported etag.
    pub fn matches(&self, etag: &str) -> bool {
        self.to_string() == etag
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parts {
            Some(n) => write!(f, "\"{}-{}\"", self.digest, n),
            None => write!(f, "\"{}\"", self.digest),
        }
    }
}

/// Fingerprint `bytes` split into consecutive `chunk_size` chunks.
///
/// Pure: identical bytes and chunk size always give the same result.
pub fn fingerprint_bytes(bytes: &[u8], chunk_size: NonZeroUsize) -> Fingerprint {
    let digests: Vec<md5::Digest> = bytes.chunks(chunk_size.get()).map(md5::compute).collect();
    from_digests(&digests)
}

/// Fingerprint everything `reader` yields, holding at most one read
/// buffer in memory rather than a whole chunk.
pub fn fingerprint_reader<R: Read>(
    mut reader: R,
    chunk_size: NonZeroUsize,
) -> io::Result<Fingerprint> {
    let chunk_size = chunk_size.get();
    let mut buf = vec![0u8; READ_BUFFER.min(chunk_size)];
    let mut digests = Vec::new();
    let mut current = md5::Context::new();
    let mut in_chunk = 0;

    loop {
        let want = buf.len().min(chunk_size - in_chunk);
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        current.consume(&buf[..n]);
        in_chunk += n;
        if in_chunk == chunk_size {
            digests.push(std::mem::replace(&mut current, md5::Context::new()).compute());
            in_chunk = 0;
        }
    }
    if in_chunk > 0 {
        digests.push(current.compute());
    }
    Ok(from_digests(&digests))
}

fn from_digests(digests: &[md5::Digest]) -> Fingerprint {
    match digests {
        [] => Fingerprint {
            digest: EMPTY_DIGEST.to_owned(),
            parts: None,
        },
        [single] => Fingerprint {
            digest: format!("{single:x}"),
            parts: None,
        },
        many => {
            let mut ctx = md5::Context::new();
            for d in many {
                ctx.consume(d.0);
            }
            Fingerprint {
                digest: format!("{:x}", ctx.compute()),
                parts: Some(many.len()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
