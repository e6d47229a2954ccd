//! In-process object store.
//!
//! Computes etags with the same fingerprint scheme the bucket uses, so a
//! pass against a [`MemoryStore`] reconciles exactly like one against S3.
//! Failures can be injected per key or for listing.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use synch_core::fingerprint_bytes;

use crate::error::StoreError;
use crate::object::{ObjectStore, PutRequest, RemoteObject};

/// An object held by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub etag: String,
    pub content_type: String,
    pub public_read: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    put_log: Vec<String>,
    failing_keys: BTreeSet<String>,
    fail_listing: bool,
}

/// Thread-safe in-memory bucket.
#[derive(Debug)]
pub struct MemoryStore {
    chunk_size: NonZeroUsize,
    state: Mutex<State>,
}

impl MemoryStore {
    /// `chunk_size` is the part size uploads are assumed to use.
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        Self {
            chunk_size,
            state: Mutex::new(State::default()),
        }
    }

    /// Seed an object without recording a put.
    pub fn insert(&self, key: &str, body: &[u8]) {
        let object = self.stored(body, "application/octet-stream", true);
        self.lock().objects.insert(key.to_owned(), object);
    }

    /// Seed an object with an arbitrary etag.
    pub fn insert_with_etag(&self, key: &str, etag: &str) {
        self.lock().objects.insert(
            key.to_owned(),
            StoredObject {
                body: Vec::new(),
                etag: etag.to_owned(),
                content_type: "application/octet-stream".to_owned(),
                public_read: true,
            },
        );
    }

    /// Make every put to `key` fail.
    pub fn fail_puts_for(&self, key: &str) {
        self.lock().failing_keys.insert(key.to_owned());
    }

    /// Make every listing fail, as an unreachable bucket would.
    pub fn fail_listing(&self) {
        self.lock().fail_listing = true;
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.lock().objects.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Keys of every attempted put, failed ones included, in call order.
    pub fn put_log(&self) -> Vec<String> {
        self.lock().put_log.clone()
    }

    fn stored(&self, body: &[u8], content_type: &str, public_read: bool) -> StoredObject {
        StoredObject {
            body: body.to_vec(),
            etag: fingerprint_bytes(body, self.chunk_size).to_string(),
            content_type: content_type.to_owned(),
            public_read,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ObjectStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StoreError> {
        let state = self.lock();
        if state.fail_listing {
            return Err(StoreError::List {
                prefix: prefix.to_owned(),
                message: "listing disabled".to_owned(),
            });
        }
        Ok(state
            .objects
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| RemoteObject {
                key: k.clone(),
                etag: o.etag.clone(),
            })
            .collect())
    }

    fn put(&self, request: PutRequest<'_>) -> Result<(), StoreError> {
        let body = request.body.read_all();
        let mut state = self.lock();
        state.put_log.push(request.key.to_owned());
        if state.failing_keys.contains(request.key) {
            return Err(StoreError::Put {
                key: request.key.to_owned(),
                message: "injected failure".to_owned(),
            });
        }
        let body = body.map_err(|source| StoreError::Body {
            key: request.key.to_owned(),
            source,
        })?;
        let object = self.stored(&body, request.content_type, request.public_read);
        state.objects.insert(request.key.to_owned(), object);
        Ok(())
    }
}
