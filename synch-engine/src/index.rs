//! Remote listing index.
//!
//! A snapshot of the bucket under the destination prefix, keyed by the
//! same normalized relative path the reconciler computes for local files.
//! Built once per pass, before any diffing, and never refreshed.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use synch_core::PathNormalizer;
use synch_store::{ObjectStore, RemoteObject};

use crate::error::SyncError;

/// Read-only `relative path → remote object` snapshot.
#[derive(Debug, Clone, Default)]
pub struct RemoteIndex {
    prefix: String,
    entries: HashMap<String, RemoteObject>,
    collisions: Vec<String>,
}

impl RemoteIndex {
    /// Index `objects` listed under `prefix`.
    ///
    /// Keys outside the prefix and directory markers (keys ending in `/`)
    /// are ignored. When two keys normalize to the same relative path the
    /// first listed wins and the other key is kept in [`Self::collisions`].
    pub fn from_objects(
        prefix: &str,
        objects: impl IntoIterator<Item = RemoteObject>,
        normalizer: &dyn PathNormalizer,
    ) -> Self {
        let mut entries = HashMap::new();
        let mut collisions = Vec::new();
        for obj in objects {
            let Some(relative) = obj.key.strip_prefix(prefix) else {
                continue;
            };
            if relative.is_empty() || relative.ends_with('/') {
                continue;
            }
            let relative = normalizer.normalize(relative).into_owned();
            match entries.entry(relative) {
                Entry::Occupied(slot) => {
                    let kept: &RemoteObject = slot.get();
                    tracing::warn!(
                        "remote key {} maps to {}, already taken by {}; ignored",
                        obj.key,
                        slot.key(),
                        kept.key
                    );
                    collisions.push(obj.key);
                }
                Entry::Vacant(slot) => {
                    slot.insert(obj);
                }
            }
        }
        Self {
            prefix: prefix.to_owned(),
            entries,
            collisions,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn get(&self, relative: &str) -> Option<&RemoteObject> {
        self.entries.get(relative)
    }

    /// Remote keys ignored because an earlier key had the same relative path.
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// List everything under `prefix` and index it.
///
/// A listing failure is fatal for the pass and surfaces as
/// [`SyncError::Connection`].
pub fn build_index(
    store: &dyn ObjectStore,
    prefix: &str,
    normalizer: &dyn PathNormalizer,
) -> Result<RemoteIndex, SyncError> {
    let objects = store.list(prefix).map_err(SyncError::Connection)?;
    let index = RemoteIndex::from_objects(prefix, objects, normalizer);
    tracing::debug!("indexed {} remote objects under '{}'", index.len(), prefix);
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use synch_core::{Identity, PathRewrite, Rewrites};
    use synch_store::MemoryStore;

    fn store() -> MemoryStore {
        let s = MemoryStore::new(NonZeroUsize::new(1024).unwrap());
        s.insert("site/a.txt", b"a");
        s.insert("site/qb/Qb.js", b"q");
        s.insert("site/", b"");
        s.insert("site/dir/", b"");
        s.insert("elsewhere/b.txt", b"b");
        s
    }

    #[test]
    fn strips_prefix_and_skips_markers() {
        let index = build_index(&store(), "site/", &Identity).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("a.txt").unwrap().key, "site/a.txt");
        assert!(index.get("b.txt").is_none());
        assert_eq!(index.prefix(), "site/");
    }

    #[test]
    fn empty_prefix_indexes_whole_bucket() {
        let index = build_index(&store(), "", &Identity).unwrap();
        assert!(index.get("elsewhere/b.txt").is_some());
        assert!(index.get("site/a.txt").is_some());
    }

    #[test]
    fn keys_are_normalized() {
        let rewrites = Rewrites::new(vec![PathRewrite {
            from: "qb/Qb".to_owned(),
            to: "qb/qb".to_owned(),
        }]);
        let index = build_index(&store(), "site/", &rewrites).unwrap();
        assert!(index.get("qb/qb.js").is_some());
        assert!(index.get("qb/Qb.js").is_none());
    }

    #[test]
    fn colliding_keys_keep_the_first_listed() {
        let rewrites = Rewrites::new(vec![PathRewrite {
            from: "qb/Qb".to_owned(),
            to: "qb/qb".to_owned(),
        }]);
        let objects = ["site/qb/Qb.js", "site/qb/qb.js"].map(|key| RemoteObject {
            key: key.to_owned(),
            etag: format!("\"{key}\""),
        });
        let index = RemoteIndex::from_objects("site/", objects, &rewrites);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("qb/qb.js").unwrap().key, "site/qb/Qb.js");
        assert_eq!(index.collisions(), ["site/qb/qb.js"]);
    }

    #[test]
    fn listing_failure_is_a_connection_error() {
        let s = store();
        s.fail_listing();
        let err = build_index(&s, "site/", &Identity).unwrap_err();
        assert!(matches!(err, SyncError::Connection(_)));
    }
}
