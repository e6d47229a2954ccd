//! Reconciliation engine: decide, file by file, what must be uploaded.
//!
//! A file is selected when `force` is set, when the remote index has no
//! object at its relative path, or when its fingerprint differs from the
//! remote etag. Files with a hidden path segment are never selected.
//! Fingerprints are only computed for files that exist remotely and are
//! not forced. When normalization maps several files to one relative path,
//! only the first is considered; the rest are reported as conflicts.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use synch_core::{Identity, PathNormalizer};

use crate::error::SyncError;
use crate::fingerprint::fingerprint;
use crate::index::RemoteIndex;
use crate::pool::map_ordered;
use crate::scan::{is_hidden, LocalFile};

/// Why a file was selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// `force` was set; remote state was not consulted.
    Forced,
    /// No remote object at this relative path.
    New,
    /// Local fingerprint differs from the remote etag.
    Changed { local: String, remote: String },
}

/// One file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub file: LocalFile,
    /// Normalized relative path; the remote key is `prefix + relative`.
    pub relative: String,
    pub reason: Reason,
}

/// The files selected for upload in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSet {
    entries: Vec<DiffEntry>,
}

impl DiffSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DiffEntry> {
        self.entries.iter()
    }

    /// Relative paths of the selected files, in selection order.
    pub fn relative_paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.relative.as_str()).collect()
    }
}

impl From<Vec<DiffEntry>> for DiffSet {
    fn from(entries: Vec<DiffEntry>) -> Self {
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a DiffSet {
    type Item = &'a DiffEntry;
    type IntoIter = std::slice::Iter<'a, DiffEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A file that could not be fingerprinted.
#[derive(Debug)]
pub struct Unreadable {
    pub path: PathBuf,
    pub error: SyncError,
}

/// A file whose normalized relative path was already taken by another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: PathBuf,
    pub relative: String,
    /// The file that keeps `relative`.
    pub kept: PathBuf,
}

/// Result of reconciling a local tree against a remote index.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub diff_set: DiffSet,
    /// Relative paths whose fingerprint matched the remote etag.
    pub unchanged: Vec<String>,
    /// Files excluded because of a hidden path segment.
    pub excluded: usize,
    /// Files skipped because they could not be read.
    pub unreadable: Vec<Unreadable>,
    /// Files skipped because an earlier file has the same relative path.
    pub conflicts: Vec<Conflict>,
}

enum Verdict {
    Upload(DiffEntry),
    Unchanged(String),
    Unreadable(Unreadable),
}

/// Compares local files against a [`RemoteIndex`].
pub struct Reconciler<'a> {
    index: &'a RemoteIndex,
    chunk_size: NonZeroUsize,
    normalizer: &'a dyn PathNormalizer,
    workers: NonZeroUsize,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a RemoteIndex, chunk_size: NonZeroUsize) -> Self {
        Self {
            index,
            chunk_size,
            normalizer: &Identity,
            workers: NonZeroUsize::MIN,
        }
    }

    /// Rewrite local relative paths with `normalizer` before lookup. Must be
    /// the same hook the index was built with.
    pub fn with_normalizer(mut self, normalizer: &'a dyn PathNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Fingerprint up to `workers` files concurrently.
    pub fn with_workers(mut self, workers: NonZeroUsize) -> Self {
        self.workers = workers;
        self
    }

    pub fn diff(
        &self,
        local_files: impl IntoIterator<Item = LocalFile>,
        force: bool,
    ) -> Reconciliation {
        let mut out = Reconciliation::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let mut candidates = Vec::new();
        for file in local_files {
            let Some(relative) = self.relative_of(&file) else {
                out.excluded += 1;
                continue;
            };
            match claimed.entry(relative) {
                Entry::Occupied(slot) => {
                    tracing::warn!(
                        "{} maps to {}, already taken by {}; skipped",
                        file.path.display(),
                        slot.key(),
                        slot.get().display()
                    );
                    out.conflicts.push(Conflict {
                        path: file.path,
                        relative: slot.key().clone(),
                        kept: slot.get().clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    let relative = slot.key().clone();
                    slot.insert(file.path.clone());
                    candidates.push((file, relative));
                }
            }
        }

        let verdicts = map_ordered(candidates, self.workers, |(file, relative)| {
            self.judge(file, relative, force)
        });
        let mut selected = Vec::new();
        for verdict in verdicts {
            match verdict {
                Verdict::Upload(entry) => selected.push(entry),
                Verdict::Unchanged(relative) => out.unchanged.push(relative),
                Verdict::Unreadable(u) => out.unreadable.push(u),
            }
        }
        out.diff_set = DiffSet::from(selected);
        out
    }

    /// Normalized relative path, or `None` when the file is hidden before
    /// or after normalization.
    fn relative_of(&self, file: &LocalFile) -> Option<String> {
        if is_hidden(&file.relative) {
            return None;
        }
        let relative = self.normalizer.normalize(&file.relative).into_owned();
        (!is_hidden(&relative)).then_some(relative)
    }

    fn judge(&self, file: LocalFile, relative: String, force: bool) -> Verdict {
        if force {
            return Verdict::Upload(DiffEntry {
                file,
                relative,
                reason: Reason::Forced,
            });
        }

        let Some(remote) = self.index.get(&relative) else {
            return Verdict::Upload(DiffEntry {
                file,
                relative,
                reason: Reason::New,
            });
        };

        match fingerprint(&file, self.chunk_size) {
            Ok(local) if local.matches(&remote.etag) => {
                tracing::debug!("unchanged: {relative}");
                Verdict::Unchanged(relative)
            }
            Ok(local) => Verdict::Upload(DiffEntry {
                file,
                relative,
                reason: Reason::Changed {
                    local: local.to_string(),
                    remote: remote.etag.clone(),
                },
            }),
            Err(error) => {
                tracing::warn!("{error}");
                Verdict::Unreadable(Unreadable {
                    path: file.path,
                    error,
                })
            }
        }
    }
}

/// Sequential reconciliation with no path normalization.
pub fn diff(
    local_files: impl IntoIterator<Item = LocalFile>,
    remote_index: &RemoteIndex,
    force: bool,
    chunk_size: NonZeroUsize,
) -> Reconciliation {
    Reconciler::new(remote_index, chunk_size).diff(local_files, force)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use rstest::rstest;
    use synch_core::{fingerprint_bytes, PathRewrite, Rewrites};
    use synch_store::RemoteObject;
    use tempfile::TempDir;

    const CHUNK: NonZeroUsize = match NonZeroUsize::new(8) {
        Some(n) => n,
        None => panic!(),
    };

    fn file(root: &Path, rel: &str, content: &[u8]) -> LocalFile {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        LocalFile::new(root, &path)
    }

    fn index(entries: &[(&str, &[u8])]) -> RemoteIndex {
        RemoteIndex::from_objects(
            "p/",
            entries.iter().map(|(rel, body)| RemoteObject {
                key: format!("p/{rel}"),
                etag: fingerprint_bytes(body, CHUNK).to_string(),
            }),
            &Identity,
        )
    }

    #[test]
    fn new_file_is_selected() {
        let tmp = TempDir::new().unwrap();
        let a = file(tmp.path(), "a.txt", b"hello");
        let r = diff(vec![a], &index(&[]), false, CHUNK);
        assert_eq!(r.diff_set.relative_paths(), vec!["a.txt"]);
        assert_eq!(r.diff_set.iter().next().unwrap().reason, Reason::New);
    }

    #[test]
    fn matching_file_is_unchanged() {
        let tmp = TempDir::new().unwrap();
        let a = file(tmp.path(), "a.txt", b"hello");
        let r = diff(vec![a], &index(&[("a.txt", b"hello")]), false, CHUNK);
        assert!(r.diff_set.is_empty());
        assert_eq!(r.unchanged, vec!["a.txt"]);
    }

    #[test]
    fn changed_file_is_selected_with_both_etags() {
        let tmp = TempDir::new().unwrap();
        let a = file(tmp.path(), "a.txt", b"hello2");
        let r = diff(vec![a], &index(&[("a.txt", b"hello")]), false, CHUNK);
        let entry = r.diff_set.iter().next().expect("selected");
        match &entry.reason {
            Reason::Changed { local, remote } => {
                assert_ne!(local, remote);
                assert_eq!(remote, "\"5d41402abc4b2a76b9719d911017c592\"");
            }
            other => panic!("expected changed, got {other:?}"),
        }
    }

    #[test]
    fn force_selects_everything_without_reading() {
        let tmp = TempDir::new().unwrap();
        let a = file(tmp.path(), "a.txt", b"hello");
        let mut gone = file(tmp.path(), "b.txt", b"x");
        gone.path = tmp.path().join("missing.txt");
        let idx = index(&[("a.txt", b"hello"), ("b.txt", b"x")]);
        let r = diff(vec![a, gone], &idx, true, CHUNK);
        assert_eq!(r.diff_set.relative_paths(), vec!["a.txt", "b.txt"]);
        assert!(r.diff_set.iter().all(|e| e.reason == Reason::Forced));
        assert!(r.unreadable.is_empty());
    }

    #[rstest]
    #[case::forced_new("dir/.hidden/file.txt", true, false)]
    #[case::unforced_remote("dir/.hidden/file.txt", false, true)]
    #[case::dotfile_at_root(".env", true, true)]
    #[case::dotfile_nested("a/b/.keep", false, false)]
    fn hidden_paths_are_excluded(#[case] rel: &str, #[case] force: bool, #[case] remote: bool) {
        let tmp = TempDir::new().unwrap();
        let hidden = file(tmp.path(), rel, b"x");
        let idx = if remote { index(&[(rel, b"y")]) } else { index(&[]) };
        let r = diff(vec![hidden], &idx, force, CHUNK);
        assert!(r.diff_set.is_empty());
        assert!(r.unchanged.is_empty());
        assert_eq!(r.excluded, 1);
    }

    #[test]
    fn rewrite_into_a_hidden_path_is_excluded() {
        let tmp = TempDir::new().unwrap();
        let a = file(tmp.path(), "cfg/env", b"x");
        let rewrites = Rewrites::new(vec![PathRewrite {
            from: "cfg/env".to_owned(),
            to: "cfg/.env".to_owned(),
        }]);
        let r = Reconciler::new(&index(&[]), CHUNK)
            .with_normalizer(&rewrites)
            .diff(vec![a], true);
        assert!(r.diff_set.is_empty());
        assert_eq!(r.excluded, 1);
    }

    #[test]
    fn unreadable_file_is_neither_selected_nor_unchanged() {
        let tmp = TempDir::new().unwrap();
        let mut a = file(tmp.path(), "a.txt", b"hello");
        a.path = tmp.path().join("vanished.txt");
        let r = diff(vec![a], &index(&[("a.txt", b"hello")]), false, CHUNK);
        assert!(r.diff_set.is_empty());
        assert!(r.unchanged.is_empty());
        assert_eq!(r.unreadable.len(), 1);
        assert!(matches!(r.unreadable[0].error, SyncError::Read { .. }));
    }

    #[test]
    fn normalizer_applies_to_lookup_and_selected_path() {
        let tmp = TempDir::new().unwrap();
        let q = file(tmp.path(), "qb/Qb.js", b"q");
        let n = file(tmp.path(), "qb/Qb2.js", b"n");
        let rewrites = Rewrites::new(vec![PathRewrite {
            from: "qb/Qb".to_owned(),
            to: "qb/qb".to_owned(),
        }]);
        let idx = index(&[("qb/qb.js", b"q")]);
        let r = Reconciler::new(&idx, CHUNK)
            .with_normalizer(&rewrites)
            .diff(vec![q, n], false);
        assert_eq!(r.unchanged, vec!["qb/qb.js"]);
        assert_eq!(r.diff_set.relative_paths(), vec!["qb/qb2.js"]);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    fn colliding_paths_keep_the_first_file(#[case] workers: usize) {
        let tmp = TempDir::new().unwrap();
        let upper = file(tmp.path(), "qb/Qb.js", b"upper");
        let lower = file(tmp.path(), "qb/qb.js", b"lower");
        let rewrites = Rewrites::new(vec![PathRewrite {
            from: "qb/Qb".to_owned(),
            to: "qb/qb".to_owned(),
        }]);
        let r = Reconciler::new(&index(&[]), CHUNK)
            .with_normalizer(&rewrites)
            .with_workers(NonZeroUsize::new(workers).unwrap())
            .diff(vec![upper.clone(), lower.clone()], false);

        assert_eq!(r.diff_set.relative_paths(), vec!["qb/qb.js"]);
        assert_eq!(r.diff_set.iter().next().unwrap().file, upper);
        assert_eq!(
            r.conflicts,
            vec![Conflict {
                path: lower.path,
                relative: "qb/qb.js".to_owned(),
                kept: upper.path,
            }]
        );
    }

    #[test]
    fn parallel_diff_matches_sequential() {
        let tmp = TempDir::new().unwrap();
        let mut files = Vec::new();
        let mut remote: Vec<(String, Vec<u8>)> = Vec::new();
        for i in 0..40 {
            let rel = format!("f{i:02}.txt");
            let body = format!("content {i}").into_bytes();
            files.push(file(tmp.path(), &rel, &body));
            if i % 3 == 0 {
                remote.push((rel, body));
            } else if i % 3 == 1 {
                remote.push((rel, b"stale".to_vec()));
            }
        }
        let entries: Vec<(&str, &[u8])> = remote
            .iter()
            .map(|(r, b)| (r.as_str(), b.as_slice()))
            .collect();
        let idx = index(&entries);

        let seq = diff(files.clone(), &idx, false, CHUNK);
        let par = Reconciler::new(&idx, CHUNK)
            .with_workers(NonZeroUsize::new(6).unwrap())
            .diff(files, false);
        assert_eq!(seq.diff_set, par.diff_set);
        assert_eq!(seq.unchanged, par.unchanged);
        assert_eq!(par.unchanged.len(), 14);
        assert_eq!(par.diff_set.len(), 26);
    }
}
