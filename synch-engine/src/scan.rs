//! Local tree scanner.
//!
//! Walks the published subdirectory of the mirror and yields every regular
//! file whose relative path has no hidden (`.`-prefixed) component.
//! Hidden directories are pruned rather than walked. Symbolic links are
//! never walked into. A link to a regular file is yielded under the link's
//! own path only when its target resolves inside the root.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{read_err, SyncError};

/// A file found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path as found on disk.
    pub path: PathBuf,
    /// `/`-separated path below the scan root, no leading separator.
    pub relative: String,
    /// MIME type guessed from the extension.
    pub content_type: String,
}

impl LocalFile {
    /// Describe `path`, found under `root`.
    pub fn new(root: &Path, path: &Path) -> Self {
        let relative = relative_path(root, path);
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();
        Self {
            path: path.to_path_buf(),
            relative,
            content_type,
        }
    }
}

/// A restartable scan of one directory tree.
///
/// Each call to [`Scanner::iter`] starts a fresh walk; nothing is read
/// until the iterator is advanced.
#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
}

/// Scan `root` recursively. See [`Scanner`].
pub fn scan(root: impl Into<PathBuf>) -> Scanner {
    Scanner { root: root.into() }
}

impl Scanner {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree in file-name order. Directory entries that cannot be
    /// read are yielded as [`SyncError::Read`] and the walk continues.
    pub fn iter(&self) -> impl Iterator<Item = Result<LocalFile, SyncError>> + '_ {
        let mut resolved_root: Option<Option<PathBuf>> = None;
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden_segment(&e.file_name().to_string_lossy()))
            .filter_map(move |entry| match entry {
                Ok(e) if e.depth() > 0 && e.file_type().is_file() => {
                    Some(Ok(LocalFile::new(&self.root, e.path())))
                }
                Ok(e) if e.depth() > 0 && e.path_is_symlink() => {
                    let root = resolved_root
                        .get_or_insert_with(|| std::fs::canonicalize(&self.root).ok())
                        .as_deref()?;
                    link_inside(root, e.path()).then(|| Ok(LocalFile::new(&self.root, e.path())))
                }
                Ok(_) => None,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    Some(Err(read_err(path, err.into())))
                }
            })
    }
}

/// Whether the symlink at `link` resolves to a regular, non-hidden file
/// under `root`.
fn link_inside(root: &Path, link: &Path) -> bool {
    match std::fs::canonicalize(link) {
        Ok(target) if target.is_file() && visible_under(root, &target) => true,
        Ok(target) => {
            tracing::debug!(
                "skip {}: links to {}, not a visible file under the scan root",
                link.display(),
                target.display()
            );
            false
        }
        Err(e) => {
            tracing::debug!("skip {}: {e}", link.display());
            false
        }
    }
}

fn visible_under(root: &Path, target: &Path) -> bool {
    match target.strip_prefix(root) {
        Ok(rel) => !rel
            .components()
            .any(|c| is_hidden_segment(&c.as_os_str().to_string_lossy())),
        Err(_) => false,
    }
}

/// True when any `/`-separated component of `relative` starts with a dot.
pub fn is_hidden(relative: &str) -> bool {
    relative.split('/').any(is_hidden_segment)
}

fn is_hidden_segment(segment: &str) -> bool {
    segment.starts_with('.')
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relatives(scanner: &Scanner) -> Vec<String> {
        let mut out: Vec<String> = scanner
            .iter()
            .map(|r| r.expect("scan entry").relative)
            .collect();
        out.sort();
        out
    }

    #[test]
    fn yields_nested_files_with_forward_slashes() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "index.html", "<html/>");
        touch(tmp.path(), "css/site.css", "body{}");
        touch(tmp.path(), "js/lib/app.js", "0");

        assert_eq!(
            relatives(&scan(tmp.path())),
            vec!["css/site.css", "index.html", "js/lib/app.js"]
        );
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.txt", "a");
        touch(tmp.path(), ".gitignore", "x");
        touch(tmp.path(), ".git/config", "x");
        touch(tmp.path(), "dir/.hidden/file.txt", "x");
        touch(tmp.path(), "dir/.env", "x");
        touch(tmp.path(), "dir/visible.txt", "x");

        assert_eq!(relatives(&scan(tmp.path())), vec!["a.txt", "dir/visible.txt"]);
    }

    #[test]
    fn hidden_root_is_still_scanned() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join(".cache").join("repo");
        touch(&root, "a.txt", "a");
        assert_eq!(relatives(&scan(&root)), vec!["a.txt"]);
    }

    #[test]
    fn scan_is_restartable() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.txt", "a");
        touch(tmp.path(), "b/c.txt", "c");
        let scanner = scan(tmp.path());
        assert_eq!(relatives(&scanner), relatives(&scanner));
    }

    #[test]
    fn content_type_comes_from_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "index.html", "");
        touch(tmp.path(), "data.bin.unknownext", "");
        let mut files: Vec<LocalFile> = scan(tmp.path()).iter().map(Result::unwrap).collect();
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        assert_eq!(files[0].content_type, "application/octet-stream");
        assert_eq!(files[1].content_type, "text/html");
    }

    #[test]
    #[cfg(unix)]
    fn links_inside_the_root_are_yielded_and_escapes_are_not() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "secret.txt", "s");
        touch(tmp.path(), "a.txt", "a");
        touch(tmp.path(), "docs/guide.md", "g");
        touch(tmp.path(), ".git/config", "x");
        std::os::unix::fs::symlink(tmp.path().join(".git/config"), tmp.path().join("config.txt"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("escape")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), tmp.path().join("leak.txt"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("a.txt"), tmp.path().join("alias.txt"))
            .unwrap();
        std::os::unix::fs::symlink("../a.txt", tmp.path().join("docs/latest.txt")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("docs"), tmp.path().join("docs-link")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("nowhere"), tmp.path().join("dangling.txt"))
            .unwrap();

        assert_eq!(
            relatives(&scan(tmp.path())),
            vec!["a.txt", "alias.txt", "docs/guide.md", "docs/latest.txt"]
        );
    }

    #[test]
    #[cfg(unix)]
    fn linked_file_is_read_through_the_link() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.txt", "contents");
        std::os::unix::fs::symlink(tmp.path().join("a.txt"), tmp.path().join("latest.txt"))
            .unwrap();
        let linked = scan(tmp.path())
            .iter()
            .map(Result::unwrap)
            .find(|f| f.relative == "latest.txt")
            .expect("link yielded");
        assert_eq!(linked.path, tmp.path().join("latest.txt"));
        assert_eq!(fs::read(&linked.path).unwrap(), b"contents");
    }

    #[test]
    fn missing_root_yields_read_error() {
        let tmp = TempDir::new().unwrap();
        let results: Vec<_> = scan(tmp.path().join("absent")).iter().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SyncError::Read { .. })));
    }

    #[test]
    fn walk_is_in_file_name_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.txt", "b");
        touch(tmp.path(), "qb/qb.js", "l");
        touch(tmp.path(), "a.txt", "a");
        touch(tmp.path(), "qb/Qb.js", "u");

        let walked: Vec<String> = scan(tmp.path())
            .iter()
            .map(|r| r.expect("scan entry").relative)
            .collect();
        assert_eq!(walked, vec!["a.txt", "b.txt", "qb/Qb.js", "qb/qb.js"]);
    }

    #[rstest]
    #[case(".env", true)]
    #[case("dir/.hidden/file.txt", true)]
    #[case("a/b/.c", true)]
    #[case("a/b.c/d", false)]
    #[case("index.html", false)]
    fn is_hidden_checks_every_segment(#[case] relative: &str, #[case] hidden: bool) {
        assert_eq!(is_hidden(relative), hidden);
    }
}
