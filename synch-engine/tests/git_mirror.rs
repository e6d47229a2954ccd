//! `GitCli` against a real repository on disk. Skipped when `git` is absent.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use synch_core::{DestinationSpec, Identity, RepositorySpec, SourceSpec};
use synch_engine::{run_pass, FileOutcome, GitCli, PassOptions};
use synch_store::{MemoryStore, ObjectStore, StoreError};
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=synch", "-c", "user.email=synch@example.org"])
        .args(args)
        .current_dir(dir)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed");
}

fn commit_file(repo: &Path, rel: &str, content: &str) {
    let path = repo.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    git(repo, &["add", "-A"]);
    git(repo, &["commit", "-q", "-m", rel]);
}

fn spec(origin: &Path) -> RepositorySpec {
    RepositorySpec {
        description: None,
        source: SourceSpec {
            url: origin.display().to_string(),
            branch: Some("publish".to_owned()),
            name: None,
            directory: PathBuf::from("html"),
        },
        destination: DestinationSpec {
            bucket: "b".to_owned(),
            region: "r".to_owned(),
            directory: "site".to_owned(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
        },
        force: false,
    }
}

#[test]
fn clone_then_pull_publishes_only_new_commits() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let _ = env_logger::builder().is_test(true).try_init();
    let work = TempDir::new().unwrap();
    let origin = work.path().join("site.git");
    fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "-q"]);
    git(&origin, &["checkout", "-q", "-b", "publish"]);
    commit_file(&origin, "html/index.html", "<html>v1</html>");
    commit_file(&origin, "html/about.html", "<html>about</html>");
    commit_file(&origin, "README.md", "not published");

    let cache = work.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    let store = Arc::new(MemoryStore::new(NonZeroUsize::new(1024).unwrap()));
    let shared = Arc::clone(&store);
    let connect = move |_: &DestinationSpec| -> Result<Box<dyn ObjectStore>, StoreError> {
        Ok(Box::new(Arc::clone(&shared)))
    };
    let options = PassOptions {
        force: false,
        dry_run: false,
        chunk_size: NonZeroUsize::new(1024).unwrap(),
        workers: NonZeroUsize::MIN,
    };
    let git_cli = GitCli::new(true);
    let spec = spec(&origin);

    let first = run_pass(&spec, &cache, &options, &Identity, &git_cli, &connect).expect("first");
    assert!(cache.join("site").join(".git").is_dir());
    assert_eq!(first.uploaded(), 2);
    assert!(store.get("site/index.html").is_some());
    assert!(store.get("site/README.md").is_none());

    commit_file(&origin, "html/index.html", "<html>v2</html>");
    let second = run_pass(&spec, &cache, &options, &Identity, &git_cli, &connect).expect("second");
    let keys: Vec<&str> = second
        .outcomes
        .iter()
        .filter_map(|o| match o {
            FileOutcome::Uploaded { key, .. } => Some(key.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec!["site/index.html"]);
    assert_eq!(store.get("site/index.html").unwrap().body, b"<html>v2</html>");
}

#[test]
fn unknown_branch_is_a_mirror_error() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }

    let work = TempDir::new().unwrap();
    let origin = work.path().join("site.git");
    fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "-q"]);
    git(&origin, &["checkout", "-q", "-b", "main"]);
    commit_file(&origin, "html/index.html", "x");

    let cache = work.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    let connect = |_: &DestinationSpec| -> Result<Box<dyn ObjectStore>, StoreError> {
        panic!("must not connect after a mirror failure")
    };
    let options = PassOptions {
        force: false,
        dry_run: false,
        chunk_size: NonZeroUsize::new(1024).unwrap(),
        workers: NonZeroUsize::MIN,
    };
    let err = run_pass(&spec(&origin), &cache, &options, &Identity, &GitCli::default(), &connect)
        .unwrap_err();
    assert!(matches!(err, synch_engine::SyncError::Mirror { step: "checkout", .. }));
}
