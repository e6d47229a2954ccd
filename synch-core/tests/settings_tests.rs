//! Settings loading against files on disk.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use synch_core::{settings, ConfigError, PathNormalizer};

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("settings.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = settings::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("settings.yaml"));
}

#[test]
fn load_wrong_shape_returns_parse_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("settings.yaml");
    file.write_str("- this is a list, not a mapping\n").expect("write");

    let err = settings::load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn load_full_document() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let cache = dir.child("cache");
    let file = dir.child("settings.yaml");
    file.write_str(&format!(
        r#"
local_cache: {}
force: true
debug: true
workers: 4
chunk_size: 5242880
path_rewrites:
  - {{from: "qb/Qb", to: "qb/qb"}}
repos:
  - description: public site
    source:
      url: https://github.com/org/site.git
      branch: gh-pages
      directory: html
    destination:
      bucket: static.example.org
      region: us-west-2
      directory: /site/
"#,
        cache.path().display()
    ))
    .expect("write");

    let loaded = settings::load_at(file.path()).expect("load");
    assert!(loaded.force);
    assert!(loaded.debug);
    assert_eq!(loaded.workers.get(), 4);
    assert_eq!(loaded.chunk_size.get(), 5 * 1024 * 1024);
    assert_eq!(loaded.normalizer().normalize("js/qb/Qb.js"), "js/qb/qb.js");

    let repos = loaded.repositories();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].label(), "public site");
    assert_eq!(repos[0].destination.prefix(), "site/");
    assert_eq!(repos[0].validate().expect("valid").0, "site");

    cache.assert(predicate::path::missing());
    loaded.ensure_cache().expect("ensure cache");
    cache.assert(predicate::path::is_dir());
}
