pub mod diff;
pub mod etag;
pub mod sync;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;

use synch_core::{settings, DestinationSpec, Settings};
use synch_engine::{pipeline, FileOutcome, GitCli, PassOptions, RepositoryOutcome, SyncScope};
use synch_store::{ObjectStore, S3Store, StoreError};

pub const DEFAULT_SETTINGS: &str = "synch.yaml";

pub fn load_settings(path: &Path) -> Result<Settings> {
    settings::load_at(path).with_context(|| format!("failed to load settings from {}", path.display()))
}

/// Run the pipeline against S3 with the `git` executable, print the
/// results, and fail if any repository or file failed.
pub fn execute(
    settings_path: &Path,
    repo: Option<String>,
    tweak: impl FnOnce(&mut PassOptions),
    json: bool,
) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let mut options = PassOptions::from_settings(&settings);
    tweak(&mut options);

    let scope = repo.map_or(SyncScope::All, SyncScope::Repository);
    tracing::debug!(
        "settings {}: {} repositories, cache {}",
        settings_path.display(),
        settings.repositories().len(),
        settings.local_cache.display()
    );
    let mirror = GitCli::new(settings.debug);
    let chunk_size = options.chunk_size;
    let connect = move |d: &DestinationSpec| -> Result<Box<dyn ObjectStore>, StoreError> {
        Ok(Box::new(S3Store::connect(d, chunk_size)?))
    };

    let outcomes = pipeline::run(&settings, &scope, &options, &mirror, &connect)
        .context("synch failed")?;

    if json {
        print_json(&outcomes)?;
    } else {
        print_outcomes(&outcomes, options.dry_run);
    }

    let failed_repos = outcomes.iter().filter(|o| o.result.is_err()).count();
    let failed_files: usize = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok())
        .map(|r| r.failures())
        .sum();
    if failed_repos > 0 || failed_files > 0 {
        bail!("{failed_repos} repositories failed, {failed_files} files not uploaded");
    }
    Ok(())
}

pub fn settings_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS))
}

pub fn workers(n: Option<usize>) -> Result<Option<NonZeroUsize>> {
    match n {
        None => Ok(None),
        Some(n) => NonZeroUsize::new(n)
            .map(Some)
            .context("--workers must be at least 1"),
    }
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

fn print_outcomes(outcomes: &[RepositoryOutcome], dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if outcomes.is_empty() {
        println!("No repositories configured.");
        return;
    }

    for outcome in outcomes {
        let report = match &outcome.result {
            Ok(report) => report,
            Err(err) => {
                println!("{prefix}{} '{}': {err}", "✗".red(), outcome.label);
                continue;
            }
        };

        let written = if dry_run {
            report.would_upload()
        } else {
            report.uploaded()
        };
        if report.outcomes.is_empty() {
            println!("{prefix}{} '{}': nothing to do", "✓".green(), outcome.label);
            continue;
        }
        let mark = if report.has_failures() {
            "!".yellow()
        } else {
            "✓".green()
        };
        println!(
            "{prefix}{mark} '{}' ({} uploaded, {} unchanged, {} failed)",
            outcome.label,
            written,
            report.unchanged.len(),
            report.failures()
        );

        for o in &report.outcomes {
            match o {
                FileOutcome::Uploaded { key, content_type } => {
                    println!("  ↑  {key} ({content_type})")
                }
                FileOutcome::WouldUpload { key, content_type } => {
                    println!("  ~  {key} ({content_type})")
                }
                FileOutcome::Failed { key, error } => {
                    println!("  {}  {key}: {error}", "✗".red())
                }
                FileOutcome::Unreadable { path, error } => {
                    println!("  {}  {}: {error}", "✗".red(), path.display())
                }
                FileOutcome::Conflict { key, path, kept } => println!(
                    "  {}  {key}: {} skipped, already taken by {}",
                    "✗".red(),
                    path.display(),
                    kept.display()
                ),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct RepositoryJson {
    repository: Option<String>,
    description: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    scanned: usize,
    unchanged: usize,
    files: Vec<FileJson>,
}

#[derive(Serialize)]
struct FileJson {
    status: &'static str,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&FileOutcome> for FileJson {
    fn from(o: &FileOutcome) -> Self {
        match o {
            FileOutcome::Uploaded { key, content_type } => Self {
                status: "uploaded",
                target: key.clone(),
                content_type: Some(content_type.clone()),
                error: None,
            },
            FileOutcome::WouldUpload { key, content_type } => Self {
                status: "would_upload",
                target: key.clone(),
                content_type: Some(content_type.clone()),
                error: None,
            },
            FileOutcome::Failed { key, error } => Self {
                status: "failed",
                target: key.clone(),
                content_type: None,
                error: Some(error.clone()),
            },
            FileOutcome::Unreadable { path, error } => Self {
                status: "unreadable",
                target: path.display().to_string(),
                content_type: None,
                error: Some(error.clone()),
            },
            FileOutcome::Conflict { key, path, kept } => Self {
                status: "conflict",
                target: key.clone(),
                content_type: None,
                error: Some(format!(
                    "{} skipped, already taken by {}",
                    path.display(),
                    kept.display()
                )),
            },
        }
    }
}

fn print_json(outcomes: &[RepositoryOutcome]) -> Result<()> {
    let rows: Vec<RepositoryJson> = outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(report) => RepositoryJson {
                repository: o.name.clone(),
                description: o.label.clone(),
                ok: true,
                error: None,
                scanned: report.scanned,
                unchanged: report.unchanged.len(),
                files: report.outcomes.iter().map(FileJson::from).collect(),
            },
            Err(err) => RepositoryJson {
                repository: o.name.clone(),
                description: o.label.clone(),
                ok: false,
                error: Some(err.to_string()),
                scanned: 0,
                unchanged: 0,
                files: vec![],
            },
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
