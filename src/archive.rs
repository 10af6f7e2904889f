//! Append-only archive of raw search API responses.
//!
//! Quota-limited search adapters write every response they receive as one
//! JSON line to `<dir>/<run_stamp>_<adapter>_raw.jsonl`. `gallery reprocess`
//! reads the files back and re-parses them with the same functions the live
//! adapters use, so candidates can be rebuilt without spending quota.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::QuerySpec;

const ARCHIVE_SUFFIX: &str = "_raw.jsonl";

/// One archived API response and the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Adapter that issued the request (`serpapi`, `google_images`, ...).
    pub adapter: String,
    pub query: String,
    /// `news`, `images` or `video`.
    pub search_type: String,
    #[serde(default)]
    pub category_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub task_hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    pub response: Value,
}

impl RawRecord {
    pub fn new(adapter: &str, spec: &QuerySpec, search_type: &str, response: Value) -> Self {
        Self {
            adapter: adapter.to_string(),
            query: spec.query.clone(),
            search_type: search_type.to_string(),
            category_hint: spec.category.clone(),
            task_hints: spec.tasks.clone(),
            platform: None,
            fetched_at: Some(Utc::now()),
            response,
        }
    }

    /// The query and hints this response was fetched for.
    pub fn query_spec(&self) -> QuerySpec {
        QuerySpec {
            query: self.query.clone(),
            category: self.category_hint.clone(),
            tasks: self.task_hints.clone(),
        }
    }
}

/// Writer for one run's archive files.
pub struct RawArchive {
    dir: PathBuf,
    run_stamp: String,
    write_lock: Mutex<()>,
}

impl RawArchive {
    /// Archive stamped with the current UTC time.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_stamp(dir, Utc::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn with_stamp(dir: impl Into<PathBuf>, run_stamp: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_stamp: run_stamp.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, adapter: &str) -> PathBuf {
        self.dir
            .join(format!("{}_{}{}", self.run_stamp, adapter, ARCHIVE_SUFFIX))
    }

    /// Append one record to its adapter's file.
    pub fn append(&self, record: &RawRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let path = self.path_for(&record.adapter);

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("archive writer lock poisoned"))?;
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create archive dir: {}", self.dir.display()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open archive: {}", path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Read every record of an archive file. Malformed lines are logged and skipped.
pub fn read_archive(path: &Path) -> Result<Vec<RawRecord>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open archive: {}", path.display()))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(path = %path.display(), line = idx + 1, error = %e, "skipping malformed archive line");
            }
        }
    }
    Ok(records)
}

/// Archive files under `dir`, oldest first.
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read archive dir: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(ARCHIVE_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}
