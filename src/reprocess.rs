//! Re-ingest archived search responses without spending quota.
//!
//! Each archived record is parsed with the function its adapter uses live,
//! then the combined candidate list goes through the normal pipeline under
//! a run of type `reprocess`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};

use gallery_core::models::{CandidateItem, CrawlerRun};

use crate::archive::{list_archives, read_archive, RawRecord};
use crate::config::{Config, CrawlerConfig, Credentials, SearchConfig};
use crate::connector_social::{parse_social_response, Platform};
use crate::ingest::{print_run_summary, IngestOptions, Pipeline};
use crate::llm::build_classifier;
use crate::progress::ProgressMode;
use crate::sqlite_store::SqliteStore;
use crate::{connector_google, connector_serpapi};

/// Rebuild the candidates of one archived response.
pub fn candidates_from_record(
    record: &RawRecord,
    crawler: &CrawlerConfig,
    search: &SearchConfig,
) -> Result<Vec<CandidateItem>> {
    let spec = record.query_spec();
    let limit = search.results_per_search as usize;
    let items = match record.adapter.as_str() {
        "google" => connector_google::parse_news_response(&record.response, &spec),
        "google_images" => connector_google::parse_image_response(&record.response, &spec, crawler),
        "serpapi" => connector_serpapi::parse_news_response(&record.response, &spec, limit),
        "serpapi_images" => {
            connector_serpapi::parse_image_response(&record.response, &spec, crawler, limit)
        }
        "social" => {
            let Some(platform) = record.platform.as_deref().and_then(Platform::parse) else {
                bail!("social record without a known platform: {:?}", record.platform);
            };
            parse_social_response(&record.response, platform, &spec)
        }
        other => bail!("no parser for archived adapter '{other}'"),
    };
    Ok(items)
}

/// Read `files`, rebuild candidates, and run them through `pipeline`.
///
/// Unreadable files and records without a parser are logged and skipped.
pub async fn run_reprocess(
    pipeline: &Pipeline,
    files: &[PathBuf],
    crawler: &CrawlerConfig,
    search: &SearchConfig,
) -> Result<CrawlerRun> {
    let mut candidates = Vec::new();
    for path in files {
        let records = match read_archive(path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %format!("{e:#}"), "skipping archive");
                continue;
            }
        };
        let before = candidates.len();
        for record in &records {
            match candidates_from_record(record, crawler, search) {
                Ok(items) => candidates.extend(items),
                Err(e) => tracing::warn!(path = %path.display(), query = %record.query, error = %e, "skipping record"),
            }
        }
        tracing::info!(
            path = %path.display(),
            records = records.len(),
            candidates = candidates.len() - before,
            "archive parsed"
        );
    }
    pipeline.run_candidates("reprocess", candidates).await
}

/// `gallery reprocess`: re-ingest `files`, or every archive under the
/// configured directory when none are given.
pub async fn run_reprocess_command(
    config: &Config,
    credentials: &Credentials,
    files: Vec<PathBuf>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<CrawlerRun> {
    let files = if files.is_empty() {
        list_archives(&config.archive.dir)?
    } else {
        files
    };
    if files.is_empty() {
        bail!("No archives found in {}", config.archive.dir.display());
    }

    let classifier = build_classifier(&config.classifier, credentials)?;
    let store = Arc::new(SqliteStore::open(config).await?);
    let mut options = IngestOptions::from_config(config);
    options.dry_run = dry_run;

    let pipeline = Pipeline::new(store, classifier, options).with_progress(progress.reporter());
    let run = run_reprocess(&pipeline, &files, &config.crawler, &config.sources.search).await?;
    print_run_summary(&run, dry_run);
    Ok(run)
}
