//! Ingestion pipeline orchestration.
//!
//! Coordinates the full crawl flow: adapters → flatten → dedup → classify →
//! relevance gate → merge → persist, bracketed by a tracked run.
//!
//! Adapters run concurrently on their own tokio tasks. Candidates are then
//! processed strictly one at a time, with a fixed pause between
//! classifications. Nothing that happens to a single candidate can fail
//! the run: lookup and insert errors are counted as failed, model failures
//! are absorbed by the classifier. Only a panic (in an adapter task or while
//! processing a candidate), or a store that cannot record the run itself,
//! fails the run.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::FutureExt;

use gallery_core::classifier::{Classified, Classifier, ClassifyOutcome, ModelError};
use gallery_core::models::{CandidateItem, CrawlerRun, GalleryRecord, SourceType};
use gallery_core::store::{is_duplicate, GalleryStore};

use crate::archive::RawArchive;
use crate::config::{Config, Credentials};
use crate::llm::build_classifier;
use crate::pacing::Pacer;
use crate::progress::{format_number, CrawlProgressEvent, CrawlProgressReporter, NoProgress, ProgressMode};
use crate::run::RunTracker;
use crate::sqlite_store::SqliteStore;
use crate::traits::{AdapterRegistry, SourceAdapter};

/// Knobs of one pipeline execution.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Candidates scoring below this are skipped.
    pub min_relevance: f64,
    /// Pause between two classifications.
    pub classify_delay: Duration,
    /// Upper bound on one classification, retries included.
    pub classify_timeout: Duration,
    /// Classify and gate, but write nothing.
    pub dry_run: bool,
    /// Cap on candidates processed after flattening.
    pub limit: Option<usize>,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        let c = &config.classifier;
        Self {
            min_relevance: config.crawler.min_relevance_score,
            classify_delay: Duration::from_millis(config.rate_limits.classify_delay_ms),
            classify_timeout: Duration::from_secs(
                c.timeout_secs.saturating_mul(u64::from(c.max_retries) + 2),
            ),
            dry_run: false,
            limit: None,
        }
    }
}

/// Why a candidate was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    BelowThreshold,
}

/// Terminal outcome of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Stored (or would have been, in a dry run) under this record id.
    Added(String),
    Skipped(SkipReason),
    Failed(String),
}

pub struct Pipeline {
    store: Arc<dyn GalleryStore>,
    classifier: Classifier,
    options: IngestOptions,
    pacer: Pacer,
    progress: Box<dyn CrawlProgressReporter>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn GalleryStore>, classifier: Classifier, options: IngestOptions) -> Self {
        let pacer = Pacer::with_interval(options.classify_delay);
        Self {
            store,
            classifier,
            options,
            pacer,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn CrawlProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn GalleryStore> {
        &self.store
    }

    /// Run `adapters` concurrently, then push every candidate through the
    /// pipeline under one tracked run.
    pub async fn run_crawl(&self, adapters: Vec<Arc<dyn SourceAdapter>>) -> Result<CrawlerRun> {
        let crawler_type = adapters
            .iter()
            .map(|a| a.name().to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut tracker = RunTracker::start(self.store.clone(), &crawler_type).await?;

        let mut handles = Vec::with_capacity(adapters.len());
        for adapter in adapters {
            let name = adapter.name().to_string();
            self.progress.report(CrawlProgressEvent::Discovering {
                adapter: name.clone(),
            });
            handles.push((name, tokio::spawn(async move { adapter.produce().await })));
        }

        let mut candidates = Vec::new();
        let mut crashed = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(items)) => {
                    tracing::info!(run_id = %tracker.run_id(), adapter = %name, items = items.len(), "adapter finished");
                    self.progress.report(CrawlProgressEvent::Discovered {
                        adapter: name,
                        items: items.len() as u64,
                    });
                    candidates.extend(items);
                }
                Ok(Err(e)) => {
                    tracing::error!(run_id = %tracker.run_id(), adapter = %name, error = %format!("{e:#}"), "adapter failed");
                    self.progress.report(CrawlProgressEvent::Discovered {
                        adapter: name,
                        items: 0,
                    });
                }
                Err(join_error) => {
                    tracing::error!(run_id = %tracker.run_id(), adapter = %name, error = %join_error, "adapter task aborted");
                    crashed.push(format!("adapter {name} aborted: {join_error}"));
                }
            }
        }

        if !crashed.is_empty() {
            tracker.counters_mut().items_found = candidates.len() as u64;
            let message = crashed.join("; ");
            tracker.fail(&message).await?;
            return Err(anyhow!(message));
        }

        self.finish(candidates, tracker).await
    }

    /// Push already-produced candidates through the pipeline under one
    /// tracked run of type `crawler_type`.
    pub async fn run_candidates(&self, crawler_type: &str, candidates: Vec<CandidateItem>) -> Result<CrawlerRun> {
        let tracker = RunTracker::start(self.store.clone(), crawler_type).await?;
        self.finish(candidates, tracker).await
    }

    /// Process candidates, then finalize the run. A panic while processing
    /// marks the run failed with the counters reached so far.
    async fn finish(&self, candidates: Vec<CandidateItem>, mut tracker: RunTracker) -> Result<CrawlerRun> {
        if let Err(e) = self.process_all(candidates, &mut tracker).await {
            let message = format!("{e:#}");
            tracing::error!(run_id = %tracker.run_id(), error = %message, "run aborted");
            tracker.fail(&message).await?;
            return Err(e);
        }
        tracker.complete().await
    }

    /// Process candidates sequentially, updating the run counters.
    ///
    /// Stops at the first candidate whose processing panics; that candidate
    /// is counted as failed and the panic is returned as an error.
    pub async fn process_all(&self, mut candidates: Vec<CandidateItem>, tracker: &mut RunTracker) -> Result<()> {
        if let Some(limit) = self.options.limit {
            candidates.truncate(limit);
        }
        let total = candidates.len() as u64;
        tracker.counters_mut().items_found = total;
        let run_id = tracker.run_id().to_string();

        let mut seen = SeenInRun::default();
        for item in candidates {
            let outcome = if seen.check_and_insert(&item) {
                tracing::debug!(run_id = %run_id, source_type = %item.source_type, external_id = %item.external_id, "duplicate within run");
                ItemOutcome::Skipped(SkipReason::Duplicate)
            } else {
                let external_id = item.external_id.clone();
                match AssertUnwindSafe(self.process_item(item, &run_id)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        tracker.counters_mut().items_failed += 1;
                        return Err(anyhow!(
                            "processing {external_id} panicked: {}",
                            panic_message(payload.as_ref())
                        ));
                    }
                }
            };

            let counters = tracker.counters_mut();
            match outcome {
                ItemOutcome::Added(_) => counters.items_added += 1,
                ItemOutcome::Skipped(_) => counters.items_skipped += 1,
                ItemOutcome::Failed(_) => counters.items_failed += 1,
            }
            self.progress.report(CrawlProgressEvent::Processing {
                n: counters.processed(),
                total,
                added: counters.items_added,
            });
        }
        Ok(())
    }

    /// Dedup, classify, gate and persist one candidate.
    pub async fn process_item(&self, item: CandidateItem, run_id: &str) -> ItemOutcome {
        let canonical_url = item.canonical_url();

        match self.is_known(&item, &canonical_url).await {
            Ok(true) => {
                tracing::debug!(run_id, source_type = %item.source_type, external_id = %item.external_id, "already stored");
                return ItemOutcome::Skipped(SkipReason::Duplicate);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(run_id, source_type = %item.source_type, external_id = %item.external_id, error = %format!("{e:#}"), "dedup lookup failed");
                return ItemOutcome::Failed(e.to_string());
            }
        }

        self.pacer.wait().await;
        let Classified { result, outcome } = self.classify_bounded(&item).await;
        match &outcome {
            ClassifyOutcome::Model => {}
            ClassifyOutcome::Unparsable => {
                tracing::warn!(run_id, external_id = %item.external_id, "model answer unparsable, validated empty result");
            }
            ClassifyOutcome::Fallback(e) => {
                tracing::warn!(run_id, external_id = %item.external_id, error = %e, "classification failed, using fallback");
            }
        }

        if result.relevance_score < self.options.min_relevance {
            tracing::info!(
                run_id,
                source_type = %item.source_type,
                external_id = %item.external_id,
                relevance = result.relevance_score,
                content_type = %result.content_type,
                "below relevance threshold"
            );
            return ItemOutcome::Skipped(SkipReason::BelowThreshold);
        }

        let record = GalleryRecord::merge(item, result, Some(run_id));
        if self.options.dry_run {
            tracing::info!(run_id, external_id = %record.item.external_id, title = %record.item.title, "dry run: would add");
            return ItemOutcome::Added(record.id);
        }

        match self.store.insert_gallery_item(&record).await {
            Ok(id) => {
                tracing::info!(
                    run_id,
                    id = %id,
                    source_type = %record.item.source_type,
                    external_id = %record.item.external_id,
                    content_type = %record.classification.content_type,
                    relevance = record.classification.relevance_score,
                    "item added"
                );
                ItemOutcome::Added(id)
            }
            Err(e) if is_duplicate(&e) => {
                tracing::warn!(run_id, external_id = %record.item.external_id, error = %e, "uniqueness violation on insert");
                ItemOutcome::Failed(e.to_string())
            }
            Err(e) => {
                tracing::error!(run_id, external_id = %record.item.external_id, error = %format!("{e:#}"), "insert failed");
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    async fn is_known(&self, item: &CandidateItem, canonical_url: &str) -> Result<bool> {
        if self
            .store
            .item_exists(item.source_type, &item.external_id)
            .await?
        {
            return Ok(true);
        }
        self.store.item_exists_by_url(canonical_url).await
    }

    async fn classify_bounded(&self, item: &CandidateItem) -> Classified {
        let limit = self.options.classify_timeout;
        match tokio::time::timeout(limit, self.classifier.classify(item)).await {
            Ok(classified) => classified,
            Err(_) => self.classifier.fallback(item, ModelError::Timeout(limit)),
        }
    }
}

/// `gallery crawl`: run the selected adapters against the configured store.
///
/// Missing credentials for any selected adapter stop the command before a
/// run is recorded.
pub async fn run_crawl_command(
    config: &Config,
    credentials: &Credentials,
    sources: &[String],
    dry_run: bool,
    limit: Option<usize>,
    progress: ProgressMode,
) -> Result<CrawlerRun> {
    let archive = config
        .archive
        .enabled
        .then(|| Arc::new(RawArchive::new(config.archive.dir.clone())));
    let registry = AdapterRegistry::from_config(config, credentials, archive)?;
    let adapters = registry.select(sources)?;
    let names: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
    credentials.validate_for(&names)?;

    let classifier = build_classifier(&config.classifier, credentials)?;
    let store = Arc::new(SqliteStore::open(config).await?);
    let mut options = IngestOptions::from_config(config);
    options.dry_run = dry_run;
    options.limit = limit;

    let pipeline = Pipeline::new(store, classifier, options).with_progress(progress.reporter());
    let run = pipeline.run_crawl(adapters).await?;
    print_run_summary(&run, dry_run);
    Ok(run)
}

/// One-paragraph run summary on stdout.
pub fn print_run_summary(run: &CrawlerRun, dry_run: bool) {
    let c = &run.counters;
    println!(
        "{}Run {} ({}) {}: {} found, {} added, {} skipped, {} failed",
        if dry_run { "[dry run] " } else { "" },
        run.run_id,
        run.crawler_type,
        run.status,
        format_number(c.items_found),
        format_number(c.items_added),
        format_number(c.items_skipped),
        format_number(c.items_failed)
    );
}

/// Dedup keys already seen in the current run.
#[derive(Default)]
struct SeenInRun {
    keys: HashSet<(SourceType, String)>,
    urls: HashSet<String>,
}

impl SeenInRun {
    /// Record `item`; `true` when either of its keys was already seen.
    fn check_and_insert(&mut self, item: &CandidateItem) -> bool {
        let key_seen = !self.keys.insert((item.source_type, item.external_id.clone()));
        let url_seen = !self.urls.insert(item.canonical_url());
        key_seen || url_seen
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
