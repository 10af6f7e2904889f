//! Batch reclassification of approved items.
//!
//! Pages through approved records in creation order, asks the classifier
//! again using the stored title, description, source and media type, and
//! overwrites only the classification-derived fields. A degraded answer
//! (unparsable or failed model call) never replaces an existing
//! classification.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use gallery_core::classifier::Classifier;
use gallery_core::store::GalleryStore;
use gallery_core::taxonomy::ContentType;

use crate::config::{Config, Credentials};
use crate::llm::build_classifier;
use crate::pacing::Pacer;
use crate::progress::format_number;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone)]
pub struct ReclassifyOptions {
    pub dry_run: bool,
    /// Stop after this many items.
    pub limit: Option<usize>,
    /// Items fetched per store page.
    pub batch_size: usize,
    /// Pause between two classifications.
    pub delay: Duration,
}

impl Default for ReclassifyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            batch_size: 50,
            delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReclassifyReport {
    pub processed: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Content types of the new classifications, degraded answers excluded.
    pub distribution: BTreeMap<ContentType, u64>,
}

pub async fn run_reclassify(
    store: Arc<dyn GalleryStore>,
    classifier: &Classifier,
    options: &ReclassifyOptions,
) -> Result<ReclassifyReport> {
    let pacer = Pacer::with_interval(options.delay);
    let batch_size = options.batch_size.max(1);
    let mut report = ReclassifyReport::default();
    let mut offset: i64 = 0;

    'pages: loop {
        let page = store
            .items_for_reclassification(batch_size as i64, offset)
            .await?;
        if page.is_empty() {
            break;
        }
        offset += page.len() as i64;

        for record in page {
            if options.limit.is_some_and(|limit| report.processed as usize >= limit) {
                break 'pages;
            }
            report.processed += 1;

            pacer.wait().await;
            let classified = classifier.classify(&record.item).await;
            if classified.outcome.is_degraded() {
                tracing::warn!(id = %record.id, outcome = ?classified.outcome, "keeping existing classification");
                report.skipped += 1;
                continue;
            }

            let result = classified.result;
            *report.distribution.entry(result.content_type).or_default() += 1;
            tracing::debug!(
                id = %record.id,
                old = %record.classification.content_type,
                new = %result.content_type,
                relevance = result.relevance_score,
                "reclassified"
            );

            if options.dry_run {
                report.updated += 1;
                continue;
            }
            match store.update_item_classification(&record.id, &result).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    tracing::error!(id = %record.id, error = %format!("{e:#}"), "classification update failed");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(processed = report.processed, updated = report.updated, "reclassify page done");
    }

    tracing::info!(
        processed = report.processed,
        updated = report.updated,
        skipped = report.skipped,
        failed = report.failed,
        dry_run = options.dry_run,
        "reclassify finished"
    );
    Ok(report)
}

/// `gallery reclassify` against the configured store.
pub async fn run_reclassify_command(
    config: &Config,
    credentials: &Credentials,
    dry_run: bool,
    limit: Option<usize>,
    batch_size: usize,
) -> Result<ReclassifyReport> {
    let classifier = build_classifier(&config.classifier, credentials)?;
    let store = Arc::new(SqliteStore::open(config).await?);
    let options = ReclassifyOptions {
        dry_run,
        limit,
        batch_size,
        delay: Duration::from_millis(config.rate_limits.classify_delay_ms),
    };
    let report = run_reclassify(store, &classifier, &options).await?;
    print_report(&report, dry_run);
    Ok(report)
}

/// Print the summary of a reclassification pass.
pub fn print_report(report: &ReclassifyReport, dry_run: bool) {
    println!(
        "{}Reclassified {} of {} items ({} skipped, {} failed)",
        if dry_run { "[dry run] " } else { "" },
        format_number(report.updated),
        format_number(report.processed),
        format_number(report.skipped),
        format_number(report.failed)
    );
    if report.distribution.is_empty() {
        return;
    }
    let total: u64 = report.distribution.values().sum();
    println!();
    println!("  {:<24} {:>6} {:>6}", "CONTENT TYPE", "ITEMS", "SHARE");
    println!("  {}", "-".repeat(38));
    for (content_type, count) in &report.distribution {
        println!(
            "  {:<24} {:>6} {:>5}%",
            content_type.as_str(),
            format_number(*count),
            count * 100 / total
        );
    }
}
