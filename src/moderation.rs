//! Moderation queue and run history commands.
//!
//! `gallery pending`, `gallery moderate` and `gallery runs` print to stdout;
//! everything they read or write goes through [`GalleryStore`].

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use gallery_core::models::{CrawlerRun, GalleryRecord, ItemStatus, StatusUpdate};
use gallery_core::store::GalleryStore;

use crate::progress::format_number;

/// Print up to `limit` pending items, newest first.
pub async fn list_pending(store: &dyn GalleryStore, limit: i64) -> Result<()> {
    let items = store.get_pending_items(limit).await?;
    if items.is_empty() {
        println!("No pending items.");
        return Ok(());
    }
    println!(
        "{:<36}  {:<14} {:<20} {:>5}  TITLE",
        "ID", "SOURCE", "CONTENT TYPE", "SCORE"
    );
    for record in &items {
        print_pending_row(record);
    }
    println!();
    println!("{} pending item(s) shown", items.len());
    Ok(())
}

fn print_pending_row(record: &GalleryRecord) {
    println!(
        "{:<36}  {:<14} {:<20} {:>5.2}  {}",
        record.id,
        record.item.source_type.as_str(),
        record.classification.content_type.as_str(),
        record.classification.relevance_score,
        gallery_core::models::truncate_chars(&record.item.title, 60)
    );
}

/// Approve or reject one item.
pub async fn moderate(store: &dyn GalleryStore, id: &str, update: &StatusUpdate) -> Result<()> {
    if update.status == ItemStatus::Pending {
        bail!("moderation status must be approved or rejected");
    }
    if update.status == ItemStatus::Approved && update.rejection_reason.is_some() {
        bail!("--reason only applies to rejections");
    }
    store.update_item_status(id, update).await?;
    tracing::info!(id, status = %update.status, moderator = ?update.moderator_id, "item moderated");
    println!("{} → {}", id, update.status);
    Ok(())
}

/// Print the `limit` most recent crawler runs.
pub async fn list_runs(store: &dyn GalleryStore, limit: i64) -> Result<()> {
    let runs = store.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No crawler runs recorded.");
        return Ok(());
    }
    println!(
        "{:<8}  {:<10} {:<20} {:>7} {:>7} {:>7} {:>7}  {:<9} CRAWLERS",
        "RUN", "STATUS", "STARTED", "FOUND", "ADDED", "SKIPPED", "FAILED", "DURATION"
    );
    for run in &runs {
        println!("{}", format_run_row(run));
        if let Some(message) = &run.error_message {
            println!("          error: {message}");
        }
    }
    Ok(())
}

fn format_run_row(run: &CrawlerRun) -> String {
    let c = &run.counters;
    format!(
        "{:<8}  {:<10} {:<20} {:>7} {:>7} {:>7} {:>7}  {:<9} {}",
        run.run_id,
        run.status.as_str(),
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        format_number(c.items_found),
        format_number(c.items_added),
        format_number(c.items_skipped),
        format_number(c.items_failed),
        format_duration(run.started_at, run.completed_at),
        run.crawler_type
    )
}

fn format_duration(started: DateTime<Utc>, completed: Option<DateTime<Utc>>) -> String {
    let Some(completed) = completed else {
        return "-".to_string();
    };
    let secs = (completed - started).num_seconds().max(0);
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}
