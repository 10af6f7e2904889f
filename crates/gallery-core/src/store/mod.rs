//! Storage abstraction for the gallery.
//!
//! The [`GalleryStore`] trait is everything the pipeline, the run tracker,
//! the reclassifier, and the moderation commands need from persistence.
//! The SQLite implementation lives in the application crate;
//! [`memory::InMemoryStore`] backs tests.
//!
//! Implementations must enforce two uniqueness constraints: one record per
//! `(source_type, external_id)`, and one record per canonical
//! `source_url`. Inserting a record that violates either returns
//! [`StoreError::Duplicate`], which callers treat as recoverable.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::classification::ClassificationResult;
use crate::models::{CrawlerRun, GalleryRecord, GalleryStats, RunCounters, SourceType, StatusUpdate};

/// Typed store failures that callers branch on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate item: {key}")]
    Duplicate { key: String },
    #[error("not found: {0}")]
    NotFound(String),
}

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`item_exists`](GalleryStore::item_exists) | Dedup on `(source_type, external_id)` |
/// | [`item_exists_by_url`](GalleryStore::item_exists_by_url) | Dedup on canonical URL |
/// | [`insert_gallery_item`](GalleryStore::insert_gallery_item) | Persist a new pending record |
/// | [`start_run`](GalleryStore::start_run) / [`complete_run`](GalleryStore::complete_run) | Run bracketing |
/// | [`get_pending_items`](GalleryStore::get_pending_items) | Moderation queue |
/// | [`update_item_status`](GalleryStore::update_item_status) | Moderation decision |
/// | [`update_item_classification`](GalleryStore::update_item_classification) | Reclassification |
/// | [`gallery_stats`](GalleryStore::gallery_stats) | Aggregate counts |
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn item_exists(&self, source_type: SourceType, external_id: &str) -> Result<bool>;

    /// `url` must already be canonical.
    async fn item_exists_by_url(&self, url: &str) -> Result<bool>;

    /// Persist a record, returning its id.
    async fn insert_gallery_item(&self, record: &GalleryRecord) -> Result<String>;

    async fn start_run(&self, run: &CrawlerRun) -> Result<()>;

    /// Finalize a run. `error_message` marks it failed.
    async fn complete_run(
        &self,
        run_id: &str,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> Result<()>;

    async fn get_run(&self, run_id: &str) -> Result<Option<CrawlerRun>>;

    /// Most recent runs first.
    async fn list_runs(&self, limit: i64) -> Result<Vec<CrawlerRun>>;

    async fn get_item(&self, id: &str) -> Result<Option<GalleryRecord>>;

    /// Pending items, newest first.
    async fn get_pending_items(&self, limit: i64) -> Result<Vec<GalleryRecord>>;

    /// Apply a moderation decision. Unknown ids are [`StoreError::NotFound`].
    async fn update_item_status(&self, id: &str, update: &StatusUpdate) -> Result<()>;

    /// Overwrite the classification-derived fields of a stored item.
    async fn update_item_classification(
        &self,
        id: &str,
        classification: &ClassificationResult,
    ) -> Result<()>;

    /// Approved items in creation order, for batch reclassification.
    async fn items_for_reclassification(&self, limit: i64, offset: i64)
        -> Result<Vec<GalleryRecord>>;

    async fn gallery_stats(&self) -> Result<GalleryStats>;
}

/// Whether an error from a store call is a uniqueness violation.
pub fn is_duplicate(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Duplicate { .. }))
}
