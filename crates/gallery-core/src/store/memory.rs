//! In-memory [`GalleryStore`] implementation for tests.
//!
//! Records and runs live in `Vec`/`HashMap` behind `std::sync::RwLock`.
//! The same uniqueness rules as the SQLite store are enforced on insert.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::classification::ClassificationResult;
use crate::models::{
    CrawlerRun, GalleryRecord, GalleryStats, ItemStatus, RunCounters, RunStatus, SourceType,
    StatusUpdate,
};

use super::{GalleryStore, StoreError};

/// In-memory store for tests.
pub struct InMemoryStore {
    items: RwLock<Vec<GalleryRecord>>,
    runs: RwLock<HashMap<String, CrawlerRun>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot of every stored record, in insertion order.
    pub fn all_items(&self) -> Vec<GalleryRecord> {
        self.items.read().unwrap().clone()
    }

    pub fn item_count(&self) -> usize {
        self.items.read().unwrap().len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GalleryStore for InMemoryStore {
    async fn item_exists(&self, source_type: SourceType, external_id: &str) -> Result<bool> {
        let items = self.items.read().unwrap();
        Ok(items
            .iter()
            .any(|r| r.item.source_type == source_type && r.item.external_id == external_id))
    }

    async fn item_exists_by_url(&self, url: &str) -> Result<bool> {
        let items = self.items.read().unwrap();
        Ok(items.iter().any(|r| r.item.source_url == url))
    }

    async fn insert_gallery_item(&self, record: &GalleryRecord) -> Result<String> {
        let mut items = self.items.write().unwrap();
        let key_taken = items.iter().any(|r| {
            r.item.source_type == record.item.source_type
                && r.item.external_id == record.item.external_id
        });
        if key_taken {
            return Err(StoreError::Duplicate {
                key: format!("{}:{}", record.item.source_type, record.item.external_id),
            }
            .into());
        }
        if items.iter().any(|r| r.item.source_url == record.item.source_url) {
            return Err(StoreError::Duplicate {
                key: record.item.source_url.clone(),
            }
            .into());
        }
        items.push(record.clone());
        Ok(record.id.clone())
    }

    async fn start_run(&self, run: &CrawlerRun) -> Result<()> {
        let mut runs = self.runs.write().unwrap();
        runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn complete_run(
        &self,
        run_id: &str,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut runs = self.runs.write().unwrap();
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.counters = *counters;
        run.completed_at = Some(Utc::now());
        run.status = if error_message.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        run.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<CrawlerRun>> {
        Ok(self.runs.read().unwrap().get(run_id).cloned())
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<CrawlerRun>> {
        let mut runs: Vec<CrawlerRun> = self.runs.read().unwrap().values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }

    async fn get_item(&self, id: &str) -> Result<Option<GalleryRecord>> {
        let items = self.items.read().unwrap();
        Ok(items.iter().find(|r| r.id == id).cloned())
    }

    async fn get_pending_items(&self, limit: i64) -> Result<Vec<GalleryRecord>> {
        let items = self.items.read().unwrap();
        Ok(items
            .iter()
            .rev()
            .filter(|r| r.status == ItemStatus::Pending)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_item_status(&self, id: &str, update: &StatusUpdate) -> Result<()> {
        let mut items = self.items.write().unwrap();
        let record = items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))?;
        let now = Utc::now();
        record.status = update.status;
        record.moderation.moderated_at = Some(now);
        if update.moderator_id.is_some() {
            record.moderation.moderated_by = update.moderator_id.clone();
        }
        if update.notes.is_some() {
            record.moderation.notes = update.notes.clone();
        }
        if update.rejection_reason.is_some() {
            record.moderation.rejection_reason = update.rejection_reason.clone();
        }
        record.updated_at = now;
        Ok(())
    }

    async fn update_item_classification(
        &self,
        id: &str,
        classification: &ClassificationResult,
    ) -> Result<()> {
        let mut items = self.items.write().unwrap();
        let record = items
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("item {id}")))?;
        record.apply_classification(classification);
        Ok(())
    }

    async fn items_for_reclassification(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GalleryRecord>> {
        let items = self.items.read().unwrap();
        Ok(items
            .iter()
            .filter(|r| r.status == ItemStatus::Approved)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn gallery_stats(&self) -> Result<GalleryStats> {
        let items = self.items.read().unwrap();
        let mut stats = GalleryStats::default();
        for r in items.iter() {
            match r.status {
                ItemStatus::Approved => {
                    stats.total_approved += 1;
                    *stats
                        .by_content_type
                        .entry(r.classification.content_type)
                        .or_insert(0) += 1;
                    if GalleryStats::is_quality(&r.classification) {
                        stats.quality_content += 1;
                    }
                }
                ItemStatus::Pending => stats.total_pending += 1,
                ItemStatus::Rejected => stats.total_rejected += 1,
            }
        }
        Ok(stats)
    }
}
