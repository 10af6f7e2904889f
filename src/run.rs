//! Run tracking.
//!
//! A [`RunTracker`] brackets one pipeline execution: it writes the
//! `running` row when created and finalizes it exactly once, either as
//! `completed` or `failed`. Both finishing methods consume the tracker, so
//! a run cannot be finalized twice.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use gallery_core::models::{CrawlerRun, RunCounters, RunStatus};
use gallery_core::store::GalleryStore;

/// Length of the opaque run id.
pub const RUN_ID_LEN: usize = 8;

/// Fresh 8-character run id.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..RUN_ID_LEN].to_string()
}

pub struct RunTracker {
    store: Arc<dyn GalleryStore>,
    run: CrawlerRun,
}

impl RunTracker {
    /// Persist a new `running` run for `crawler_type`.
    pub async fn start(store: Arc<dyn GalleryStore>, crawler_type: &str) -> Result<Self> {
        let run = CrawlerRun {
            run_id: new_run_id(),
            crawler_type: crawler_type.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            counters: RunCounters::default(),
            error_message: None,
        };
        store.start_run(&run).await?;
        tracing::info!(run_id = %run.run_id, crawler_type, "run started");
        Ok(Self { store, run })
    }

    pub fn run_id(&self) -> &str {
        &self.run.run_id
    }

    pub fn counters(&self) -> &RunCounters {
        &self.run.counters
    }

    pub fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.run.counters
    }

    /// Finalize as `completed`.
    pub async fn complete(self) -> Result<CrawlerRun> {
        self.finish(None).await
    }

    /// Finalize as `failed` with `message`, keeping the counters gathered so far.
    pub async fn fail(self, message: &str) -> Result<CrawlerRun> {
        self.finish(Some(message)).await
    }

    async fn finish(mut self, error: Option<&str>) -> Result<CrawlerRun> {
        self.store
            .complete_run(&self.run.run_id, &self.run.counters, error)
            .await?;
        self.run.status = if error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.run.completed_at = Some(Utc::now());
        self.run.error_message = error.map(str::to_string);

        let c = &self.run.counters;
        tracing::info!(
            run_id = %self.run.run_id,
            crawler_type = %self.run.crawler_type,
            status = %self.run.status,
            items_found = c.items_found,
            items_added = c.items_added,
            items_skipped = c.items_skipped,
            items_failed = c.items_failed,
            "run finished"
        );
        Ok(self.run)
    }
}
