//! SQLite-backed [`GalleryStore`] implementation.
//!
//! Classification lists and nested mappings are stored as JSON text
//! columns; timestamps are Unix seconds. The schema's `UNIQUE` constraints
//! enforce deduplication, and a violation surfaces as
//! [`StoreError::Duplicate`].

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use gallery_core::classification::ClassificationResult;
use gallery_core::models::{
    CandidateItem, CrawlerRun, GalleryRecord, GalleryStats, ItemMetadata, ItemStatus, MediaType,
    Moderation, RunCounters, RunStatus, SourceType, StatusUpdate,
};
use gallery_core::store::{GalleryStore, StoreError};
use gallery_core::taxonomy::{ApplicationCategory, ContentType, DeploymentMaturity, SceneType};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`GalleryStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and bring its schema up to date.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const ITEM_COLUMNS: &str = "id, external_id, source_type, source_url, source_name, title, \
    description, thumbnail_url, content_url, media_type, duration_seconds, published_at, \
    metadata_json, application_category, content_type, deployment_maturity, task_types, \
    specific_tasks, scene_type, functional_requirements, environment, application_context, \
    educational_value, relevance_score, confidence, ai_summary, ai_classification, status, \
    crawler_run_id, moderated_at, moderated_by, moderation_notes, rejection_reason, \
    created_at, updated_at";

fn ts_to_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
}

fn json_column<T: DeserializeOwned + Default>(row: &SqliteRow, column: &str) -> T {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).unwrap_or_default()
}

fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn map_insert_error(err: sqlx::Error, record: &GalleryRecord) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                key: format!(
                    "{}:{} ({})",
                    record.item.source_type, record.item.external_id, record.item.source_url
                ),
            }
            .into();
        }
    }
    err.into()
}

fn row_to_record(row: &SqliteRow) -> Result<GalleryRecord> {
    let source_type: String = row.get("source_type");
    let media_type: String = row.get("media_type");
    let status: String = row.get("status");
    let category: String = row.get("application_category");
    let content_type: String = row.get("content_type");
    let maturity: String = row.get("deployment_maturity");
    let scene: Option<String> = row.get("scene_type");
    let metadata: ItemMetadata = json_column(row, "metadata_json");

    let item = CandidateItem {
        external_id: row.get("external_id"),
        source_type: SourceType::parse(&source_type).unwrap_or(SourceType::Other),
        source_url: row.get("source_url"),
        source_name: row.get("source_name"),
        title: row.get("title"),
        description: row.get("description"),
        thumbnail_url: row.get("thumbnail_url"),
        content_url: row.get("content_url"),
        media_type: MediaType::parse(&media_type).unwrap_or(MediaType::Article),
        duration_seconds: row.get("duration_seconds"),
        published_at: ts_to_datetime(row.get("published_at")),
        default_category: None,
        default_tasks: Vec::new(),
        metadata,
    };

    let educational_value: i64 = row.get("educational_value");
    let classification = ClassificationResult {
        content_type: ContentType::parse(&content_type).unwrap_or(ContentType::TechDemo),
        deployment_maturity: DeploymentMaturity::parse(&maturity)
            .unwrap_or(DeploymentMaturity::Unknown),
        application_category: ApplicationCategory::parse(&category)
            .unwrap_or(ApplicationCategory::IndustrialAutomation),
        specific_tasks: json_column(row, "specific_tasks"),
        task_types: json_column(row, "task_types"),
        scene_type: scene.as_deref().and_then(SceneType::parse),
        application_context: json_column(row, "application_context"),
        educational_value: educational_value.clamp(1, 5) as u8,
        functional_requirements: json_column(row, "functional_requirements"),
        environment: json_column(row, "environment"),
        summary: row.get("ai_summary"),
        relevance_score: row.get("relevance_score"),
        confidence: json_column(row, "confidence"),
    };

    let ai_classification: String = row.get("ai_classification");
    let created_at: i64 = row.get("created_at");
    let updated_at: i64 = row.get("updated_at");

    Ok(GalleryRecord {
        id: row.get("id"),
        item,
        classification,
        ai_classification: serde_json::from_str(&ai_classification)?,
        status: ItemStatus::parse(&status).unwrap_or(ItemStatus::Pending),
        crawler_run_id: row.get("crawler_run_id"),
        moderation: Moderation {
            moderated_at: ts_to_datetime(row.get("moderated_at")),
            moderated_by: row.get("moderated_by"),
            notes: row.get("moderation_notes"),
            rejection_reason: row.get("rejection_reason"),
        },
        created_at: ts_to_datetime(Some(created_at)).unwrap_or_else(Utc::now),
        updated_at: ts_to_datetime(Some(updated_at)).unwrap_or_else(Utc::now),
    })
}

fn row_to_run(row: &SqliteRow) -> CrawlerRun {
    let status: String = row.get("status");
    let started_at: i64 = row.get("started_at");
    let count = |column: &str| -> u64 { row.get::<i64, _>(column).max(0) as u64 };
    CrawlerRun {
        run_id: row.get("run_id"),
        crawler_type: row.get("crawler_type"),
        status: RunStatus::parse(&status).unwrap_or(RunStatus::Failed),
        started_at: ts_to_datetime(Some(started_at)).unwrap_or_else(Utc::now),
        completed_at: ts_to_datetime(row.get("completed_at")),
        counters: RunCounters {
            items_found: count("items_found"),
            items_added: count("items_added"),
            items_skipped: count("items_skipped"),
            items_failed: count("items_failed"),
        },
        error_message: row.get("error_message"),
    }
}

#[async_trait]
impl GalleryStore for SqliteStore {
    async fn item_exists(&self, source_type: SourceType, external_id: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar(
            "SELECT id FROM gallery_items WHERE source_type = ? AND external_id = ? LIMIT 1",
        )
        .bind(source_type.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn item_exists_by_url(&self, url: &str) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT id FROM gallery_items WHERE source_url = ? LIMIT 1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert_gallery_item(&self, record: &GalleryRecord) -> Result<String> {
        let item = &record.item;
        let c = &record.classification;
        sqlx::query(
            r#"
            INSERT INTO gallery_items (
                id, external_id, source_type, source_url, source_name, title, description,
                thumbnail_url, content_url, media_type, duration_seconds, published_at,
                metadata_json, application_category, content_type, deployment_maturity,
                task_types, specific_tasks, scene_type, functional_requirements, environment,
                application_context, educational_value, relevance_score, confidence,
                ai_summary, ai_classification, status, crawler_run_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&item.external_id)
        .bind(item.source_type.as_str())
        .bind(&item.source_url)
        .bind(&item.source_name)
        .bind(&item.title)
        .bind(&item.description)
        .bind(&item.thumbnail_url)
        .bind(&item.content_url)
        .bind(item.media_type.as_str())
        .bind(item.duration_seconds)
        .bind(item.published_at.map(|t| t.timestamp()))
        .bind(to_json_text(&item.metadata)?)
        .bind(c.application_category.as_str())
        .bind(c.content_type.as_str())
        .bind(c.deployment_maturity.as_str())
        .bind(to_json_text(&c.task_types)?)
        .bind(to_json_text(&c.specific_tasks)?)
        .bind(c.scene_type.map(|s| s.as_str()))
        .bind(to_json_text(&c.functional_requirements)?)
        .bind(to_json_text(&c.environment)?)
        .bind(to_json_text(&c.application_context)?)
        .bind(c.educational_value as i64)
        .bind(c.relevance_score)
        .bind(to_json_text(&c.confidence)?)
        .bind(&c.summary)
        .bind(record.ai_classification.to_string())
        .bind(record.status.as_str())
        .bind(&record.crawler_run_id)
        .bind(record.created_at.timestamp())
        .bind(record.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, record))?;

        Ok(record.id.clone())
    }

    async fn start_run(&self, run: &CrawlerRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO crawler_runs (run_id, crawler_type, status, started_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.crawler_type)
        .bind(run.status.as_str())
        .bind(run.started_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_run(
        &self,
        run_id: &str,
        counters: &RunCounters,
        error_message: Option<&str>,
    ) -> Result<()> {
        let status = if error_message.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let result = sqlx::query(
            r#"
            UPDATE crawler_runs
            SET status = ?, completed_at = ?, items_found = ?, items_added = ?,
                items_skipped = ?, items_failed = ?, error_message = ?
            WHERE run_id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .bind(counters.items_found as i64)
        .bind(counters.items_added as i64)
        .bind(counters.items_skipped as i64)
        .bind(counters.items_failed as i64)
        .bind(error_message)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("run {run_id}")).into());
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<CrawlerRun>> {
        let row = sqlx::query("SELECT * FROM crawler_runs WHERE run_id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_run))
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<CrawlerRun>> {
        let rows = sqlx::query(
            "SELECT * FROM crawler_runs ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_run).collect())
    }

    async fn get_item(&self, id: &str) -> Result<Option<GalleryRecord>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM gallery_items WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_pending_items(&self, limit: i64) -> Result<Vec<GalleryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM gallery_items WHERE status = 'pending' \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn update_item_status(&self, id: &str, update: &StatusUpdate) -> Result<()> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            UPDATE gallery_items
            SET status = ?,
                moderated_at = ?,
                moderated_by = COALESCE(?, moderated_by),
                moderation_notes = COALESCE(?, moderation_notes),
                rejection_reason = COALESCE(?, rejection_reason),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.status.as_str())
        .bind(now)
        .bind(&update.moderator_id)
        .bind(&update.notes)
        .bind(&update.rejection_reason)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {id}")).into());
        }
        Ok(())
    }

    async fn update_item_classification(
        &self,
        id: &str,
        classification: &ClassificationResult,
    ) -> Result<()> {
        let c = classification;
        let result = sqlx::query(
            r#"
            UPDATE gallery_items
            SET content_type = ?,
                deployment_maturity = ?,
                educational_value = ?,
                specific_tasks = ?,
                task_types = ?,
                application_context = ?,
                functional_requirements = ?,
                scene_type = COALESCE(?, scene_type),
                application_category = ?,
                environment = ?,
                confidence = ?,
                ai_summary = ?,
                ai_classification = ?,
                relevance_score = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(c.content_type.as_str())
        .bind(c.deployment_maturity.as_str())
        .bind(c.educational_value as i64)
        .bind(to_json_text(&c.specific_tasks)?)
        .bind(to_json_text(&c.task_types)?)
        .bind(to_json_text(&c.application_context)?)
        .bind(to_json_text(&c.functional_requirements)?)
        .bind(c.scene_type.map(|s| s.as_str()))
        .bind(c.application_category.as_str())
        .bind(to_json_text(&c.environment)?)
        .bind(to_json_text(&c.confidence)?)
        .bind(&c.summary)
        .bind(c.to_json().to_string())
        .bind(c.relevance_score)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("item {id}")).into());
        }
        Ok(())
    }

    async fn items_for_reclassification(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<GalleryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM gallery_items WHERE status = 'approved' \
             ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn gallery_stats(&self) -> Result<GalleryStats> {
        let mut stats = GalleryStats::default();

        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM gallery_items GROUP BY status")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let status: String = row.get("status");
            let n = row.get::<i64, _>("n").max(0) as u64;
            match ItemStatus::parse(&status) {
                Some(ItemStatus::Approved) => stats.total_approved = n,
                Some(ItemStatus::Pending) => stats.total_pending = n,
                Some(ItemStatus::Rejected) => stats.total_rejected = n,
                None => tracing::warn!(status = %status, "unknown item status in store"),
            }
        }

        let rows = sqlx::query(
            "SELECT content_type, COUNT(*) AS n FROM gallery_items \
             WHERE status = 'approved' GROUP BY content_type",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let content_type: String = row.get("content_type");
            if let Some(ct) = ContentType::parse(&content_type) {
                stats
                    .by_content_type
                    .insert(ct, row.get::<i64, _>("n").max(0) as u64);
            }
        }

        let quality: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM gallery_items
            WHERE status = 'approved'
              AND content_type IN ('real_application', 'case_study', 'pilot_poc')
              AND educational_value >= 3
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        stats.quality_content = quality.max(0) as u64;

        Ok(stats)
    }
}
