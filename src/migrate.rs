use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS gallery_items (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL,
            source_type TEXT NOT NULL,
            source_url TEXT NOT NULL UNIQUE,
            source_name TEXT NOT NULL DEFAULT '',
            title TEXT NOT NULL,
            description TEXT,
            thumbnail_url TEXT,
            content_url TEXT NOT NULL,
            media_type TEXT NOT NULL,
            duration_seconds INTEGER,
            published_at INTEGER,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            application_category TEXT NOT NULL,
            content_type TEXT NOT NULL,
            deployment_maturity TEXT NOT NULL,
            task_types TEXT NOT NULL DEFAULT '[]',
            specific_tasks TEXT NOT NULL DEFAULT '[]',
            scene_type TEXT,
            functional_requirements TEXT NOT NULL DEFAULT '[]',
            environment TEXT NOT NULL DEFAULT '{}',
            application_context TEXT NOT NULL DEFAULT '{}',
            educational_value INTEGER NOT NULL,
            relevance_score REAL NOT NULL,
            confidence TEXT NOT NULL DEFAULT '{}',
            ai_summary TEXT,
            ai_classification TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            crawler_run_id TEXT,
            moderated_at INTEGER,
            moderated_by TEXT,
            moderation_notes TEXT,
            rejection_reason TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(source_type, external_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawler_runs (
            run_id TEXT PRIMARY KEY,
            crawler_type TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at INTEGER NOT NULL,
            completed_at INTEGER,
            items_found INTEGER NOT NULL DEFAULT 0,
            items_added INTEGER NOT NULL DEFAULT 0,
            items_skipped INTEGER NOT NULL DEFAULT 0,
            items_failed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_gallery_items_status ON gallery_items(status, created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_gallery_items_content_type ON gallery_items(content_type)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crawler_runs_started_at ON crawler_runs(started_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
