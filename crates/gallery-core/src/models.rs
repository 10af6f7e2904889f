//! Core data models for the gallery pipeline.
//!
//! A [`CandidateItem`] is what a source adapter produces. After the
//! classifier has judged it, the pipeline merges it with its
//! [`ClassificationResult`] into a [`GalleryRecord`], which is what the
//! store persists. Every pipeline execution is bracketed by a
//! [`CrawlerRun`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::canonicalize_url;
use crate::classification::ClassificationResult;
use crate::taxonomy::ContentType;

/// Maximum persisted title length, in characters.
pub const TITLE_MAX_CHARS: usize = 500;
/// Maximum persisted description length, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 2000;

vocabulary! {
    /// Where an item came from. Scopes `external_id` uniqueness.
    pub enum SourceType {
        Youtube => "youtube",
        News => "news",
        GoogleNews => "google_news",
        GoogleImage => "google_image",
        SerpapiNews => "serpapi_news",
        SerpapiImage => "serpapi_image",
        Linkedin => "linkedin",
        Tiktok => "tiktok",
        Twitter => "twitter",
        Facebook => "facebook",
        Instagram => "instagram",
        Other => "other",
    }
}

vocabulary! {
    pub enum MediaType {
        Video => "video",
        Image => "image",
        Article => "article",
    }
}

vocabulary! {
    /// Moderation state of a stored item.
    pub enum ItemStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

vocabulary! {
    pub enum RunStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

impl SourceType {
    /// Social platforms discovered through site-restricted search.
    pub fn is_social(&self) -> bool {
        matches!(
            self,
            SourceType::Linkedin
                | SourceType::Tiktok
                | SourceType::Twitter
                | SourceType::Facebook
                | SourceType::Instagram
        )
    }
}

/// Optional source-specific details that travel with an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// One unit of crawled content, before classification.
///
/// `default_category` and `default_tasks` are raw hint terms supplied by
/// the adapter configuration. They are consulted only when the classifier
/// leaves the corresponding field empty, and are validated against the
/// taxonomy like any model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub external_id: String,
    pub source_type: SourceType,
    pub source_url: String,
    pub source_name: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub content_url: String,
    pub media_type: MediaType,
    pub duration_seconds: Option<i64>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub default_category: Option<String>,
    #[serde(default)]
    pub default_tasks: Vec<String>,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl CandidateItem {
    /// Build a candidate with the required fields; everything else empty.
    ///
    /// `content_url` starts out equal to `source_url`.
    pub fn new(
        source_type: SourceType,
        external_id: impl Into<String>,
        source_url: impl Into<String>,
        title: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        let source_url = source_url.into();
        Self {
            external_id: external_id.into(),
            source_type,
            content_url: source_url.clone(),
            source_url,
            source_name: String::new(),
            title: title.into(),
            description: None,
            thumbnail_url: None,
            media_type,
            duration_seconds: None,
            published_at: None,
            default_category: None,
            default_tasks: Vec::new(),
            metadata: ItemMetadata::default(),
        }
    }

    /// The dedup form of `source_url`.
    pub fn canonical_url(&self) -> String {
        canonicalize_url(&self.source_url)
    }
}

/// Reviewer decision recorded by `update_item_status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Moderation {
    pub moderated_at: Option<DateTime<Utc>>,
    pub moderated_by: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

/// A persisted gallery item: candidate fields, classification fields,
/// moderation state, and the raw classification kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: String,
    pub item: CandidateItem,
    pub classification: ClassificationResult,
    pub ai_classification: serde_json::Value,
    pub status: ItemStatus,
    pub crawler_run_id: Option<String>,
    pub moderation: Moderation,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GalleryRecord {
    /// Merge a candidate with its classification into a new pending record.
    ///
    /// The title and description are cut to their persisted limits and the
    /// source URL is canonicalized, so that what is stored matches what the
    /// dedup index looks up.
    pub fn merge(
        mut item: CandidateItem,
        classification: ClassificationResult,
        crawler_run_id: Option<&str>,
    ) -> Self {
        item.source_url = canonicalize_url(&item.source_url);
        item.title = truncate_chars(&item.title, TITLE_MAX_CHARS);
        item.description = item
            .description
            .as_deref()
            .map(|d| truncate_chars(d, DESCRIPTION_MAX_CHARS));

        let ai_classification =
            serde_json::to_value(&classification).unwrap_or(serde_json::Value::Null);
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            item,
            classification,
            ai_classification,
            status: ItemStatus::Pending,
            crawler_run_id: crawler_run_id.map(str::to_string),
            moderation: Moderation::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite classification-derived fields after reclassification.
    ///
    /// A previously known scene type survives a new answer without one.
    pub fn apply_classification(&mut self, classification: &ClassificationResult) {
        let previous_scene = self.classification.scene_type;
        self.classification = classification.clone();
        self.classification.scene_type = classification.scene_type.or(previous_scene);
        self.ai_classification = classification.to_json();
        self.updated_at = Utc::now();
    }
}

/// Per-run item counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub items_found: u64,
    pub items_added: u64,
    pub items_skipped: u64,
    pub items_failed: u64,
}

impl RunCounters {
    /// Candidates that reached a terminal outcome.
    pub fn processed(&self) -> u64 {
        self.items_added + self.items_skipped + self.items_failed
    }
}

/// One execution of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerRun {
    pub run_id: String,
    pub crawler_type: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub counters: RunCounters,
    pub error_message: Option<String>,
}

/// A moderation decision to apply to one item.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ItemStatus,
    pub moderator_id: Option<String>,
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: ItemStatus) -> Self {
        Self {
            status,
            moderator_id: None,
            notes: None,
            rejection_reason: None,
        }
    }
}

/// Aggregate counts over the gallery.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GalleryStats {
    pub total_approved: u64,
    pub total_pending: u64,
    pub total_rejected: u64,
    /// Approved items per content type.
    pub by_content_type: BTreeMap<ContentType, u64>,
    /// Approved items that show real deployments with some teaching value.
    pub quality_content: u64,
}

impl GalleryStats {
    /// Whether an approved item counts toward `quality_content`.
    pub fn is_quality(classification: &ClassificationResult) -> bool {
        matches!(
            classification.content_type,
            ContentType::RealApplication | ContentType::CaseStudy | ContentType::PilotPoc
        ) && classification.educational_value >= 3
    }

    pub fn total(&self) -> u64 {
        self.total_approved + self.total_pending + self.total_rejected
    }
}

/// Cut a string to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
