//! End-to-end tests for the ingestion pipeline.
//!
//! Scripted adapters and a scripted language model drive
//! `Pipeline::run_crawl` against the in-memory store (and SQLite where
//! uniqueness is enforced by the schema), checking dedup, the relevance
//! gate, score/category consistency and run bracketing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use gallery_core::classifier::{Classifier, LanguageModel, ModelError};
use gallery_core::models::{CandidateItem, MediaType, RunStatus, SourceType};
use gallery_core::store::memory::InMemoryStore;
use gallery_core::store::GalleryStore;
use gallery_core::taxonomy::ContentType;
use gallery_crawler::ingest::{IngestOptions, Pipeline};
use gallery_crawler::sqlite_store::SqliteStore;
use gallery_crawler::traits::SourceAdapter;
use gallery_crawler::{db, migrate};
use tempfile::TempDir;

// ─── Scripted model ─────────────────────────────────────────────────

/// Answers with the first scripted reply whose needle occurs in the prompt.
struct ScriptedModel {
    replies: Vec<(&'static str, &'static str)>,
    default: &'static str,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn new(default: &'static str) -> Self {
        Self {
            replies: Vec::new(),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    fn reply(mut self, needle: &'static str, answer: &'static str) -> Self {
        self.replies.push((needle, answer));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .replies
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
            .map(|(_, answer)| *answer)
            .unwrap_or(self.default);
        Ok(answer.to_string())
    }
}

/// A model that never answers in time.
struct HangingModel;

#[async_trait]
impl LanguageModel for HangingModel {
    fn model_name(&self) -> &str {
        "hanging"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ModelError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Panics on prompts mentioning `trigger`, otherwise answers `answer`.
struct PanickingModel {
    trigger: &'static str,
    answer: &'static str,
}

#[async_trait]
impl LanguageModel for PanickingModel {
    fn model_name(&self) -> &str {
        "panicking"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        if prompt.contains(self.trigger) {
            panic!("model crashed on {}", self.trigger);
        }
        Ok(self.answer.to_string())
    }
}

// ─── Scripted adapters ──────────────────────────────────────────────

struct StaticAdapter {
    name: &'static str,
    items: Vec<CandidateItem>,
}

#[async_trait]
impl SourceAdapter for StaticAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "Fixed candidate list"
    }

    fn source_types(&self) -> &[SourceType] {
        &[]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        Ok(self.items.clone())
    }
}

struct FailingAdapter;

#[async_trait]
impl SourceAdapter for FailingAdapter {
    fn name(&self) -> &str {
        "failing"
    }

    fn description(&self) -> &str {
        "Always errors"
    }

    fn source_types(&self) -> &[SourceType] {
        &[]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        anyhow::bail!("upstream returned 503")
    }
}

struct PanickingAdapter;

#[async_trait]
impl SourceAdapter for PanickingAdapter {
    fn name(&self) -> &str {
        "panicking"
    }

    fn description(&self) -> &str {
        "Panics while producing"
    }

    fn source_types(&self) -> &[SourceType] {
        &[]
    }

    async fn produce(&self) -> Result<Vec<CandidateItem>> {
        panic!("adapter bug")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

const DEPLOYMENT: &str = r#"{"content_type": "real_application", "relevance_score": 0.9, "application_category": "industrial_automation"}"#;

fn options() -> IngestOptions {
    IngestOptions {
        min_relevance: 0.6,
        classify_delay: Duration::ZERO,
        classify_timeout: Duration::from_secs(5),
        dry_run: false,
        limit: None,
    }
}

fn candidate(source_type: SourceType, id: &str, url: &str, title: &str) -> CandidateItem {
    CandidateItem::new(source_type, id, url, title, MediaType::Article)
}

fn adapter(name: &'static str, items: Vec<CandidateItem>) -> Arc<dyn SourceAdapter> {
    Arc::new(StaticAdapter { name, items })
}

async fn sqlite_store(tmp: &TempDir) -> Arc<SqliteStore> {
    let config = gallery_crawler::config::parse_config(&format!(
        "[db]\npath = \"{}\"\n",
        tmp.path().join("gallery.sqlite").display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_run_adds_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let model = Arc::new(ScriptedModel::new(DEPLOYMENT));
    let pipeline = Pipeline::new(store.clone(), Classifier::new(model.clone()), options());

    let items = vec![
        candidate(SourceType::News, "a1", "https://news.example/a1", "Fleet of AMRs at Acme"),
        candidate(SourceType::News, "a2", "https://news.example/a2", "Palletizing at Beta"),
    ];

    let first = pipeline.run_crawl(vec![adapter("news", items.clone())]).await.unwrap();
    assert_eq!(first.status, RunStatus::Completed);
    assert_eq!(first.counters.items_added, 2);
    assert_eq!(model.calls(), 2);

    let second = pipeline.run_crawl(vec![adapter("news", items)]).await.unwrap();
    assert_eq!(second.counters.items_found, 2);
    assert_eq!(second.counters.items_added, 0);
    assert_eq!(second.counters.items_skipped, 2);
    // dedup happens before classification
    assert_eq!(model.calls(), 2);
    assert_eq!(store.gallery_stats().await.unwrap().total_pending, 2);
}

#[tokio::test]
async fn test_twitter_and_x_urls_are_one_record() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(DEPLOYMENT))),
        options(),
    );

    let first = vec![candidate(
        SourceType::Twitter,
        "t1",
        "https://twitter.com/acme/status/1",
        "Robot arm picking parcels",
    )];
    let run = pipeline.run_crawl(vec![adapter("social", first)]).await.unwrap();
    assert_eq!(run.counters.items_added, 1);

    let second = vec![candidate(
        SourceType::Twitter,
        "t2",
        "https://x.com/acme/status/1",
        "Robot arm picking parcels",
    )];
    let run = pipeline.run_crawl(vec![adapter("social", second)]).await.unwrap();
    assert_eq!(run.counters.items_skipped, 1);
    assert_eq!(store.item_count(), 1);
    assert_eq!(store.all_items()[0].item.source_url, "https://x.com/acme/status/1");
}

#[tokio::test]
async fn test_duplicates_across_adapters_in_one_run() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(DEPLOYMENT))),
        options(),
    );
    let a = vec![candidate(SourceType::GoogleNews, "g1", "https://site.example/story", "Story")];
    let b = vec![candidate(SourceType::SerpapiNews, "s1", "https://site.example/story#top", "Story")];

    let run = pipeline
        .run_crawl(vec![adapter("google", a), adapter("serpapi", b)])
        .await
        .unwrap();
    assert_eq!(run.crawler_type, "google,serpapi");
    assert_eq!(run.counters.items_found, 2);
    assert_eq!(run.counters.items_added, 1);
    assert_eq!(run.counters.items_skipped, 1);
    assert_eq!(store.item_count(), 1);
}

#[tokio::test]
async fn test_malformed_answers_validate_identically() {
    let model = Arc::new(ScriptedModel::new(
        r#"```json
{"content_type": "hologram", "educational_value": "eleven", "relevance_score": 7, "task_types": ["picking", "juggling"], "environment": "outdoors"}
```"#,
    ));
    let classifier = Classifier::new(model);
    let item = candidate(SourceType::News, "m1", "https://e.example/m1", "Mystery robot");

    let first = classifier.classify(&item).await.result;
    let second = classifier.classify(&item).await.result;
    assert_eq!(first, second);
    assert_eq!(first.content_type, ContentType::TechDemo);
    assert_eq!(first.educational_value, 2);
    // clamped to 1.0, then capped for tech demos
    assert_eq!(first.relevance_score, 0.6);
    assert!(first.task_types.len() <= 3);
}

#[tokio::test]
async fn test_stored_scores_respect_content_type() {
    let store = Arc::new(InMemoryStore::new());
    let model = ScriptedModel::new(r#"{"content_type": "tutorial", "relevance_score": 0.65}"#)
        .reply("Demo booth", r#"{"content_type": "tech_demo", "relevance_score": 0.95}"#)
        .reply("Case study", r#"{"content_type": "case_study", "relevance_score": 0.1}"#)
        .reply("Live site", r#"{"content_type": "real_application", "relevance_score": 0.8}"#);
    let mut opts = options();
    opts.min_relevance = 0.0;
    let pipeline = Pipeline::new(store.clone(), Classifier::new(Arc::new(model)), opts);

    let items = vec![
        candidate(SourceType::News, "c1", "https://e.example/c1", "Demo booth at trade show"),
        candidate(SourceType::News, "c2", "https://e.example/c2", "Case study: depalletizing"),
        candidate(SourceType::News, "c3", "https://e.example/c3", "Live site walkthrough"),
        candidate(SourceType::News, "c4", "https://e.example/c4", "How to program a cobot"),
    ];
    pipeline.run_crawl(vec![adapter("news", items)]).await.unwrap();

    assert_eq!(store.item_count(), 4);
    for record in store.all_items() {
        let c = &record.classification;
        assert!((0.0..=1.0).contains(&c.relevance_score));
        match c.content_type {
            ContentType::TechDemo => assert!(c.relevance_score <= 0.6),
            ContentType::RealApplication | ContentType::CaseStudy => {
                assert!(c.relevance_score >= 0.7)
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn test_relevance_gate_skips_default_score() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(r#"{"content_type": "tutorial"}"#))),
        options(),
    );
    let items = vec![candidate(SourceType::News, "r1", "https://e.example/r1", "Robotics tutorial")];

    let run = pipeline.run_crawl(vec![adapter("news", items)]).await.unwrap();
    assert_eq!(run.counters.items_skipped, 1);
    assert_eq!(run.counters.items_added, 0);
    assert_eq!(store.item_count(), 0);
}

#[tokio::test]
async fn test_failing_adapter_does_not_fail_the_run() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(DEPLOYMENT))),
        options(),
    );
    let items = vec![candidate(SourceType::News, "f1", "https://e.example/f1", "Cobot welding")];

    let run = pipeline
        .run_crawl(vec![Arc::new(FailingAdapter) as Arc<dyn SourceAdapter>, adapter("news", items)])
        .await
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.counters.items_added, 1);

    let stored = store.get_run(&run.run_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_panicking_adapter_marks_run_failed() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(DEPLOYMENT))),
        options(),
    );
    let items = vec![candidate(SourceType::News, "p1", "https://e.example/p1", "Cobot welding")];

    let err = pipeline
        .run_crawl(vec![adapter("news", items), Arc::new(PanickingAdapter) as Arc<dyn SourceAdapter>])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("panicking"));

    let runs = store.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert_eq!(runs[0].counters.items_found, 1);
    assert!(runs[0].error_message.as_deref().unwrap().contains("panicking"));
    assert!(runs.iter().all(|r| r.status != RunStatus::Running));
}

#[tokio::test]
async fn test_panicking_model_marks_run_failed_with_partial_counters() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(PanickingModel {
            trigger: "Exploding",
            answer: DEPLOYMENT,
        })),
        options(),
    );
    let items = vec![
        candidate(SourceType::News, "k1", "https://e.example/k1", "Cobot welding"),
        candidate(SourceType::News, "k2", "https://e.example/k2", "Exploding gearbox"),
        candidate(SourceType::News, "k3", "https://e.example/k3", "Palletizing cell"),
    ];

    let Err(err) = pipeline.run_crawl(vec![adapter("news", items)]).await else {
        panic!("expected the run to fail");
    };
    assert!(err.to_string().contains("panicked"), "{err:#}");

    let runs = store.list_runs(10).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].completed_at.is_some());
    assert_eq!(runs[0].counters.items_found, 3);
    assert_eq!(runs[0].counters.items_added, 1);
    assert_eq!(runs[0].counters.items_failed, 1);
    assert!(runs[0].error_message.as_deref().unwrap().contains("k2"));
    assert_eq!(store.item_count(), 1);
}

#[tokio::test]
async fn test_real_application_below_floor_is_raised() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(
            r#"{"content_type": "real_application", "relevance_score": 0.55}"#,
        ))),
        options(),
    );
    let items = vec![candidate(SourceType::Youtube, "v1", "https://www.youtube.com/watch?v=v1", "AMRs at a hospital")];

    let run = pipeline.run_crawl(vec![adapter("youtube", items)]).await.unwrap();
    assert_eq!(run.counters.items_added, 1);
    let record = &store.all_items()[0];
    assert_eq!(record.classification.relevance_score, 0.7);
    assert_eq!(record.crawler_run_id.as_deref(), Some(run.run_id.as_str()));
}

#[tokio::test]
async fn test_same_external_id_different_source_types() {
    let tmp = TempDir::new().unwrap();
    let store = sqlite_store(&tmp).await;
    let pipeline = Pipeline::new(
        store.clone(),
        Classifier::new(Arc::new(ScriptedModel::new(DEPLOYMENT))),
        options(),
    );
    let items = vec![
        candidate(SourceType::GoogleNews, "abc123", "https://one.example/a", "First"),
        candidate(SourceType::SerpapiNews, "abc123", "https://two.example/b", "Second"),
    ];

    let run = pipeline.run_crawl(vec![adapter("search", items)]).await.unwrap();
    assert_eq!(run.counters.items_added, 2);
    assert!(store.item_exists(SourceType::GoogleNews, "abc123").await.unwrap());
    assert!(store.item_exists(SourceType::SerpapiNews, "abc123").await.unwrap());
}

#[tokio::test]
async fn test_model_timeout_uses_fallback() {
    let store = Arc::new(InMemoryStore::new());
    let mut opts = options();
    opts.classify_timeout = Duration::from_millis(50);
    opts.min_relevance = 0.3;
    let pipeline = Pipeline::new(store.clone(), Classifier::new(Arc::new(HangingModel)), opts);
    let mut item = candidate(SourceType::News, "h1", "https://e.example/h1", "Slow model");
    item.default_category = Some("service_robotics".into());

    let run = pipeline.run_crawl(vec![adapter("news", vec![item])]).await.unwrap();
    assert_eq!(run.counters.items_added, 1);
    let record = &store.all_items()[0];
    assert_eq!(record.classification.relevance_score, 0.4);
    assert_eq!(
        record.classification.application_category.as_str(),
        "service_robotics"
    );
}
