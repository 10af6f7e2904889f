//! Integration tests for the SQLite `GalleryStore`.

use chrono::Utc;
use gallery_core::classification::ClassificationResult;
use gallery_core::models::{
    CandidateItem, CrawlerRun, GalleryRecord, ItemStatus, MediaType, RunCounters, RunStatus,
    SourceType, StatusUpdate,
};
use gallery_core::store::{is_duplicate, GalleryStore};
use gallery_core::taxonomy::{ContentType, SceneType};
use gallery_crawler::config::parse_config;
use gallery_crawler::sqlite_store::SqliteStore;
use tempfile::TempDir;

async fn open_store(tmp: &TempDir) -> SqliteStore {
    let config = parse_config(&format!(
        "[db]\npath = \"{}\"\n",
        tmp.path().join("data/gallery.sqlite").display()
    ))
    .unwrap();
    SqliteStore::open(&config).await.unwrap()
}

fn record(source_type: SourceType, id: &str, url: &str) -> GalleryRecord {
    let mut item = CandidateItem::new(source_type, id, url, "Mobile manipulator in a pharmacy", MediaType::Video);
    item.source_name = "Acme Robotics".into();
    item.description = Some("Restocking shelves overnight".into());
    item.duration_seconds = Some(184);
    item.metadata.view_count = Some(12_000);
    let mut classification = ClassificationResult::empty();
    classification.content_type = ContentType::RealApplication;
    classification.relevance_score = 0.85;
    classification.educational_value = 4;
    classification.scene_type = Some(SceneType::ALL[0]);
    GalleryRecord::merge(item, classification, Some("run00001"))
}

#[tokio::test]
async fn test_insert_and_read_back() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let original = record(SourceType::Youtube, "vid1", "https://m.youtube.com/watch?v=vid1");
    let id = store.insert_gallery_item(&original).await.unwrap();
    assert_eq!(id, original.id);

    let stored = store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(stored.item.source_url, "https://www.youtube.com/watch?v=vid1");
    assert_eq!(stored.item.duration_seconds, Some(184));
    assert_eq!(stored.item.metadata.view_count, Some(12_000));
    assert_eq!(stored.classification.content_type, ContentType::RealApplication);
    assert_eq!(stored.classification.relevance_score, 0.85);
    assert_eq!(stored.classification.educational_value, 4);
    assert_eq!(stored.classification.scene_type, Some(SceneType::ALL[0]));
    assert_eq!(stored.classification.task_types, original.classification.task_types);
    assert_eq!(stored.status, ItemStatus::Pending);
    assert_eq!(stored.crawler_run_id.as_deref(), Some("run00001"));

    assert!(store.item_exists(SourceType::Youtube, "vid1").await.unwrap());
    assert!(!store.item_exists(SourceType::News, "vid1").await.unwrap());
    assert!(store
        .item_exists_by_url("https://www.youtube.com/watch?v=vid1")
        .await
        .unwrap());
    assert!(store.get_item("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_uniqueness_violations_are_duplicates() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    store
        .insert_gallery_item(&record(SourceType::News, "n1", "https://e.example/a"))
        .await
        .unwrap();

    let same_key = record(SourceType::News, "n1", "https://e.example/b");
    let err = store.insert_gallery_item(&same_key).await.unwrap_err();
    assert!(is_duplicate(&err));

    let same_url = record(SourceType::GoogleNews, "g1", "https://e.example/a");
    let err = store.insert_gallery_item(&same_url).await.unwrap_err();
    assert!(is_duplicate(&err));

    let other_type = record(SourceType::SerpapiNews, "n1", "https://e.example/c");
    store.insert_gallery_item(&other_type).await.unwrap();
}

#[tokio::test]
async fn test_run_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let run = CrawlerRun {
        run_id: "abcd1234".into(),
        crawler_type: "youtube,news".into(),
        status: RunStatus::Running,
        started_at: Utc::now(),
        completed_at: None,
        counters: RunCounters::default(),
        error_message: None,
    };
    store.start_run(&run).await.unwrap();
    assert_eq!(
        store.get_run("abcd1234").await.unwrap().unwrap().status,
        RunStatus::Running
    );

    let counters = RunCounters {
        items_found: 10,
        items_added: 4,
        items_skipped: 5,
        items_failed: 1,
    };
    store
        .complete_run("abcd1234", &counters, Some("adapter youtube aborted"))
        .await
        .unwrap();
    let done = store.get_run("abcd1234").await.unwrap().unwrap();
    assert_eq!(done.status, RunStatus::Failed);
    assert_eq!(done.counters, counters);
    assert!(done.completed_at.is_some());
    assert_eq!(done.error_message.as_deref(), Some("adapter youtube aborted"));

    assert!(store.complete_run("nope", &counters, None).await.is_err());
    assert_eq!(store.list_runs(5).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_moderation_and_stats() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let a = store
        .insert_gallery_item(&record(SourceType::News, "a", "https://e.example/a"))
        .await
        .unwrap();
    let b = store
        .insert_gallery_item(&record(SourceType::News, "b", "https://e.example/b"))
        .await
        .unwrap();
    store
        .insert_gallery_item(&record(SourceType::News, "c", "https://e.example/c"))
        .await
        .unwrap();

    let mut approve = StatusUpdate::new(ItemStatus::Approved);
    approve.moderator_id = Some("reviewer-1".into());
    store.update_item_status(&a, &approve).await.unwrap();

    let mut reject = StatusUpdate::new(ItemStatus::Rejected);
    reject.rejection_reason = Some("duplicate footage".into());
    store.update_item_status(&b, &reject).await.unwrap();

    assert!(store
        .update_item_status("missing", &approve)
        .await
        .is_err());

    let approved = store.get_item(&a).await.unwrap().unwrap();
    assert_eq!(approved.moderation.moderated_by.as_deref(), Some("reviewer-1"));
    assert!(approved.moderation.moderated_at.is_some());

    let pending = store.get_pending_items(10).await.unwrap();
    assert_eq!(pending.len(), 1);

    let stats = store.gallery_stats().await.unwrap();
    assert_eq!(stats.total_approved, 1);
    assert_eq!(stats.total_pending, 1);
    assert_eq!(stats.total_rejected, 1);
    assert_eq!(stats.by_content_type.get(&ContentType::RealApplication), Some(&1));
    assert_eq!(stats.quality_content, 1);
}

#[tokio::test]
async fn test_reclassification_keeps_scene_and_item_fields() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let original = record(SourceType::Youtube, "v9", "https://www.youtube.com/watch?v=v9");
    let id = store.insert_gallery_item(&original).await.unwrap();
    store
        .update_item_status(&id, &StatusUpdate::new(ItemStatus::Approved))
        .await
        .unwrap();

    let page = store.items_for_reclassification(10, 0).await.unwrap();
    assert_eq!(page.len(), 1);
    assert!(store.items_for_reclassification(10, 1).await.unwrap().is_empty());

    let mut update = ClassificationResult::empty();
    update.content_type = ContentType::Tutorial;
    update.scene_type = None;
    store.update_item_classification(&id, &update).await.unwrap();

    let stored = store.get_item(&id).await.unwrap().unwrap();
    assert_eq!(stored.classification.content_type, ContentType::Tutorial);
    assert_eq!(stored.classification.scene_type, original.classification.scene_type);
    assert_eq!(stored.item.title, original.item.title);
    assert_eq!(stored.status, ItemStatus::Approved);
    assert_eq!(stored.ai_classification["content_type"], "tutorial");
}
