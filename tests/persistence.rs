//! Persistence and Notification Integration Tests
//!
//! Persisted keys survive a restart; release notifications are replaced
//! on every session start.

mod common;

use chrono::{Duration, Utc};
use common::{eventually, remote_chapter, usd, version, Harness, VERSION_A};
use folio::adapters::{JsonFileStore, KeyValueStore};
use folio::{FetchMode, LockState, NotificationTemplate};
use tempfile::TempDir;

#[tokio::test]
async fn test_state_round_trips_across_restart() {
    let harness = Harness::new();
    harness.oracle.set_price("chapter_2", Some(usd("2.49")));

    let chapter = harness.unlocked(remote_chapter("chapter_2"));
    chapter.fetch(FetchMode::Explicit).unwrap().await.unwrap();
    eventually(|| chapter.price() == "$2.49").await;

    let restarted = harness.chapter(remote_chapter("chapter_2"));
    assert_eq!(restarted.lock_state(), LockState::Unlocked);
    assert!(restarted.was_loaded());
    assert_eq!(restarted.version(), version(VERSION_A));
    assert_eq!(restarted.price(), "$2.49");
    assert!(!restarted.has_payload());
}

#[tokio::test]
async fn test_start_resumes_only_previously_loaded_chapters() {
    let harness = Harness::new();
    let fresh = harness.unlocked(remote_chapter("chapter_2"));
    for task in fresh.start().await {
        task.await.unwrap();
    }
    assert_eq!(harness.manifests.calls(), 0);

    fresh.fetch(FetchMode::Explicit).unwrap().await.unwrap();

    let restarted = harness.chapter(remote_chapter("chapter_2"));
    for task in restarted.start().await {
        task.await.unwrap();
    }
    assert!(restarted.has_payload());
    assert_eq!(harness.cache.transfers(), 1);
}

#[tokio::test]
async fn test_notification_is_replaced_on_next_start() {
    let harness = Harness::new();
    let release_at = Utc::now() + Duration::days(1);
    let mut config = remote_chapter("chapter_3");
    config.release_at = Some(release_at);
    config.notification = Some(NotificationTemplate {
        title: "NotificationTitle".to_string(),
        body: "NotificationBody".to_string(),
        small_icon: "ic_stat_push_icon".to_string(),
    });

    let chapter = harness.chapter(config.clone());
    for task in chapter.start().await {
        task.await.unwrap();
    }

    let scheduled = harness.notifier.scheduled();
    assert_eq!(scheduled.len(), 1);
    let (first_id, deliver_at, content) = scheduled[0].clone();
    assert_eq!(deliver_at, release_at);
    assert_eq!(content.title, "NotificationTitle");
    assert_eq!(chapter.notification_id(), Some(first_id.clone()));
    assert_eq!(
        harness.flushed().get("chapter_3_NotificationId"),
        Some(&first_id)
    );

    let restarted = harness.chapter(config);
    for task in restarted.start().await {
        task.await.unwrap();
    }

    assert_eq!(harness.notifier.cancelled(), vec![first_id.clone()]);
    assert_eq!(harness.notifier.scheduled().len(), 2);
    let current = restarted.notification_id().unwrap();
    assert_ne!(current, first_id);
}

#[tokio::test]
async fn test_unlocked_chapter_gets_no_notification() {
    let harness = Harness::new();
    let mut config = remote_chapter("chapter_3");
    config.release_at = Some(Utc::now() + Duration::days(1));
    config.notification = Some(NotificationTemplate {
        title: "NotificationTitle".to_string(),
        body: "NotificationBody".to_string(),
        small_icon: "ic_stat_push_icon".to_string(),
    });

    let chapter = harness.unlocked(config);
    chapter.reschedule_notification().await;

    assert!(harness.notifier.scheduled().is_empty());
    assert_eq!(chapter.notification_id(), None);
}

#[tokio::test]
async fn test_json_store_backs_a_chapter() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("prefs.json");

    let harness = Harness::new();
    let mut services = harness.services();
    services.store = std::sync::Arc::new(JsonFileStore::open(&path).unwrap());

    let chapter = folio::Chapter::new(
        remote_chapter("chapter_2"),
        "en",
        services,
        harness.network,
        harness.events.clone(),
    );
    chapter.unlock();

    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("chapter_2_IsLocked"), Some("0".to_string()));
    assert_eq!(reopened.get("chapter_2_Version"), Some("0".to_string()));
}
