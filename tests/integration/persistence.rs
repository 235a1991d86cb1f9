//! Persistence integration tests
//!
//! Cache state surviving a round trip through an on-disk SQLite database.

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use journal_sync::client::local_db::{LocalCache, LocalDatabase, LocalStore};
use journal_sync::client::offline::sync_errors::SyncError;
use journal_sync::shared::journal::DataValue;

use crate::assert_ok;
use crate::common::*;

#[tokio::test]
async fn test_cache_survives_reopen() {
    let dir = assert_ok!(TempDir::new());
    let db_path = dir.path().join("journal").join("cache.db");

    let database = assert_ok!(LocalDatabase::open(&db_path).await);
    let store = std::sync::Arc::new(LocalCache::with_database(database));
    store
        .write_experience(online_experience(EXPERIENCE_ID, "Workouts"))
        .await;
    let entry = assert_ok!(
        editor(&store)
            .create_entry(
                EXPERIENCE_ID,
                vec![(DEFINITION_ID.to_string(), DataValue::Integer(3))]
            )
            .await
    );
    store
        .sync_errors()
        .set(
            "other",
            SyncError {
                error: Some("rejected".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert_ok!(store.persist().await);
    drop(store);

    let database = assert_ok!(LocalDatabase::open(&db_path).await);
    let restored = assert_ok!(LocalCache::restore(database).await);

    let experience = restored.read_experience(EXPERIENCE_ID).await.unwrap();
    assert_eq!(experience.title, "Workouts");
    let connection = restored.read_entries(EXPERIENCE_ID).await.unwrap();
    assert_eq!(connection.find(&entry.id), Some(&entry));
    assert!(restored.ledger().read(EXPERIENCE_ID).await.unwrap().new_entries);
    assert!(restored.sync_errors().has_error("other").await);
}

#[tokio::test]
async fn test_sync_time_recorded_on_completion() {
    let dir = assert_ok!(TempDir::new());
    let database = assert_ok!(LocalDatabase::open(dir.path().join("cache.db")).await);
    let store = LocalCache::with_database(database.clone());

    assert_eq!(assert_ok!(database.get_last_sync_time().await), None);
    assert_ok!(store.record_sync_completed().await);
    assert!(assert_ok!(database.get_last_sync_time().await).is_some());
}
