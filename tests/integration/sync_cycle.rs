//! Sync cycle integration tests
//!
//! Full cycles for online experiences: edit through the offline editor, run
//! the orchestrator against a scripted remote, inspect the store.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use journal_sync::client::local_db::{LocalCache, LocalStore};
use journal_sync::client::offline::sync_errors::UpdateEntrySyncError;
use journal_sync::client::remote::outcomes::{
    CreateEntryOutcome, DataObjectError, DataObjectOutcome, DeleteEntryOutcome,
    OwnFieldsData, OwnFieldsOutcome, UpdateEntryOutcome, UpdateEntrySuccess,
    UpdateExperienceError, UpdateExperienceOutcome, UpdateExperienceResult,
};
use journal_sync::client::sync::{CycleOutcome, SyncFlag, SyncOrchestrator, SyncService};
use journal_sync::shared::journal::{DataObject, DataValue};
use journal_sync::shared::{OnlineStatus, SyncConfig};

use crate::common::*;
use crate::{assert_clean, assert_ok};

fn orchestrator(store: &Arc<LocalCache>, remote: &Arc<ScriptedRemote>) -> SyncOrchestrator {
    SyncOrchestrator::new(
        store.clone(),
        remote.clone(),
        Arc::new(SyncFlag::new()),
        Duration::from_millis(20),
    )
}

fn renamed(title: &str) -> UpdateExperienceResult {
    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.own_fields = Some(OwnFieldsOutcome::ExperienceOwnFieldsSuccess {
        data: OwnFieldsData {
            title: title.to_string(),
            description: None,
        },
    });
    result
}

async fn rename(store: &Arc<LocalCache>, title: &str) {
    assert_ok!(
        editor(store)
            .update_own_fields(EXPERIENCE_ID, Some(title.to_string()), None)
            .await
    );
}

#[tokio::test]
async fn test_empty_ledger_makes_no_call_and_no_event() {
    let store = seeded_store(vec![]).await;
    let remote = Arc::new(ScriptedRemote::new());
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    assert_eq!(orchestrator.sync_to_server().await, CycleOutcome::NothingToSync);

    assert_eq!(remote.calls(), 0);
    assert!(events.try_recv().is_err());
    assert!(!orchestrator.flag().is_syncing());
}

#[tokio::test]
async fn test_concurrent_cycles_make_one_call() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(
        ScriptedRemote::new()
            .with_delay(Duration::from_millis(50))
            .answer_update(renamed("Renamed")),
    );
    let orchestrator = orchestrator(&store, &remote);

    let (first, second) = tokio::join!(orchestrator.sync_to_server(), orchestrator.sync_to_server());

    let outcomes = [first, second];
    assert!(outcomes.contains(&CycleOutcome::Busy));
    assert!(outcomes.contains(&CycleOutcome::Completed {
        created: 0,
        updated: 1
    }));
    assert_eq!(remote.calls(), 1);
    assert!(!orchestrator.flag().is_syncing());
}

#[tokio::test]
async fn test_concurrent_cycles_release_after_failure() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(
        ScriptedRemote::new()
            .with_delay(Duration::from_millis(50))
            .unreachable(),
    );
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    let (first, second) = tokio::join!(orchestrator.sync_to_server(), orchestrator.sync_to_server());

    let outcomes = [first, second];
    assert!(outcomes.contains(&CycleOutcome::Busy));
    assert!(outcomes.contains(&CycleOutcome::TransportFailed));
    assert_eq!(remote.calls(), 1);
    assert!(!orchestrator.flag().is_syncing());
    assert!(events.try_recv().is_err());
    assert!(store.ledger().read(EXPERIENCE_ID).await.is_some());
}

#[tokio::test]
async fn test_own_fields_round_trip() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().answer_update(renamed("Renamed")));
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    assert_matches!(orchestrator.sync_to_server().await, CycleOutcome::Completed { .. });

    let sent = remote.sent_updates();
    let own_fields = sent[0].own_fields.as_ref().unwrap();
    assert_eq!(own_fields.title.as_deref(), Some("Renamed"));
    assert!(own_fields.description.is_none());

    assert_clean!(store, EXPERIENCE_ID);
    let experience = store.read_experience(EXPERIENCE_ID).await.unwrap();
    assert_eq!(experience.title, "Renamed");

    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.online_status.unwrap().get(EXPERIENCE_ID),
        Some(&OnlineStatus::Online)
    );
    assert!(event.sync_errors.is_none());
}

#[tokio::test]
async fn test_created_entry_replaces_placeholder_in_place() {
    let store = seeded_store(vec![online_entry("e1", EXPERIENCE_ID, &[1])]).await;
    let created = assert_ok!(
        editor(&store)
            .create_entry(
                EXPERIENCE_ID,
                vec![(DEFINITION_ID.to_string(), DataValue::Integer(5))]
            )
            .await
    );

    let mut server_entry = online_entry("e2", EXPERIENCE_ID, &[5]);
    server_entry.client_id = Some(created.id.clone());
    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.new_entries = Some(vec![CreateEntryOutcome::CreateEntrySuccess {
        entry: server_entry,
    }]);
    let remote = Arc::new(ScriptedRemote::new().answer_update(result));
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    orchestrator.sync_to_server().await;

    let sent = remote.sent_updates();
    let added = sent[0].add_entries.as_ref().unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].client_id, created.id);

    let ids: Vec<String> = store
        .read_entries(EXPERIENCE_ID)
        .await
        .unwrap()
        .entries()
        .map(|entry| entry.id.clone())
        .collect();
    assert_eq!(ids, vec!["e2".to_string(), "e1".to_string()]);
    assert_clean!(store, EXPERIENCE_ID);

    let event = assert_ok!(events.try_recv());
    let offline_entries = event.experience_id_to_offline_entries.unwrap();
    assert_eq!(offline_entries[EXPERIENCE_ID][&created.id].id, "e2");
}

#[tokio::test]
async fn test_partial_data_object_failure_keeps_ledger_dirty() {
    let store = seeded_store(vec![online_entry("e1", EXPERIENCE_ID, &[1, 2])]).await;
    let editor = editor(&store);
    assert_ok!(
        editor
            .update_data_object(EXPERIENCE_ID, "e1", "e1-do0", DataValue::Integer(10))
            .await
    );
    assert_ok!(
        editor
            .update_data_object(EXPERIENCE_ID, "e1", "e1-do1", DataValue::Integer(20))
            .await
    );

    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.updated_entries = Some(vec![UpdateEntryOutcome::UpdateEntrySomeSuccess {
        entry: UpdateEntrySuccess {
            entry_id: "e1".to_string(),
            data_objects: vec![
                DataObjectOutcome::DataObjectSuccess {
                    data_object: DataObject::new("e1-do0", DEFINITION_ID, DataValue::Integer(10)),
                },
                DataObjectOutcome::DataObjectErrors {
                    errors: DataObjectError {
                        id: Some("e1-do1".to_string()),
                        definition: None,
                        data: Some("too large".to_string()),
                        error: None,
                    },
                },
            ],
        },
    }]);
    let remote = Arc::new(ScriptedRemote::new().answer_update(result));
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    orchestrator.sync_to_server().await;

    let record = store.ledger().read(EXPERIENCE_ID).await.unwrap();
    let modified = record.modified_entries.unwrap();
    assert_eq!(
        modified["e1"].iter().cloned().collect::<Vec<_>>(),
        vec!["e1-do1".to_string()]
    );

    let error = store.sync_errors().get(EXPERIENCE_ID).await.unwrap();
    assert_matches!(
        error.update_entries.as_ref().and_then(|entries| entries.get("e1")),
        Some(UpdateEntrySyncError::DataObjects(objects)) if objects.contains_key("e1-do1")
    );

    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.online_status.unwrap()[EXPERIENCE_ID],
        OnlineStatus::PartOffline
    );

    // errored experiences sit out until the error is cleared
    assert_eq!(orchestrator.sync_to_server().await, CycleOutcome::NothingSent);
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn test_repeated_delete_is_sent_once() {
    let store = seeded_store(vec![online_entry("e1", EXPERIENCE_ID, &[1])]).await;
    let editor = editor(&store);
    assert_ok!(editor.delete_entry(EXPERIENCE_ID, "e1").await);
    assert_ok!(editor.delete_entry(EXPERIENCE_ID, "e1").await);

    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.deleted_entries = Some(vec![DeleteEntryOutcome::EntrySuccess {
        entry: online_entry("e1", EXPERIENCE_ID, &[]),
    }]);
    let remote = Arc::new(ScriptedRemote::new().answer_update(result));
    let orchestrator = orchestrator(&store, &remote);

    orchestrator.sync_to_server().await;

    assert_eq!(
        remote.sent_updates()[0].delete_entries,
        Some(vec!["e1".to_string()])
    );
    assert_clean!(store, EXPERIENCE_ID);
    assert!(store.read_entries(EXPERIENCE_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_experience_records_error_and_keeps_ledger() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().answer_updates(vec![
        UpdateExperienceOutcome::UpdateExperienceErrors {
            errors: UpdateExperienceError {
                experience_id: EXPERIENCE_ID.to_string(),
                error: "experience not found".to_string(),
            },
        },
    ]));
    let orchestrator = orchestrator(&store, &remote);

    orchestrator.sync_to_server().await;

    let error = store.sync_errors().get(EXPERIENCE_ID).await.unwrap();
    assert_eq!(error.error.as_deref(), Some("experience not found"));
    assert!(store.ledger().read(EXPERIENCE_ID).await.is_some());
}

#[tokio::test]
async fn test_batch_rejection_leaves_state_untouched() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().answer_all_fail("unauthorized"));
    let orchestrator = orchestrator(&store, &remote);

    orchestrator.sync_to_server().await;

    assert!(store.ledger().read(EXPERIENCE_ID).await.is_some());
    assert!(!store.sync_errors().has_error(EXPERIENCE_ID).await);
    assert!(!orchestrator.flag().is_syncing());
}

#[tokio::test]
async fn test_creates_and_updates_share_one_call() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let created = editor(&store).create_experience("Sleep", None, vec![]).await;

    let remote = Arc::new(
        ScriptedRemote::new()
            .answer_creates(vec![])
            .answer_update(renamed("Renamed")),
    );
    let orchestrator = orchestrator(&store, &remote);

    assert_eq!(
        orchestrator.sync_to_server().await,
        CycleOutcome::Completed {
            created: 1,
            updated: 1
        }
    );
    assert_eq!(remote.calls(), 1);
    assert_eq!(remote.combined_calls(), 1);
    assert_eq!(remote.sent_creates()[0].client_id, created.id);
}

#[tokio::test]
async fn test_paused_cycle_does_not_call() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().answer_update(renamed("Renamed")));
    let orchestrator = orchestrator(&store, &remote);

    orchestrator.flag().pause();
    assert_eq!(orchestrator.sync_to_server().await, CycleOutcome::Paused);
    assert_eq!(remote.calls(), 0);

    orchestrator.flag().resume();
    assert_matches!(orchestrator.sync_to_server().await, CycleOutcome::Completed { .. });
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn test_service_syncs_in_background() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().answer_update(renamed("Renamed")));
    let config = assert_ok!(SyncConfig::builder().sync_interval_secs(3600).build());

    let mut service = SyncService::new(store.clone(), remote.clone(), &config);
    let mut events = service.subscribe();
    service.start();
    service.request_sync();

    let event = assert_ok!(tokio::time::timeout(Duration::from_secs(2), events.recv()).await);
    let event = assert_ok!(event);
    assert_eq!(
        event.online_status.unwrap()[EXPERIENCE_ID],
        OnlineStatus::Online
    );
    assert_eq!(service.metrics().successful_syncs, 1);

    service.stop().await;
    assert_clean!(store, EXPERIENCE_ID);
}

#[tokio::test]
async fn test_title_edited_in_flight_survives_and_resyncs() {
    let store = seeded_store(vec![]).await;
    rename(&store, "First").await;
    let remote = Arc::new(ScriptedRemote::new().held().answer_update(renamed("First")));
    let orchestrator = orchestrator(&store, &remote);

    let (outcome, _) = tokio::join!(orchestrator.sync_to_server(), async {
        remote.wait_until_called().await;
        rename(&store, "Second").await;
        remote.release();
    });

    assert_matches!(outcome, CycleOutcome::Completed { .. });
    let experience = store.read_experience(EXPERIENCE_ID).await.unwrap();
    assert_eq!(experience.title, "Second");
    let record = store.ledger().read(EXPERIENCE_ID).await.unwrap();
    assert!(record.own_fields.unwrap().title);

    remote.release();
    orchestrator.sync_to_server().await;
    let sent = remote.sent_updates();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].own_fields.as_ref().unwrap().title.as_deref(), Some("Second"));
}

#[tokio::test]
async fn test_data_object_edited_in_flight_stays_dirty() {
    let store = seeded_store(vec![online_entry("e1", EXPERIENCE_ID, &[1])]).await;
    let editor = editor(&store);
    assert_ok!(
        editor
            .update_data_object(EXPERIENCE_ID, "e1", "e1-do0", DataValue::Integer(10))
            .await
    );

    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.updated_entries = Some(vec![UpdateEntryOutcome::UpdateEntrySomeSuccess {
        entry: UpdateEntrySuccess {
            entry_id: "e1".to_string(),
            data_objects: vec![DataObjectOutcome::DataObjectSuccess {
                data_object: DataObject::new("e1-do0", DEFINITION_ID, DataValue::Integer(10)),
            }],
        },
    }]);
    let remote = Arc::new(ScriptedRemote::new().held().answer_update(result));
    let orchestrator = orchestrator(&store, &remote);

    let (outcome, _) = tokio::join!(orchestrator.sync_to_server(), async {
        remote.wait_until_called().await;
        assert_ok!(
            editor
                .update_data_object(EXPERIENCE_ID, "e1", "e1-do0", DataValue::Integer(11))
                .await
        );
        remote.release();
    });

    assert_matches!(outcome, CycleOutcome::Completed { .. });
    let connection = store.read_entries(EXPERIENCE_ID).await.unwrap();
    let data_object = connection.find("e1").unwrap().data_object("e1-do0").unwrap();
    assert_eq!(data_object.data, DataValue::Integer(11));
    let record = store.ledger().read(EXPERIENCE_ID).await.unwrap();
    assert!(record.modified_entries.unwrap()["e1"].contains("e1-do0"));
    assert!(!store.sync_errors().has_error(EXPERIENCE_ID).await);
}

#[tokio::test]
async fn test_entry_created_in_flight_is_sent_next_cycle() {
    let store = seeded_store(vec![]).await;
    let editor = editor(&store);
    let first = assert_ok!(
        editor
            .create_entry(
                EXPERIENCE_ID,
                vec![(DEFINITION_ID.to_string(), DataValue::Integer(5))]
            )
            .await
    );

    let mut server_entry = online_entry("e2", EXPERIENCE_ID, &[5]);
    server_entry.client_id = Some(first.id.clone());
    let mut result = UpdateExperienceResult::new(EXPERIENCE_ID);
    result.new_entries = Some(vec![CreateEntryOutcome::CreateEntrySuccess {
        entry: server_entry,
    }]);
    let remote = Arc::new(ScriptedRemote::new().held().answer_update(result));
    let orchestrator = orchestrator(&store, &remote);
    let mut events = orchestrator.subscribe();

    let (outcome, second) = tokio::join!(orchestrator.sync_to_server(), async {
        remote.wait_until_called().await;
        let second = editor
            .create_entry(
                EXPERIENCE_ID,
                vec![(DEFINITION_ID.to_string(), DataValue::Integer(6))],
            )
            .await;
        remote.release();
        second
    });
    let second = assert_ok!(second);

    assert_matches!(outcome, CycleOutcome::Completed { .. });
    let ids: Vec<String> = store
        .read_entries(EXPERIENCE_ID)
        .await
        .unwrap()
        .entries()
        .map(|entry| entry.id.clone())
        .collect();
    assert_eq!(ids, vec![second.id.clone(), "e2".to_string()]);
    assert!(store.ledger().read(EXPERIENCE_ID).await.unwrap().new_entries);

    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.online_status.unwrap()[EXPERIENCE_ID],
        OnlineStatus::PartOffline
    );

    remote.release();
    orchestrator.sync_to_server().await;
    let added = remote.sent_updates()[1].add_entries.clone().unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].client_id, second.id);
}

#[tokio::test]
async fn test_service_stop_lets_cycle_in_flight_write_back() {
    let store = seeded_store(vec![]).await;
    rename(&store, "Renamed").await;
    let remote = Arc::new(ScriptedRemote::new().held().answer_update(renamed("Renamed")));
    let config = assert_ok!(SyncConfig::builder().sync_interval_secs(3600).build());

    let mut service = SyncService::new(store.clone(), remote.clone(), &config);
    service.start();
    remote.wait_until_called().await;

    tokio::join!(service.stop(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        // stop is still waiting on the held request
        assert!(store.ledger().read(EXPERIENCE_ID).await.is_some());
        remote.release();
    });

    assert!(!service.is_running());
    assert!(!service.flag().is_syncing());
    assert_clean!(store, EXPERIENCE_ID);
    assert_eq!(service.metrics().successful_syncs, 1);
}
