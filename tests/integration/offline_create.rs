//! Offline creation integration tests
//!
//! Experiences created offline, accepted by the server, and the entries that
//! follow them to their new online id.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use journal_sync::client::local_db::{LocalCache, LocalStore};
use journal_sync::client::offline::ids::is_offline_id;
use journal_sync::client::remote::outcomes::{
    CreateEntriesOutcome, CreateEntryError, CreateEntryErrorMeta, CreateEntryOutcome,
    CreateExperienceError, CreateExperienceErrorMeta, CreateExperienceOutcome,
    UpdateExperienceResult,
};
use journal_sync::client::sync::{CycleOutcome, SyncFlag, SyncOrchestrator};
use journal_sync::shared::journal::{DataDefinition, DataType, DataValue, Entry, Experience};
use journal_sync::shared::OnlineStatus;

use crate::common::*;
use crate::{assert_clean, assert_ok};

const ONLINE_ID: &str = "srv-1";
const ONLINE_DEFINITION_ID: &str = "srv-def-1";

fn orchestrator(
    store: &Arc<LocalCache>,
    remote: &Arc<ScriptedRemote>,
    flag: &Arc<SyncFlag>,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        store.clone(),
        remote.clone(),
        flag.clone(),
        Duration::from_millis(20),
    )
}

/// What the server returns for `offline`
fn accepted(offline: &Experience) -> Experience {
    let mut experience = Experience::new(ONLINE_ID, offline.title.clone());
    experience.client_id = Some(offline.id.clone());
    for definition in &offline.data_definitions {
        let mut server = DataDefinition::new(ONLINE_DEFINITION_ID, definition.name.clone(), definition.data_type);
        server.client_id = Some(definition.id.clone());
        experience.data_definitions.push(server);
    }
    experience
}

fn server_entry(id: &str, client_id: &str) -> Entry {
    let mut entry = Entry::new(id, ONLINE_ID);
    entry.client_id = Some(client_id.to_string());
    entry
}

#[tokio::test]
async fn test_accepted_experience_replaces_placeholder() {
    let store = Arc::new(LocalCache::new());
    store
        .write_experience(online_experience(EXPERIENCE_ID, "Workouts"))
        .await;
    let offline = editor(&store)
        .create_experience("Sleep", Some("nightly".to_string()), vec![])
        .await;
    let remote = Arc::new(ScriptedRemote::new().answer_creates(vec![
        CreateExperienceOutcome::ExperienceSuccess {
            experience: accepted(&offline),
            entries: None,
        },
    ]));
    let flag = Arc::new(SyncFlag::new());
    let orchestrator = orchestrator(&store, &remote, &flag);
    let mut events = orchestrator.subscribe();

    assert_eq!(
        orchestrator.sync_to_server().await,
        CycleOutcome::Completed {
            created: 1,
            updated: 0
        }
    );

    let ids: Vec<String> = store
        .list_experiences()
        .await
        .into_iter()
        .map(|experience| experience.id)
        .collect();
    assert_eq!(ids, vec![ONLINE_ID.to_string(), EXPERIENCE_ID.to_string()]);
    assert_clean!(store, &offline.id);
    assert!(store.ledger().is_empty().await);

    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.offline_id_to_online_experience.unwrap()[&offline.id].id,
        ONLINE_ID
    );
    assert_eq!(
        flag.take_offline_id_for_online_id(ONLINE_ID),
        Some(offline.id.clone())
    );
}

#[tokio::test]
async fn test_rejected_experience_stays_offline_with_error() {
    let store = Arc::new(LocalCache::new());
    let offline = editor(&store).create_experience("", None, vec![]).await;
    let remote = Arc::new(ScriptedRemote::new().answer_creates(vec![
        CreateExperienceOutcome::CreateExperienceErrors {
            errors: CreateExperienceError {
                meta: CreateExperienceErrorMeta {
                    index: 0,
                    client_id: Some(offline.id.clone()),
                },
                error: None,
                title: Some("title is required".to_string()),
                data_definitions: None,
            },
        },
    ]));
    let orchestrator = orchestrator(&store, &remote, &Arc::new(SyncFlag::new()));
    let mut events = orchestrator.subscribe();

    orchestrator.sync_to_server().await;

    assert!(store.read_experience(&offline.id).await.is_some());
    assert!(store.ledger().read(&offline.id).await.is_some());
    let error = store.sync_errors().get(&offline.id).await.unwrap();
    assert_eq!(
        error.create_experience.unwrap().title.as_deref(),
        Some("title is required")
    );

    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.online_status.unwrap()[&offline.id],
        OnlineStatus::Offline
    );
}

#[tokio::test]
async fn test_rejected_entries_follow_with_remapped_definitions() {
    let store = Arc::new(LocalCache::new());
    let editor = editor(&store);
    let offline = editor
        .create_experience("Runs", None, vec![("distance".to_string(), DataType::Integer)])
        .await;
    let offline_definition = offline.data_definitions[0].id.clone();
    let first = assert_ok!(
        editor
            .create_entry(&offline.id, vec![(offline_definition.clone(), DataValue::Integer(5))])
            .await
    );
    let second = assert_ok!(
        editor
            .create_entry(&offline.id, vec![(offline_definition.clone(), DataValue::Integer(-1))])
            .await
    );

    let remote = Arc::new(ScriptedRemote::new().answer_creates(vec![
        CreateExperienceOutcome::ExperienceSuccess {
            experience: accepted(&offline),
            entries: Some(CreateEntriesOutcome {
                experience_id: ONLINE_ID.to_string(),
                entries: vec![server_entry("srv-e1", &first.id)],
                errors: Some(vec![CreateEntryError {
                    meta: CreateEntryErrorMeta {
                        experience_id: ONLINE_ID.to_string(),
                        index: 0,
                        client_id: Some(second.id.clone()),
                    },
                    error: Some("distance must be positive".to_string()),
                    experience: None,
                    data_objects: None,
                }]),
            }),
        },
    ]));
    let flag = Arc::new(SyncFlag::new());
    let orchestrator = orchestrator(&store, &remote, &flag);

    orchestrator.sync_to_server().await;

    let sent = remote.sent_creates();
    assert_eq!(sent[0].entries.as_ref().map(Vec::len), Some(2));

    let online_ids: Vec<String> = store
        .read_entries(ONLINE_ID)
        .await
        .unwrap()
        .entries()
        .map(|entry| entry.id.clone())
        .collect();
    assert_eq!(online_ids, vec!["srv-e1".to_string()]);

    let leftovers = store.read_entries(&offline.id).await.unwrap();
    let leftover = leftovers.find(&second.id).unwrap();
    assert!(is_offline_id(&leftover.id));
    assert_eq!(leftover.data_objects[0].definition_id, ONLINE_DEFINITION_ID);

    assert_clean!(store, &offline.id);
    assert!(store.ledger().read(ONLINE_ID).await.unwrap().new_entries);
    let error = store.sync_errors().get(ONLINE_ID).await.unwrap();
    assert_matches!(error.create_entries, Some(errors) if errors.contains_key(&second.id));

    // the rejected leftover waits for the user; the next cycle skips it
    let idle = Arc::new(ScriptedRemote::new());
    let orchestrator = self::orchestrator(&store, &idle, &flag);
    assert_eq!(orchestrator.sync_to_server().await, CycleOutcome::NothingSent);
    assert_eq!(idle.calls(), 0);
    assert!(store.read_entries(&offline.id).await.unwrap().find(&second.id).is_some());
}

#[tokio::test]
async fn test_unanswered_entries_are_retried_as_an_update() {
    let store = Arc::new(LocalCache::new());
    let editor = editor(&store);
    let offline = editor
        .create_experience("Runs", None, vec![("distance".to_string(), DataType::Integer)])
        .await;
    let offline_definition = offline.data_definitions[0].id.clone();
    let first = assert_ok!(
        editor
            .create_entry(&offline.id, vec![(offline_definition.clone(), DataValue::Integer(5))])
            .await
    );
    let second = assert_ok!(
        editor
            .create_entry(&offline.id, vec![(offline_definition.clone(), DataValue::Integer(6))])
            .await
    );

    // accepted, but without a word about the entries sent with it
    let remote = Arc::new(ScriptedRemote::new().answer_creates(vec![
        CreateExperienceOutcome::ExperienceSuccess {
            experience: accepted(&offline),
            entries: None,
        },
    ]));
    let flag = Arc::new(SyncFlag::new());
    let orchestrator = orchestrator(&store, &remote, &flag);
    let mut events = orchestrator.subscribe();

    orchestrator.sync_to_server().await;

    assert_eq!(remote.sent_creates()[0].entries.as_ref().map(Vec::len), Some(2));
    assert!(store.read_entries(ONLINE_ID).await.unwrap().is_empty());
    assert_eq!(store.read_entries(&offline.id).await.unwrap().len(), 2);
    assert!(store.ledger().read(ONLINE_ID).await.unwrap().new_entries);
    assert!(!store.sync_errors().has_error(ONLINE_ID).await);
    let event = assert_ok!(events.try_recv());
    assert_eq!(
        event.online_status.unwrap()[ONLINE_ID],
        OnlineStatus::PartOffline
    );

    let mut result = UpdateExperienceResult::new(ONLINE_ID);
    result.new_entries = Some(vec![
        CreateEntryOutcome::CreateEntrySuccess {
            entry: server_entry("srv-e2", &second.id),
        },
        CreateEntryOutcome::CreateEntrySuccess {
            entry: server_entry("srv-e1", &first.id),
        },
    ]);
    let remote = Arc::new(ScriptedRemote::new().answer_update(result));
    let orchestrator = self::orchestrator(&store, &remote, &flag);

    orchestrator.sync_to_server().await;

    let added = remote.sent_updates()[0].add_entries.clone().unwrap();
    let mut added_ids: Vec<String> = added.iter().map(|entry| entry.client_id.clone()).collect();
    added_ids.sort();
    let mut expected = vec![first.id.clone(), second.id.clone()];
    expected.sort();
    assert_eq!(added_ids, expected);
    assert!(added
        .iter()
        .all(|entry| entry.data_objects[0].definition_id == ONLINE_DEFINITION_ID));

    let mut online_ids: Vec<String> = store
        .read_entries(ONLINE_ID)
        .await
        .unwrap()
        .entries()
        .map(|entry| entry.id.clone())
        .collect();
    online_ids.sort();
    assert_eq!(online_ids, vec!["srv-e1".to_string(), "srv-e2".to_string()]);
    assert!(store.read_entries(&offline.id).await.unwrap().is_empty());
    assert_clean!(store, ONLINE_ID);
}
