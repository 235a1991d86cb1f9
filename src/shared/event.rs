/**
 * Sync Completed Event
 *
 * Broadcast once per sync cycle whose request produced a response. It tells
 * listeners which offline experiences and entries now have server ids, which
 * experiences failed and which are fully online.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::client::offline::sync_errors::SyncError;
use crate::shared::journal::{Entry, Experience};

/// Whether an experience still has unsynced state after a cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OnlineStatus {
    /// Nothing left in the ledger
    Online,
    /// Server id assigned but some fields or entries still unsynced
    PartOffline,
    /// Still only known under its offline id
    Offline,
}

/// Payload broadcast at the end of a sync cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncCompletedEvent {
    /// Offline experience id to the experience the server created for it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_id_to_online_experience: Option<BTreeMap<String, Experience>>,

    /// Experience id to (offline entry id to the server's entry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_id_to_offline_entries: Option<BTreeMap<String, BTreeMap<String, Entry>>>,

    /// Sync errors recorded by this cycle, keyed by experience id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_errors: Option<BTreeMap<String, SyncError>>,

    /// Online status of every experience touched by this cycle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_status: Option<BTreeMap<String, OnlineStatus>>,

    /// When the cycle finished
    #[serde(default = "Utc::now")]
    pub completed_at: DateTime<Utc>,
}

impl SyncCompletedEvent {
    /// Build an event from the side maps of a cycle, dropping empty maps
    pub fn new(
        offline_id_to_online_experience: BTreeMap<String, Experience>,
        experience_id_to_offline_entries: BTreeMap<String, BTreeMap<String, Entry>>,
        sync_errors: BTreeMap<String, SyncError>,
        online_status: BTreeMap<String, OnlineStatus>,
    ) -> Self {
        fn non_empty<K, V>(map: BTreeMap<K, V>) -> Option<BTreeMap<K, V>> {
            if map.is_empty() {
                None
            } else {
                Some(map)
            }
        }

        Self {
            offline_id_to_online_experience: non_empty(offline_id_to_online_experience),
            experience_id_to_offline_entries: non_empty(experience_id_to_offline_entries),
            sync_errors: non_empty(sync_errors),
            online_status: non_empty(online_status),
            completed_at: Utc::now(),
        }
    }
}
