//! # Reconciliation
//!
//! Merges the server's answer to a sync cycle back into local state.
//!
//! Both reconcilers are pure: they read snapshots of the cached
//! experience, its connections, its ledger record and its previous sync
//! error, together with what the cycle actually sent, and return a
//! [`WriteSet`] describing every change. The orchestrator hands the
//! write-set to [`LocalStore::apply_write_set`](crate::client::local_db::LocalStore::apply_write_set),
//! so no observer sees a half-merged experience.
//!
//! A field edited again while its request was in flight keeps the local
//! value and stays dirty; the server's answer only settles what was sent.
//!
//! - `update.rs`: experiences that already had a server id
//! - `create.rs`: experiences created offline, including id remapping

pub mod create;
pub mod update;

pub use create::{reconcile_creates, CreateContext, SentCreate};
pub use update::{reconcile_update, SentUpdate, UpdateContext};

use std::collections::{BTreeMap, BTreeSet};

use crate::client::offline::ledger::UnsyncedModifiedExperience;
use crate::client::offline::sync_errors::SyncError;
use crate::client::remote::inputs::CreateEntryInput;
use crate::shared::event::OnlineStatus;
use crate::shared::journal::{Entry, EntryConnection, Experience};

/// One change to the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerWrite {
    /// Replace the record; an empty record deletes it
    Write(String, UnsyncedModifiedExperience),
    /// Shallow-merge into the record
    MarkDirty(String, UnsyncedModifiedExperience),
    Clear(String),
}

/// Everything one reconciliation changes, plus the side maps reported to
/// listeners of the sync-completed event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteSet {
    /// Experiences written back under their own id
    pub experiences: Vec<Experience>,
    /// Connections written under the given experience id
    pub connections: Vec<(String, EntryConnection)>,
    /// Bulk upsert into the experience list, replacing by key
    pub upserts: Vec<(String, Experience)>,
    pub ledger: Vec<LedgerWrite>,
    /// `None` removes the experience's sync error
    pub sync_errors: BTreeMap<String, Option<SyncError>>,
    pub offline_id_to_online_experience: BTreeMap<String, Experience>,
    /// Experience id to (offline entry id to the server's entry)
    pub experience_id_to_offline_entries: BTreeMap<String, BTreeMap<String, Entry>>,
    pub online_status: BTreeMap<String, OnlineStatus>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
            && self.connections.is_empty()
            && self.upserts.is_empty()
            && self.ledger.is_empty()
            && self.sync_errors.is_empty()
    }

    /// Append `other`; its entries win where both touch the same key
    pub fn merge(&mut self, other: WriteSet) {
        self.experiences.extend(other.experiences);
        self.connections.extend(other.connections);
        self.upserts.extend(other.upserts);
        self.ledger.extend(other.ledger);
        self.sync_errors.extend(other.sync_errors);
        self.offline_id_to_online_experience
            .extend(other.offline_id_to_online_experience);
        self.experience_id_to_offline_entries
            .extend(other.experience_id_to_offline_entries);
        self.online_status.extend(other.online_status);
    }

    /// Sync errors that remain recorded after this write-set is applied
    pub fn recorded_errors(&self) -> BTreeMap<String, SyncError> {
        self.sync_errors
            .iter()
            .filter_map(|(id, error)| error.clone().map(|error| (id.clone(), error)))
            .collect()
    }
}

/// The server's copy of an entry created from `sent`, carrying local data
/// values edited after the entry went out. Returns the merged entry and the
/// server ids of the data objects that still need an update.
pub(crate) fn carry_local_edits(
    server: &Entry,
    local: &Entry,
    sent: Option<&CreateEntryInput>,
) -> (Entry, BTreeSet<String>) {
    let mut merged = server.clone();
    let mut modified = BTreeSet::new();
    let Some(sent) = sent else {
        return (merged, modified);
    };

    for data_object in &mut merged.data_objects {
        let Some(client_id) = data_object.client_id.as_deref() else {
            continue;
        };
        let sent_value = sent
            .data_objects
            .iter()
            .find(|d| d.client_id == client_id)
            .map(|d| &d.data);
        let local_value = local.data_object(client_id).map(|d| &d.data);

        if let (Some(sent_value), Some(local_value)) = (sent_value, local_value) {
            if sent_value != local_value {
                data_object.data = local_value.clone();
                modified.insert(data_object.id.clone());
            }
        }
    }
    (merged, modified)
}
