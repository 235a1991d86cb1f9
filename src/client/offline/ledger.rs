//! # Unsynced Ledger
//!
//! Per-experience record of which fields are dirty, i.e. edited locally and
//! not yet acknowledged by the server. The ledger stores flags, never values:
//! the current value of a dirty field always lives in the local store.
//!
//! An experience with nothing dirty has no record at all. Every write path
//! below deletes a record that would become empty instead of storing it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use journal_sync::client::offline::ledger::{OwnFieldsDirty, UnsyncedLedger, UnsyncedModifiedExperience};
//!
//! # async fn example() {
//! let ledger = UnsyncedLedger::new();
//!
//! let patch = UnsyncedModifiedExperience {
//!     own_fields: Some(OwnFieldsDirty { title: true, description: false }),
//!     ..Default::default()
//! };
//! ledger.mark_dirty("42", patch).await;
//!
//! assert!(ledger.read("42").await.is_some());
//! ledger.clear_aggregate("42").await;
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::{RwLock, RwLockWriteGuard};

fn is_false(value: &bool) -> bool {
    !*value
}

/// Dirty own fields of an experience
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnFieldsDirty {
    #[serde(default, skip_serializing_if = "is_false")]
    pub title: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub description: bool,
}

impl OwnFieldsDirty {
    pub fn is_empty(&self) -> bool {
        !self.title && !self.description
    }
}

/// Dirty fields of one data definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDirty {
    #[serde(default, skip_serializing_if = "is_false")]
    pub name: bool,
    #[serde(default, rename = "type", skip_serializing_if = "is_false")]
    pub data_type: bool,
}

impl DefinitionDirty {
    pub fn is_empty(&self) -> bool {
        !self.name && !self.data_type
    }
}

/// Dirty state of one experience
///
/// `modified_entries` maps an entry id to the ids of its modified data
/// objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsyncedModifiedExperience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_fields: Option<OwnFieldsDirty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, DefinitionDirty>>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub new_entries: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_entries: Option<BTreeMap<String, BTreeSet<String>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_entries: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub is_offline: bool,
}

impl UnsyncedModifiedExperience {
    /// Record for an experience that exists only on this client
    pub fn offline() -> Self {
        Self {
            is_offline: true,
            ..Default::default()
        }
    }

    /// Record flagging new entries
    pub fn new_entries() -> Self {
        Self {
            new_entries: true,
            ..Default::default()
        }
    }

    /// True when no key carries a dirty flag
    pub fn is_empty(&self) -> bool {
        let own_fields = self.own_fields.as_ref().map_or(true, OwnFieldsDirty::is_empty);
        let definitions = self
            .definitions
            .as_ref()
            .map_or(true, |defs| defs.values().all(DefinitionDirty::is_empty));
        let modified = self
            .modified_entries
            .as_ref()
            .map_or(true, |entries| entries.values().all(BTreeSet::is_empty));
        let deleted = self.deleted_entries.as_ref().map_or(true, Vec::is_empty);

        own_fields && definitions && !self.new_entries && modified && deleted && !self.is_offline
    }

    /// Drop keys whose contents carry no flag
    pub fn normalize(&mut self) {
        if self.own_fields.as_ref().is_some_and(OwnFieldsDirty::is_empty) {
            self.own_fields = None;
        }

        if let Some(definitions) = self.definitions.as_mut() {
            definitions.retain(|_, dirty| !dirty.is_empty());
            if definitions.is_empty() {
                self.definitions = None;
            }
        }

        if let Some(entries) = self.modified_entries.as_mut() {
            entries.retain(|_, objects| !objects.is_empty());
            if entries.is_empty() {
                self.modified_entries = None;
            }
        }

        if self.deleted_entries.as_ref().is_some_and(Vec::is_empty) {
            self.deleted_entries = None;
        }
    }

    /// Shallow merge: every key set in `patch` replaces the same key here
    pub fn merge(&mut self, patch: UnsyncedModifiedExperience) {
        if patch.own_fields.is_some() {
            self.own_fields = patch.own_fields;
        }
        if patch.definitions.is_some() {
            self.definitions = patch.definitions;
        }
        if patch.new_entries {
            self.new_entries = true;
        }
        if patch.modified_entries.is_some() {
            self.modified_entries = patch.modified_entries;
        }
        if patch.deleted_entries.is_some() {
            self.deleted_entries = patch.deleted_entries;
        }
        if patch.is_offline {
            self.is_offline = true;
        }
    }
}

/// Store of dirty records keyed by experience id
#[derive(Debug, Default)]
pub struct UnsyncedLedger {
    records: RwLock<BTreeMap<String, UnsyncedModifiedExperience>>,
}

impl UnsyncedLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merge `patch` into the record of `experience_id`, creating it
    /// if absent. A merge that leaves nothing dirty deletes the record.
    pub async fn mark_dirty(&self, experience_id: &str, patch: UnsyncedModifiedExperience) {
        self.writer().await.mark_dirty(experience_id, patch);
    }

    /// Edit the record of `experience_id` in place under one lock
    pub async fn modify<F>(&self, experience_id: &str, edit: F)
    where
        F: FnOnce(&mut UnsyncedModifiedExperience),
    {
        let mut records = self.records.write().await;
        let mut record = records.remove(experience_id).unwrap_or_default();
        edit(&mut record);
        Self::store(&mut records, experience_id, record);
    }

    /// Replace the record of `experience_id`; an empty record deletes it
    pub async fn write(&self, experience_id: &str, record: UnsyncedModifiedExperience) {
        self.writer().await.write(experience_id, record);
    }

    /// Remove the record of `experience_id`. Absent ids are a no-op.
    pub async fn clear_aggregate(&self, experience_id: &str) {
        self.writer().await.clear_aggregate(experience_id);
    }

    /// Hold the ledger for several writes at once
    pub async fn writer(&self) -> LedgerWriter<'_> {
        LedgerWriter {
            records: self.records.write().await,
        }
    }

    /// Remove several records at once
    pub async fn clear_aggregates<I, S>(&self, experience_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut records = self.records.write().await;
        for id in experience_ids {
            records.remove(id.as_ref());
        }
    }

    pub async fn read(&self, experience_id: &str) -> Option<UnsyncedModifiedExperience> {
        self.records.read().await.get(experience_id).cloned()
    }

    /// Snapshot of every record
    pub async fn read_all(&self) -> BTreeMap<String, UnsyncedModifiedExperience> {
        self.records.read().await.clone()
    }

    /// Replace the whole ledger, dropping empty records
    pub async fn restore(&self, snapshot: BTreeMap<String, UnsyncedModifiedExperience>) {
        let mut records = self.records.write().await;
        records.clear();
        for (id, record) in snapshot {
            Self::store(&mut records, &id, record);
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn store(
        records: &mut BTreeMap<String, UnsyncedModifiedExperience>,
        experience_id: &str,
        mut record: UnsyncedModifiedExperience,
    ) {
        record.normalize();
        if !record.is_empty() {
            records.insert(experience_id.to_string(), record);
        }
    }
}

/// Exclusive access to the ledger, released on drop
pub struct LedgerWriter<'a> {
    records: RwLockWriteGuard<'a, BTreeMap<String, UnsyncedModifiedExperience>>,
}

impl LedgerWriter<'_> {
    pub fn mark_dirty(&mut self, experience_id: &str, patch: UnsyncedModifiedExperience) {
        let mut record = self.records.remove(experience_id).unwrap_or_default();
        record.merge(patch);
        UnsyncedLedger::store(&mut self.records, experience_id, record);
    }

    pub fn write(&mut self, experience_id: &str, record: UnsyncedModifiedExperience) {
        self.records.remove(experience_id);
        UnsyncedLedger::store(&mut self.records, experience_id, record);
    }

    pub fn clear_aggregate(&mut self, experience_id: &str) {
        self.records.remove(experience_id);
    }
}
