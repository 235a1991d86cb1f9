//! # Sync Error Store
//!
//! Per-experience record of the failures the last reconciliation saw. A
//! record exists only while at least one sub-error remains; the orchestrator
//! skips every experience that has one.
//!
//! Ordinary edits never write here. Only the reconcilers set or clear
//! records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::client::remote::outcomes::{
    CreateEntryError, CreateExperienceError, DataObjectError, DefinitionError, OwnFieldsError,
};

/// Failure of one entry update: either the whole entry or some of its
/// data objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateEntrySyncError {
    Entry(String),
    DataObjects(BTreeMap<String, DataObjectError>),
}

/// Failures recorded for one experience
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_fields: Option<OwnFieldsError>,

    /// Keyed by definition id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<BTreeMap<String, DefinitionError>>,

    /// Keyed by the client id of the rejected entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_entries: Option<BTreeMap<String, CreateEntryError>>,

    /// Keyed by entry id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_entries: Option<BTreeMap<String, UpdateEntrySyncError>>,

    /// The experience update was rejected as a whole
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The offline experience itself was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_experience: Option<CreateExperienceError>,
}

impl SyncError {
    /// True when no sub-error is recorded
    pub fn is_empty(&self) -> bool {
        self.own_fields.is_none()
            && self.definitions.as_ref().map_or(true, BTreeMap::is_empty)
            && self.create_entries.as_ref().map_or(true, BTreeMap::is_empty)
            && self.update_entries.as_ref().map_or(true, BTreeMap::is_empty)
            && self.error.is_none()
            && self.create_experience.is_none()
    }

    /// Drop empty maps so that `is_empty` and the serialized form agree
    pub fn normalize(&mut self) {
        if self.definitions.as_ref().is_some_and(BTreeMap::is_empty) {
            self.definitions = None;
        }
        if self.create_entries.as_ref().is_some_and(BTreeMap::is_empty) {
            self.create_entries = None;
        }
        if let Some(entries) = self.update_entries.as_mut() {
            entries.retain(|_, error| match error {
                UpdateEntrySyncError::Entry(_) => true,
                UpdateEntrySyncError::DataObjects(objects) => !objects.is_empty(),
            });
            if entries.is_empty() {
                self.update_entries = None;
            }
        }
    }

    /// `Some(self)` when anything remains after normalizing
    pub fn into_non_empty(mut self) -> Option<Self> {
        self.normalize();
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Store of sync errors keyed by experience id
#[derive(Debug, Default)]
pub struct SyncErrorStore {
    errors: RwLock<BTreeMap<String, SyncError>>,
}

impl SyncErrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, experience_id: &str) -> Option<SyncError> {
        self.errors.read().await.get(experience_id).cloned()
    }

    /// Whether the last reconciliation of `experience_id` left an error
    pub async fn has_error(&self, experience_id: &str) -> bool {
        self.errors.read().await.contains_key(experience_id)
    }

    /// Install `error`, or remove the record when `error` is empty
    pub async fn set(&self, experience_id: &str, error: SyncError) {
        let mut errors = self.errors.write().await;
        match error.into_non_empty() {
            Some(error) => {
                errors.insert(experience_id.to_string(), error);
            }
            None => {
                errors.remove(experience_id);
            }
        }
    }

    pub async fn remove(&self, experience_id: &str) {
        self.errors.write().await.remove(experience_id);
    }

    /// Apply a batch of installs (`Some`) and removals (`None`)
    pub async fn apply(&self, changes: BTreeMap<String, Option<SyncError>>) {
        self.writer().await.apply(changes);
    }

    /// Hold the store for several writes at once
    pub async fn writer(&self) -> SyncErrorWriter<'_> {
        SyncErrorWriter {
            errors: self.errors.write().await,
        }
    }

    pub async fn read_all(&self) -> BTreeMap<String, SyncError> {
        self.errors.read().await.clone()
    }

    pub async fn restore(&self, snapshot: BTreeMap<String, SyncError>) {
        let mut errors = self.errors.write().await;
        errors.clear();
        errors.extend(
            snapshot
                .into_iter()
                .filter_map(|(id, error)| error.into_non_empty().map(|error| (id, error))),
        );
    }
}

/// Exclusive access to the sync error store, released on drop
pub struct SyncErrorWriter<'a> {
    errors: RwLockWriteGuard<'a, BTreeMap<String, SyncError>>,
}

impl SyncErrorWriter<'_> {
    pub fn apply(&mut self, changes: BTreeMap<String, Option<SyncError>>) {
        for (experience_id, change) in changes {
            match change.and_then(SyncError::into_non_empty) {
                Some(error) => {
                    self.errors.insert(experience_id, error);
                }
                None => {
                    self.errors.remove(&experience_id);
                }
            }
        }
    }
}
