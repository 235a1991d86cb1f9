//! # Optimistic Edits
//!
//! Applies user edits to the local store immediately and records what
//! became dirty in the unsynced ledger, so the next sync cycle knows what
//! to send.
//!
//! Experiences created here live under an offline id until the server
//! accepts them; while offline they are submitted whole, so edits to them
//! need no per-field flags. Edits never touch the sync error store.
//!
//! Every edit holds the store's commit lock from its read to its ledger
//! write, so a sync cycle sees either all of an edit or none of it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use journal_sync::client::local_db::LocalCache;
//! use journal_sync::client::offline::OfflineEditor;
//! use journal_sync::shared::journal::{DataType, DataValue};
//!
//! # async fn example() -> Result<(), journal_sync::shared::EditError> {
//! let editor = OfflineEditor::new(Arc::new(LocalCache::new()));
//!
//! let experience = editor
//!     .create_experience("Runs", None, vec![("distance".to_string(), DataType::Integer)])
//!     .await;
//! let definition_id = experience.data_definitions[0].id.clone();
//! editor
//!     .create_entry(&experience.id, vec![(definition_id, DataValue::Integer(5))])
//!     .await?;
//! # Ok(())
//! # }
//! ```

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::ids::{
    is_offline_id, make_offline_data_object_id, make_offline_entry_id, new_offline_id,
};
use super::ledger::UnsyncedModifiedExperience;
use crate::client::local_db::LocalStore;
use crate::shared::error::EditError;
use crate::shared::journal::{
    DataDefinition, DataObject, DataType, DataValue, Entry, EntryConnection, Experience,
};

pub type EditResult<T> = Result<T, EditError>;

/// Records local edits against a [`LocalStore`]
#[derive(Clone)]
pub struct OfflineEditor {
    store: Arc<dyn LocalStore>,
}

impl OfflineEditor {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    async fn experience(&self, experience_id: &str) -> EditResult<Experience> {
        self.store
            .read_experience(experience_id)
            .await
            .ok_or_else(|| EditError::ExperienceNotFound(experience_id.to_string()))
    }

    /// Create an experience that exists only on this client
    pub async fn create_experience(
        &self,
        title: impl Into<String>,
        description: Option<String>,
        definitions: Vec<(String, DataType)>,
    ) -> Experience {
        let _commit = self.store.commit_lock().lock().await;
        let id = new_offline_id();
        let mut experience = Experience::new(id.clone(), title);
        experience.client_id = Some(id.clone());
        experience.description = description;
        experience.data_definitions = definitions
            .into_iter()
            .map(|(name, data_type)| {
                let definition_id = new_offline_id();
                let mut definition = DataDefinition::new(definition_id.clone(), name, data_type);
                definition.client_id = Some(definition_id);
                definition
            })
            .collect();

        self.store.write_experience(experience.clone()).await;
        self.store.write_entries(&id, EntryConnection::default()).await;
        self.store
            .ledger()
            .mark_dirty(&id, UnsyncedModifiedExperience::offline())
            .await;

        tracing::debug!(experience_id = %id, "created offline experience");
        experience
    }

    /// Change title and/or description
    pub async fn update_own_fields(
        &self,
        experience_id: &str,
        title: Option<String>,
        description: Option<String>,
    ) -> EditResult<Experience> {
        let _commit = self.store.commit_lock().lock().await;
        let mut experience = self.experience(experience_id).await?;
        let title_changed = title.is_some();
        let description_changed = description.is_some();

        if let Some(title) = title {
            experience.title = title;
        }
        if description.is_some() {
            experience.description = description;
        }
        self.store.write_experience(experience.clone()).await;

        if !is_offline_id(experience_id) {
            self.store
                .ledger()
                .modify(experience_id, |record| {
                    let own_fields = record.own_fields.get_or_insert_with(Default::default);
                    own_fields.title |= title_changed;
                    own_fields.description |= description_changed;
                })
                .await;
        }

        Ok(experience)
    }

    /// Rename a definition and/or change its type
    pub async fn update_definition(
        &self,
        experience_id: &str,
        definition_id: &str,
        name: Option<String>,
        data_type: Option<DataType>,
    ) -> EditResult<DataDefinition> {
        let _commit = self.store.commit_lock().lock().await;
        let mut experience = self.experience(experience_id).await?;
        let definition = experience
            .data_definitions
            .iter_mut()
            .find(|d| d.id == definition_id)
            .ok_or_else(|| EditError::DefinitionNotFound(definition_id.to_string()))?;

        let name_changed = name.is_some();
        let type_changed = data_type.is_some();
        if let Some(name) = name {
            definition.name = name;
        }
        if let Some(data_type) = data_type {
            definition.data_type = data_type;
        }
        let definition = definition.clone();
        self.store.write_experience(experience).await;

        if !is_offline_id(experience_id) {
            self.store
                .ledger()
                .modify(experience_id, |record| {
                    let flags = record
                        .definitions
                        .get_or_insert_with(BTreeMap::new)
                        .entry(definition.id.clone())
                        .or_default();
                    flags.name |= name_changed;
                    flags.data_type |= type_changed;
                })
                .await;
        }

        Ok(definition)
    }

    /// Record a new entry, newest first
    pub async fn create_entry(
        &self,
        experience_id: &str,
        values: Vec<(String, DataValue)>,
    ) -> EditResult<Entry> {
        let _commit = self.store.commit_lock().lock().await;
        let experience = self.experience(experience_id).await?;
        for (definition_id, value) in &values {
            let definition = experience
                .definition(definition_id)
                .ok_or_else(|| EditError::DefinitionNotFound(definition_id.clone()))?;
            if definition.data_type != value.data_type() {
                return Err(EditError::TypeMismatch {
                    expected: definition.data_type,
                    actual: value.data_type(),
                });
            }
        }

        let mut connection = self.store.read_entries(experience_id).await.unwrap_or_default();
        let mut index = connection.len();
        let mut entry_id = make_offline_entry_id(experience_id, index);
        while connection.find(&entry_id).is_some() {
            index += 1;
            entry_id = make_offline_entry_id(experience_id, index);
        }

        let data_objects = values
            .into_iter()
            .enumerate()
            .map(|(position, (definition_id, data))| {
                let id = make_offline_data_object_id(&entry_id, position);
                let mut data_object = DataObject::new(id.clone(), definition_id, data);
                data_object.client_id = Some(id);
                data_object
            })
            .collect();

        let mut entry = Entry::new(entry_id.clone(), experience_id).with_data_objects(data_objects);
        entry.client_id = Some(entry_id);
        entry.inserted_at = Some(Utc::now());

        connection.prepend(entry.clone());
        self.store.write_entries(experience_id, connection).await;

        if !is_offline_id(experience_id) {
            self.store
                .ledger()
                .mark_dirty(experience_id, UnsyncedModifiedExperience::new_entries())
                .await;
        }

        Ok(entry)
    }

    /// Change the value of one data object
    pub async fn update_data_object(
        &self,
        experience_id: &str,
        entry_id: &str,
        data_object_id: &str,
        data: DataValue,
    ) -> EditResult<DataObject> {
        let _commit = self.store.commit_lock().lock().await;
        let mut connection = self
            .store
            .read_entries(experience_id)
            .await
            .ok_or_else(|| EditError::ExperienceNotFound(experience_id.to_string()))?;
        let entry = connection
            .find_mut(entry_id)
            .ok_or_else(|| EditError::EntryNotFound(entry_id.to_string()))?;
        let data_object = entry
            .data_objects
            .iter_mut()
            .find(|d| d.id == data_object_id)
            .ok_or_else(|| EditError::DataObjectNotFound(data_object_id.to_string()))?;

        if data_object.data.data_type() != data.data_type() {
            return Err(EditError::TypeMismatch {
                expected: data_object.data.data_type(),
                actual: data.data_type(),
            });
        }
        data_object.data = data;
        let data_object = data_object.clone();
        self.store.write_entries(experience_id, connection).await;

        // offline entries are sent whole on creation
        if !is_offline_id(experience_id) && !is_offline_id(entry_id) {
            self.store
                .ledger()
                .modify(experience_id, |record| {
                    record
                        .modified_entries
                        .get_or_insert_with(BTreeMap::new)
                        .entry(entry_id.to_string())
                        .or_default()
                        .insert(data_object_id.to_string());
                })
                .await;
        }

        Ok(data_object)
    }

    /// Delete an entry. Deleting an entry that is already gone is a no-op.
    pub async fn delete_entry(&self, experience_id: &str, entry_id: &str) -> EditResult<()> {
        let _commit = self.store.commit_lock().lock().await;
        let mut connection = self.store.read_entries(experience_id).await.unwrap_or_default();
        if connection.remove(entry_id).is_some() {
            self.store
                .write_entries(experience_id, connection.clone())
                .await;
        }

        if is_offline_id(experience_id) {
            return Ok(());
        }

        let offline_entries_left = connection.entries().any(|e| is_offline_id(&e.id));
        let entry_is_offline = is_offline_id(entry_id);
        self.store
            .ledger()
            .modify(experience_id, |record| {
                if let Some(modified) = record.modified_entries.as_mut() {
                    modified.remove(entry_id);
                }
                if entry_is_offline {
                    if !offline_entries_left {
                        record.new_entries = false;
                    }
                    return;
                }
                let deleted = record.deleted_entries.get_or_insert_with(Vec::new);
                if !deleted.iter().any(|id| id == entry_id) {
                    deleted.push(entry_id.to_string());
                }
            })
            .await;

        Ok(())
    }
}
