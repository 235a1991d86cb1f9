//! # Request Builders
//!
//! Turns cached experiences plus their ledger records into the create and
//! update payloads of one sync cycle. Offline experiences are sent whole;
//! online experiences send only what the ledger flags as dirty.

use std::collections::BTreeSet;

use crate::client::offline::ids::is_offline_id;
use crate::client::offline::ledger::UnsyncedModifiedExperience;
use crate::client::remote::inputs::{
    CreateDataObjectInput, CreateDefinitionInput, CreateEntryInput, CreateExperienceInput,
    OwnFieldsInput, UpdateDataObjectInput, UpdateDefinitionInput, UpdateEntryInput,
    UpdateExperienceInput,
};
use crate::shared::journal::{Entry, EntryConnection, Experience};

/// The whole offline experience with every definition and entry
pub fn build_create_input(
    experience: &Experience,
    connection: Option<&EntryConnection>,
) -> CreateExperienceInput {
    let data_definitions = experience
        .data_definitions
        .iter()
        .map(|definition| CreateDefinitionInput {
            client_id: definition
                .client_id
                .clone()
                .unwrap_or_else(|| definition.id.clone()),
            name: definition.name.clone(),
            data_type: definition.data_type,
        })
        .collect();

    let entries: Vec<CreateEntryInput> = connection
        .map(|connection| {
            connection
                .entries()
                .map(|entry| create_entry_input(&experience.id, entry))
                .collect()
        })
        .unwrap_or_default();

    CreateExperienceInput {
        client_id: experience.client_id.clone().unwrap_or_else(|| experience.id.clone()),
        title: experience.title.clone(),
        description: experience.description.clone(),
        data_definitions,
        entries: if entries.is_empty() { None } else { Some(entries) },
    }
}

fn create_entry_input(experience_id: &str, entry: &Entry) -> CreateEntryInput {
    CreateEntryInput {
        client_id: entry.client_id.clone().unwrap_or_else(|| entry.id.clone()),
        experience_id: experience_id.to_string(),
        data_objects: entry
            .data_objects
            .iter()
            .map(|data_object| CreateDataObjectInput {
                client_id: data_object
                    .client_id
                    .clone()
                    .unwrap_or_else(|| data_object.id.clone()),
                definition_id: data_object.definition_id.clone(),
                data: data_object.data.clone(),
            })
            .collect(),
    }
}

/// The dirty parts of an online experience, or `None` when nothing that
/// the ledger flags can still be found in the cache
///
/// `leftovers` holds entries kept under the experience's old offline id
/// after the server rejected them at creation.
pub fn build_update_input(
    experience: &Experience,
    connection: Option<&EntryConnection>,
    leftovers: Option<&EntryConnection>,
    record: &UnsyncedModifiedExperience,
) -> Option<UpdateExperienceInput> {
    let mut input = UpdateExperienceInput::new(experience.id.clone());

    if let Some(own_fields) = &record.own_fields {
        input.own_fields = Some(OwnFieldsInput {
            title: own_fields.title.then(|| experience.title.clone()),
            description: if own_fields.description {
                experience.description.clone()
            } else {
                None
            },
        });
    }

    if let Some(definitions) = &record.definitions {
        let updates: Vec<UpdateDefinitionInput> = definitions
            .iter()
            .filter_map(|(definition_id, flags)| {
                let Some(definition) = experience.definition(definition_id) else {
                    tracing::warn!(experience_id = %experience.id, %definition_id, "dirty definition missing from cache");
                    return None;
                };
                Some(UpdateDefinitionInput {
                    id: definition.id.clone(),
                    name: flags.name.then(|| definition.name.clone()),
                    data_type: flags.data_type.then_some(definition.data_type),
                })
            })
            .collect();
        input.update_definitions = non_empty(updates);
    }

    if record.new_entries {
        let mut seen = BTreeSet::new();
        let entries: Vec<CreateEntryInput> = connection
            .into_iter()
            .chain(leftovers)
            .flat_map(|connection| connection.entries())
            .filter(|entry| is_offline_id(&entry.id) && seen.insert(entry.id.clone()))
            .map(|entry| create_entry_input(&experience.id, entry))
            .collect();
        input.add_entries = non_empty(entries);
    }

    if let (Some(modified), Some(connection)) = (&record.modified_entries, connection) {
        let updates: Vec<UpdateEntryInput> = modified
            .iter()
            .filter_map(|(entry_id, data_object_ids)| {
                let entry = connection.find(entry_id)?;
                let data_objects: Vec<UpdateDataObjectInput> = data_object_ids
                    .iter()
                    .filter_map(|id| entry.data_object(id))
                    .map(|data_object| UpdateDataObjectInput {
                        id: data_object.id.clone(),
                        data: data_object.data.clone(),
                    })
                    .collect();
                if data_objects.is_empty() {
                    None
                } else {
                    Some(UpdateEntryInput {
                        entry_id: entry_id.clone(),
                        data_objects,
                    })
                }
            })
            .collect();
        input.update_entries = non_empty(updates);
    }

    if let Some(deleted) = &record.deleted_entries {
        input.delete_entries = non_empty(deleted.clone());
    }

    if input.is_empty() {
        None
    } else {
        Some(input)
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
