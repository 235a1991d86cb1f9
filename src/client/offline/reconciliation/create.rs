//! # Create Reconciler
//!
//! Merges the server's outcomes for experiences created offline. An
//! accepted experience replaces its offline placeholder in the experience
//! list, and its entries are split:
//!
//! - accepted entries move to the new online id, replacing their
//!   placeholders in order
//! - rejected or unanswered entries stay under the offline id, with their
//!   data objects pointed at the server-issued definition ids so they can be
//!   resubmitted against the new schema
//!
//! Leftover entries flag `newEntries` on the online id so the next cycle
//! retries them as an ordinary update. Which entries went out is read from
//! [`SentCreate`], never from the response: an experience answered without
//! entry outcomes leaves every submitted entry behind.
//!
//! Edits made after the batch was built survive the merge. A title,
//! definition or data value that moved on is kept and flagged dirty on the
//! online id; an entry added in flight stays offline; an entry deleted in
//! flight is queued for deletion on the server.

use std::collections::BTreeMap;

use super::{carry_local_edits, LedgerWrite, WriteSet};
use crate::client::offline::ledger::{DefinitionDirty, OwnFieldsDirty, UnsyncedModifiedExperience};
use crate::client::offline::sync_errors::SyncError;
use crate::client::remote::inputs::{CreateEntryInput, CreateExperienceInput};
use crate::client::remote::outcomes::{CreateEntriesOutcome, CreateEntryError, CreateExperienceOutcome};
use crate::shared::event::OnlineStatus;
use crate::shared::journal::{Entry, EntryConnection, Experience};

/// What a cycle sent to create offline experiences, in submission order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentCreate {
    pub inputs: Vec<CreateExperienceInput>,
}

impl SentCreate {
    pub fn new(inputs: Vec<CreateExperienceInput>) -> Self {
        Self { inputs }
    }

    fn offline_id(&self, index: usize) -> Option<&String> {
        self.inputs.get(index).map(|input| &input.client_id)
    }

    fn input(&self, offline_id: &str) -> Option<&CreateExperienceInput> {
        self.inputs.iter().find(|input| input.client_id == offline_id)
    }
}

/// Snapshot of the offline experiences a create batch was built from
#[derive(Debug, Clone, Copy)]
pub struct CreateContext<'a> {
    /// Cached offline experiences, keyed by offline id
    pub experiences: &'a BTreeMap<String, Experience>,
    /// Their connections, keyed by offline id
    pub connections: &'a BTreeMap<String, EntryConnection>,
    pub sent: &'a SentCreate,
}

/// Merge a create batch's outcomes. Returns `None` when the batch changed
/// nothing at all.
pub fn reconcile_creates(
    context: CreateContext<'_>,
    outcomes: &[CreateExperienceOutcome],
) -> Option<WriteSet> {
    let mut write_set = WriteSet::default();

    for (index, outcome) in outcomes.iter().enumerate() {
        match outcome {
            CreateExperienceOutcome::ExperienceSuccess { experience, entries } => {
                let offline_id = experience
                    .client_id
                    .as_ref()
                    .or_else(|| context.sent.offline_id(index));

                match offline_id.filter(|id| context.experiences.contains_key(id.as_str())) {
                    Some(offline_id) => reconcile_success(
                        context,
                        offline_id,
                        experience,
                        entries.as_ref(),
                        &mut write_set,
                    ),
                    None => {
                        // never existed offline
                        write_set
                            .upserts
                            .push((experience.id.clone(), experience.clone()));
                        write_set
                            .online_status
                            .insert(experience.id.clone(), OnlineStatus::Online);
                    }
                }
            }
            CreateExperienceOutcome::CreateExperienceErrors { errors } => {
                let offline_id = errors
                    .meta
                    .client_id
                    .clone()
                    .or_else(|| context.sent.offline_id(errors.meta.index).cloned());

                let Some(offline_id) = offline_id else {
                    tracing::warn!(index = errors.meta.index, "create error for unknown experience");
                    continue;
                };

                tracing::debug!(%offline_id, "offline experience rejected");
                let error = SyncError {
                    create_experience: Some(errors.clone()),
                    ..Default::default()
                };
                write_set.sync_errors.insert(offline_id.clone(), Some(error));
                write_set
                    .online_status
                    .insert(offline_id, OnlineStatus::Offline);
            }
        }
    }

    if write_set.upserts.is_empty() && write_set.sync_errors.is_empty() {
        None
    } else {
        Some(write_set)
    }
}

fn reconcile_success(
    context: CreateContext<'_>,
    offline_id: &str,
    experience: &Experience,
    entries: Option<&CreateEntriesOutcome>,
    write_set: &mut WriteSet,
) {
    let online_id = experience.id.clone();
    tracing::debug!(%offline_id, %online_id, "offline experience created");

    let sent = context.sent.input(offline_id);
    let mut record = UnsyncedModifiedExperience::default();
    let online = match context.experiences.get(offline_id) {
        Some(local) => carry_experience_edits(experience, local, sent, &mut record),
        None => experience.clone(),
    };

    write_set
        .offline_id_to_online_experience
        .insert(offline_id.to_string(), online.clone());
    write_set.upserts.push((offline_id.to_string(), online));
    write_set.ledger.push(LedgerWrite::Clear(offline_id.to_string()));
    write_set.sync_errors.insert(offline_id.to_string(), None);

    let submitted: &[CreateEntryInput] = sent
        .and_then(|input| input.entries.as_deref())
        .unwrap_or_default();
    let offline_connection = context
        .connections
        .get(offline_id)
        .filter(|connection| !connection.is_empty());
    let server_list: &[Entry] = entries
        .map(|outcome| outcome.entries.as_slice())
        .unwrap_or_default();

    if entries.is_none() && !submitted.is_empty() {
        tracing::warn!(
            %offline_id,
            submitted = submitted.len(),
            "created experience came back without entry outcomes; entries kept for retry"
        );
    }

    if offline_connection.is_some() || !server_list.is_empty() {
        let errors = entries
            .map(|outcome| errors_by_client_id(outcome, submitted))
            .unwrap_or_default();
        let split = split_entries(
            offline_connection,
            server_list,
            submitted,
            &errors,
            experience,
            &mut record,
        );

        record.new_entries = !split.leftovers.is_empty();
        write_set.connections.push((
            offline_id.to_string(),
            EntryConnection::from_entries(split.leftovers),
        ));
        write_set.connections.push((
            online_id.clone(),
            EntryConnection::from_entries(split.accepted),
        ));
        if !errors.is_empty() {
            let error = SyncError {
                create_entries: Some(errors),
                ..Default::default()
            };
            write_set.sync_errors.insert(online_id.clone(), Some(error));
        }
        if !split.remapped.is_empty() {
            write_set
                .experience_id_to_offline_entries
                .insert(online_id.clone(), split.remapped);
        }
    }

    record.normalize();
    let status = if record.is_empty() {
        OnlineStatus::Online
    } else {
        write_set
            .ledger
            .push(LedgerWrite::MarkDirty(online_id.clone(), record));
        OnlineStatus::PartOffline
    };
    write_set.online_status.insert(online_id, status);
}

/// Entries of one created experience sorted by where they now belong
#[derive(Debug, Default)]
struct EntrySplit {
    /// Server copies for the online connection, in local order
    accepted: Vec<Entry>,
    /// Offline entries that stay under the offline id
    leftovers: Vec<Entry>,
    /// Offline entry id to its server copy
    remapped: BTreeMap<String, Entry>,
}

fn split_entries(
    offline_connection: Option<&EntryConnection>,
    server_list: &[Entry],
    submitted: &[CreateEntryInput],
    errors: &BTreeMap<String, CreateEntryError>,
    experience: &Experience,
    record: &mut UnsyncedModifiedExperience,
) -> EntrySplit {
    let server_entries: BTreeMap<&str, &Entry> = server_list
        .iter()
        .filter_map(|entry| entry.client_id.as_deref().map(|client_id| (client_id, entry)))
        .collect();
    let definition_ids: BTreeMap<&str, &str> = experience
        .data_definitions
        .iter()
        .filter_map(|d| d.client_id.as_deref().map(|client_id| (client_id, d.id.as_str())))
        .collect();
    let sent_entry = |client_id: &str| submitted.iter().find(|entry| entry.client_id == client_id);

    let mut split = EntrySplit::default();
    for node in offline_connection.into_iter().flat_map(|connection| connection.entries()) {
        match server_entries.get(node.id.as_str()) {
            Some(server_entry) if !errors.contains_key(&node.id) => {
                let (merged, modified) = carry_local_edits(server_entry, node, sent_entry(&node.id));
                if !modified.is_empty() {
                    record
                        .modified_entries
                        .get_or_insert_with(BTreeMap::new)
                        .entry(merged.id.clone())
                        .or_default()
                        .extend(modified);
                }
                split.remapped.insert(node.id.clone(), merged.clone());
                split.accepted.push(merged);
            }
            _ => split.leftovers.push(remap_definitions(node, &definition_ids)),
        }
    }

    let is_local = |client_id: &str| {
        offline_connection.is_some_and(|connection| connection.find(client_id).is_some())
    };
    for server_entry in server_list {
        match server_entry.client_id.as_deref() {
            Some(client_id) if is_local(client_id) => {}
            Some(client_id) if sent_entry(client_id).is_some() => {
                // deleted locally while the batch was in flight
                record
                    .deleted_entries
                    .get_or_insert_with(Vec::new)
                    .push(server_entry.id.clone());
            }
            _ => split.accepted.push(server_entry.clone()),
        }
    }
    split
}

/// The server's copy of a created experience, keeping own fields and
/// definitions edited after the batch went out. Kept fields are flagged in
/// `record` under their server ids.
fn carry_experience_edits(
    server: &Experience,
    local: &Experience,
    sent: Option<&CreateExperienceInput>,
    record: &mut UnsyncedModifiedExperience,
) -> Experience {
    let mut merged = server.clone();
    let Some(sent) = sent else {
        return merged;
    };

    let mut own_fields = OwnFieldsDirty::default();
    if local.title != sent.title {
        merged.title = local.title.clone();
        own_fields.title = true;
    }
    if local.description != sent.description {
        merged.description = local.description.clone();
        own_fields.description = true;
    }
    if !own_fields.is_empty() {
        record.own_fields = Some(own_fields);
    }

    for definition in &mut merged.data_definitions {
        let Some(client_id) = definition.client_id.as_deref() else {
            continue;
        };
        let sent_definition = sent.data_definitions.iter().find(|d| d.client_id == client_id);
        let (Some(sent_definition), Some(local_definition)) =
            (sent_definition, local.definition(client_id))
        else {
            continue;
        };

        let mut dirty = DefinitionDirty::default();
        if local_definition.name != sent_definition.name {
            definition.name = local_definition.name.clone();
            dirty.name = true;
        }
        if local_definition.data_type != sent_definition.data_type {
            definition.data_type = local_definition.data_type;
            dirty.data_type = true;
        }
        if !dirty.is_empty() {
            record
                .definitions
                .get_or_insert_with(BTreeMap::new)
                .insert(definition.id.clone(), dirty);
        }
    }
    merged
}

/// Entry errors keyed by the rejected entry's client id, falling back to
/// its position among the submitted entries
fn errors_by_client_id(
    outcome: &CreateEntriesOutcome,
    submitted: &[CreateEntryInput],
) -> BTreeMap<String, CreateEntryError> {
    outcome
        .errors
        .iter()
        .flatten()
        .filter_map(|error| {
            let client_id = error
                .meta
                .client_id
                .clone()
                .or_else(|| submitted.get(error.meta.index).map(|e| e.client_id.clone()))?;
            Some((client_id, error.clone()))
        })
        .collect()
}

fn remap_definitions(entry: &Entry, definition_ids: &BTreeMap<&str, &str>) -> Entry {
    let mut entry = entry.clone();
    for data_object in &mut entry.data_objects {
        if let Some(server_id) = definition_ids.get(data_object.definition_id.as_str()) {
            data_object.definition_id = server_id.to_string();
        }
    }
    entry
}
