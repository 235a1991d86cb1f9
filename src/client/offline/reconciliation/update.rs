//! # Update Reconciler
//!
//! Merges the server's outcome for one online experience into local state.
//! The parts are applied in a fixed order, since entry identities used by
//! later steps depend on earlier ones:
//!
//! own fields → definitions → entry updates → entry creates → entry
//! deletes → comments → write-back
//!
//! A part whose outcome is `None` was not submitted and is left alone. An
//! empty list is applied and changes nothing.
//!
//! Confirmed values are checked against [`SentUpdate`]. A field whose cached
//! value moved on after the request was built keeps the local value and its
//! ledger flag, so the next cycle sends it again.

use std::collections::BTreeMap;

use super::{carry_local_edits, LedgerWrite, WriteSet};
use crate::client::offline::ids::is_offline_id;
use crate::client::offline::ledger::{DefinitionDirty, OwnFieldsDirty, UnsyncedModifiedExperience};
use crate::client::offline::sync_errors::{SyncError, UpdateEntrySyncError};
use crate::client::remote::inputs::{CreateEntryInput, UpdateDefinitionInput, UpdateExperienceInput};
use crate::client::remote::outcomes::{
    CommentOutcome, CreateEntryOutcome, DataObjectError, DataObjectOutcome, DefinitionOutcome,
    DeleteEntryOutcome, OwnFieldsOutcome, UpdateEntryOutcome, UpdateExperienceOutcome,
    UpdateExperienceResult,
};
use crate::shared::event::OnlineStatus;
use crate::shared::journal::{Comment, DataValue, Entry, EntryConnection, Experience};

/// What a cycle sent for one online experience
#[derive(Debug, Clone, PartialEq)]
pub struct SentUpdate {
    pub input: UpdateExperienceInput,
    /// Ledger record the input was built from
    pub record: UnsyncedModifiedExperience,
}

impl SentUpdate {
    pub fn new(input: UpdateExperienceInput, record: UnsyncedModifiedExperience) -> Self {
        Self { input, record }
    }

    fn title(&self) -> Option<&String> {
        self.record.own_fields.as_ref().filter(|dirty| dirty.title)?;
        self.input.own_fields.as_ref()?.title.as_ref()
    }

    /// `Some(None)` when a cleared description went out
    fn description(&self) -> Option<&Option<String>> {
        self.record
            .own_fields
            .as_ref()
            .filter(|dirty| dirty.description)?;
        self.input.own_fields.as_ref().map(|own| &own.description)
    }

    fn definition(&self, definition_id: &str) -> Option<&UpdateDefinitionInput> {
        self.input
            .update_definitions
            .as_ref()?
            .iter()
            .find(|definition| definition.id == definition_id)
    }

    fn data_object(&self, entry_id: &str, data_object_id: &str) -> Option<&DataValue> {
        self.input
            .update_entries
            .as_ref()?
            .iter()
            .find(|entry| entry.entry_id == entry_id)?
            .data_objects
            .iter()
            .find(|data_object| data_object.id == data_object_id)
            .map(|data_object| &data_object.data)
    }

    fn added_entry(&self, client_id: &str) -> Option<&CreateEntryInput> {
        self.input
            .add_entries
            .as_ref()?
            .iter()
            .find(|entry| entry.client_id == client_id)
    }
}

/// Whether the server's value may replace the cached one: it went out
/// holding the value still cached, or was neither sent nor edited since
fn settled<T: PartialEq>(sent: Option<&T>, current: &T, dirty: bool) -> bool {
    match sent {
        Some(sent) => sent == current,
        None => !dirty,
    }
}

/// Snapshot of the local state of one online experience
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    pub experience: &'a Experience,
    pub connection: Option<&'a EntryConnection>,
    /// Entries still stored under the offline id the experience was
    /// created under
    pub leftovers: Option<&'a EntryConnection>,
    pub ledger: Option<&'a UnsyncedModifiedExperience>,
    pub previous_error: Option<&'a SyncError>,
    pub sent: &'a SentUpdate,
}

/// Working copies of everything one update outcome may change
struct Merge<'a> {
    sent: &'a SentUpdate,
    experience: Experience,
    connection: Option<EntryConnection>,
    connection_changed: bool,
    leftovers: Option<EntryConnection>,
    leftovers_changed: bool,
    record: UnsyncedModifiedExperience,
    error: SyncError,
    offline_entries: BTreeMap<String, Entry>,
}

/// Merge `outcome` into the state captured by `context`
pub fn reconcile_update(context: UpdateContext<'_>, outcome: &UpdateExperienceOutcome) -> WriteSet {
    let experience_id = context.experience.id.clone();
    let mut write_set = WriteSet::default();

    let result = match outcome {
        UpdateExperienceOutcome::UpdateExperienceSomeSuccess { experience } => experience,
        UpdateExperienceOutcome::UpdateExperienceErrors { errors } => {
            tracing::debug!(%experience_id, error = %errors.error, "experience update rejected");
            let mut error = context.previous_error.cloned().unwrap_or_default();
            error.error = Some(errors.error.clone());
            write_set.sync_errors.insert(experience_id.clone(), Some(error));
            write_set
                .online_status
                .insert(experience_id, OnlineStatus::PartOffline);
            return write_set;
        }
    };

    let mut merge = Merge {
        sent: context.sent,
        experience: context.experience.clone(),
        connection: context.connection.cloned(),
        connection_changed: false,
        leftovers: context.leftovers.cloned(),
        leftovers_changed: false,
        record: context.ledger.cloned().unwrap_or_default(),
        error: context.previous_error.cloned().unwrap_or_default(),
        offline_entries: BTreeMap::new(),
    };
    merge.error.error = None;

    merge.apply(result);
    merge.into_write_set(context, write_set)
}

impl Merge<'_> {
    fn apply(&mut self, result: &UpdateExperienceResult) {
        if let Some(own_fields) = &result.own_fields {
            self.apply_own_fields(own_fields);
        }
        if let Some(definitions) = &result.updated_definitions {
            self.apply_definitions(definitions);
        }
        if let Some(updated) = &result.updated_entries {
            self.apply_entry_updates(updated);
        }
        if let Some(created) = &result.new_entries {
            self.apply_entry_creates(created);
        }
        if let Some(deleted) = &result.deleted_entries {
            self.apply_entry_deletes(deleted);
        }
        if let Some(comments) = &result.comments {
            self.apply_comments(comments);
        }
    }

    fn apply_own_fields(&mut self, outcome: &OwnFieldsOutcome) {
        let sent = self.sent;
        match outcome {
            OwnFieldsOutcome::ExperienceOwnFieldsSuccess { data } => {
                let dirty = self.record.own_fields.clone().unwrap_or_default();
                let title = settled(sent.title(), &self.experience.title, dirty.title);
                let description = settled(
                    sent.description(),
                    &self.experience.description,
                    dirty.description,
                );

                if title {
                    self.experience.title = data.title.clone();
                }
                if description {
                    self.experience.description = data.description.clone();
                }
                self.record.own_fields = Some(OwnFieldsDirty {
                    title: !title,
                    description: !description,
                });
                self.error.own_fields = None;
            }
            OwnFieldsOutcome::UpdateExperienceOwnFieldsErrors { errors } => {
                self.error.own_fields = Some(errors.clone());
            }
        }
    }

    fn apply_definitions(&mut self, outcomes: &[DefinitionOutcome]) {
        let sent = self.sent;
        for outcome in outcomes {
            match outcome {
                DefinitionOutcome::DefinitionSuccess { definition } => {
                    let dirty = self
                        .record
                        .definitions
                        .as_ref()
                        .and_then(|dirty| dirty.get(&definition.id))
                        .cloned()
                        .unwrap_or_default();
                    let sent_definition = sent.definition(&definition.id);
                    let mut pending = DefinitionDirty::default();

                    if let Some(slot) = self
                        .experience
                        .data_definitions
                        .iter_mut()
                        .find(|d| d.id == definition.id)
                    {
                        let mut merged = definition.clone();
                        if !settled(
                            sent_definition.and_then(|d| d.name.as_ref()),
                            &slot.name,
                            dirty.name,
                        ) {
                            merged.name = slot.name.clone();
                            pending.name = true;
                        }
                        if !settled(
                            sent_definition.and_then(|d| d.data_type.as_ref()),
                            &slot.data_type,
                            dirty.data_type,
                        ) {
                            merged.data_type = slot.data_type;
                            pending.data_type = true;
                        }
                        *slot = merged;
                    }

                    if let Some(flags) = self.record.definitions.as_mut() {
                        if pending.is_empty() {
                            flags.remove(&definition.id);
                        } else {
                            flags.insert(definition.id.clone(), pending);
                        }
                    }
                    if let Some(errors) = self.error.definitions.as_mut() {
                        errors.remove(&definition.id);
                    }
                }
                DefinitionOutcome::DefinitionErrors { errors } => {
                    self.error
                        .definitions
                        .get_or_insert_with(BTreeMap::new)
                        .insert(errors.id.clone(), errors.clone());
                }
            }
        }
    }

    fn apply_entry_updates(&mut self, outcomes: &[UpdateEntryOutcome]) {
        let sent = self.sent;
        for outcome in outcomes {
            match outcome {
                UpdateEntryOutcome::UpdateEntrySomeSuccess { entry } => {
                    let entry_id = &entry.entry_id;
                    let mut object_errors: BTreeMap<String, DataObjectError> = match self
                        .error
                        .update_entries
                        .as_ref()
                        .and_then(|errors| errors.get(entry_id))
                    {
                        Some(UpdateEntrySyncError::DataObjects(errors)) => errors.clone(),
                        _ => BTreeMap::new(),
                    };

                    for data_object_outcome in &entry.data_objects {
                        match data_object_outcome {
                            DataObjectOutcome::DataObjectSuccess { data_object } => {
                                let dirty = self
                                    .record
                                    .modified_entries
                                    .as_ref()
                                    .and_then(|entries| entries.get(entry_id))
                                    .is_some_and(|ids| ids.contains(&data_object.id));
                                let sent_value = sent.data_object(entry_id, &data_object.id);

                                let slot = self
                                    .connection
                                    .as_mut()
                                    .and_then(|connection| connection.find_mut(entry_id))
                                    .and_then(|node| {
                                        node.data_objects.iter_mut().find(|d| d.id == data_object.id)
                                    });
                                let settles = match slot {
                                    Some(slot) => {
                                        let settles = settled(sent_value, &slot.data, dirty);
                                        if settles {
                                            *slot = data_object.clone();
                                            self.connection_changed = true;
                                        }
                                        settles
                                    }
                                    None => true,
                                };

                                if settles {
                                    if let Some(dirty) = self
                                        .record
                                        .modified_entries
                                        .as_mut()
                                        .and_then(|entries| entries.get_mut(entry_id))
                                    {
                                        dirty.remove(&data_object.id);
                                    }
                                }
                                object_errors.remove(&data_object.id);
                            }
                            DataObjectOutcome::DataObjectErrors { errors } => match &errors.id {
                                Some(data_object_id) => {
                                    object_errors.insert(data_object_id.clone(), errors.clone());
                                }
                                None => {
                                    tracing::warn!(%entry_id, "data object error without an id")
                                }
                            },
                        }
                    }

                    let update_errors = self.error.update_entries.get_or_insert_with(BTreeMap::new);
                    if object_errors.is_empty() {
                        update_errors.remove(entry_id);
                    } else {
                        update_errors.insert(
                            entry_id.clone(),
                            UpdateEntrySyncError::DataObjects(object_errors),
                        );
                    }
                }
                UpdateEntryOutcome::UpdateEntryErrors { errors } => {
                    self.error
                        .update_entries
                        .get_or_insert_with(BTreeMap::new)
                        .insert(
                            errors.entry_id.clone(),
                            UpdateEntrySyncError::Entry(errors.error.clone()),
                        );
                }
            }
        }
    }

    fn apply_entry_creates(&mut self, outcomes: &[CreateEntryOutcome]) {
        let sent = self.sent;
        let mut failed = false;

        for outcome in outcomes {
            match outcome {
                CreateEntryOutcome::CreateEntrySuccess { entry } => match &entry.client_id {
                    Some(client_id) => {
                        self.settle_created_entry(client_id, entry, sent.added_entry(client_id))
                    }
                    None => {
                        self.connection
                            .get_or_insert_with(EntryConnection::default)
                            .prepend(entry.clone());
                        self.connection_changed = true;
                    }
                },
                CreateEntryOutcome::CreateEntryErrors { errors } => {
                    failed = true;
                    match &errors.meta.client_id {
                        Some(client_id) => {
                            self.error
                                .create_entries
                                .get_or_insert_with(BTreeMap::new)
                                .insert(client_id.clone(), errors.clone());
                        }
                        None => tracing::warn!(
                            experience_id = %self.experience.id,
                            index = errors.meta.index,
                            "rejected entry has no client id; error not recorded"
                        ),
                    }
                }
            }
        }

        // entries created after the request went out are still offline
        if !failed && !self.has_offline_entries() {
            self.record.new_entries = false;
        }
    }

    /// Swap the offline node `client_id` for the server's entry
    fn settle_created_entry(&mut self, client_id: &str, entry: &Entry, sent: Option<&CreateEntryInput>) {
        let in_connection = self
            .connection
            .as_ref()
            .and_then(|connection| connection.find(client_id))
            .cloned();
        let leftover = self
            .leftovers
            .as_mut()
            .and_then(|leftovers| leftovers.remove(client_id));
        if leftover.is_some() {
            self.leftovers_changed = true;
        }
        if let Some(errors) = self.error.create_entries.as_mut() {
            errors.remove(client_id);
        }

        let connection = self.connection.get_or_insert_with(EntryConnection::default);
        let Some(local) = in_connection.or(leftover) else {
            if sent.is_some() {
                // deleted locally while the request was in flight
                let deleted = self.record.deleted_entries.get_or_insert_with(Vec::new);
                if !deleted.contains(&entry.id) {
                    deleted.push(entry.id.clone());
                }
            } else {
                connection.prepend(entry.clone());
                self.connection_changed = true;
                self.offline_entries.insert(client_id.to_string(), entry.clone());
            }
            return;
        };

        let (merged, modified) = carry_local_edits(entry, &local, sent);
        if !connection.replace(client_id, merged.clone()) {
            connection.prepend(merged.clone());
        }
        self.connection_changed = true;
        if !modified.is_empty() {
            self.record
                .modified_entries
                .get_or_insert_with(BTreeMap::new)
                .entry(merged.id.clone())
                .or_default()
                .extend(modified);
        }
        self.offline_entries.insert(client_id.to_string(), merged);
    }

    fn has_offline_entries(&self) -> bool {
        self.connection
            .iter()
            .chain(self.leftovers.iter())
            .flat_map(|connection| connection.entries())
            .any(|entry| is_offline_id(&entry.id))
    }

    fn apply_entry_deletes(&mut self, outcomes: &[DeleteEntryOutcome]) {
        for outcome in outcomes {
            match outcome {
                DeleteEntryOutcome::EntrySuccess { entry } => {
                    if let Some(connection) = self.connection.as_mut() {
                        if connection.remove(&entry.id).is_some() {
                            self.connection_changed = true;
                        }
                    }
                    if let Some(deleted) = self.record.deleted_entries.as_mut() {
                        deleted.retain(|id| id != &entry.id);
                    }
                }
                DeleteEntryOutcome::DeleteEntryErrors { errors } => {
                    // not yet handled: the entry stays pending deletion
                    tracing::warn!(
                        experience_id = %self.experience.id,
                        entry_id = %errors.id,
                        error = %errors.error,
                        "entry deletion failed; failure handling not implemented"
                    );
                }
            }
        }
    }

    fn apply_comments(&mut self, outcomes: &[CommentOutcome]) {
        let mut inserted: Vec<Comment> = Vec::new();
        for outcome in outcomes {
            match outcome {
                CommentOutcome::CommentSuccess { comment } => inserted.push(comment.clone()),
                CommentOutcome::CommentErrors { errors } => {
                    tracing::debug!(experience_id = %self.experience.id, error = %errors.error, "comment insert failed");
                }
            }
        }

        if !inserted.is_empty() {
            inserted.append(&mut self.experience.comments);
            self.experience.comments = inserted;
        }
    }

    fn into_write_set(mut self, context: UpdateContext<'_>, mut write_set: WriteSet) -> WriteSet {
        let experience_id = self.experience.id.clone();

        self.record.normalize();
        let status = if self.record.is_empty() {
            OnlineStatus::Online
        } else {
            OnlineStatus::PartOffline
        };

        if self.connection_changed {
            if let Some(connection) = self.connection {
                write_set.connections.push((experience_id.clone(), connection));
            }
        }
        if self.leftovers_changed {
            if let (Some(offline_id), Some(leftovers)) =
                (context.experience.client_id.clone(), self.leftovers)
            {
                write_set.connections.push((offline_id, leftovers));
            }
        }

        write_set.experiences.push(self.experience);
        write_set
            .ledger
            .push(LedgerWrite::Write(experience_id.clone(), self.record));
        write_set
            .sync_errors
            .insert(experience_id.clone(), self.error.into_non_empty());
        if !self.offline_entries.is_empty() {
            write_set
                .experience_id_to_offline_entries
                .insert(experience_id.clone(), self.offline_entries);
        }
        write_set.online_status.insert(experience_id, status);
        write_set
    }
}
