//! # Remote Outcomes
//!
//! What the server answers for each submitted experience. Every outcome kind
//! is a closed sum type tagged by `__typename`, so the reconcilers match
//! success and failure exhaustively instead of comparing strings.
//!
//! Validation failures are data, not errors: they travel inside these types
//! and end up in the sync error store.

use serde::{Deserialize, Serialize};

use crate::shared::journal::{Comment, DataDefinition, DataObject, Entry, Experience};

// ---------------------------------------------------------------------------
// Error payloads
// ---------------------------------------------------------------------------

/// Why the server rejected an experience's own fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnFieldsError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Why the server rejected one definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionError {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Why the server rejected one data object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectError {
    /// Data object id (or client id for data objects of new entries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Locates a rejected entry inside the submitted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryErrorMeta {
    pub experience_id: String,
    /// Position of the entry in the submitted list
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Why the server rejected a new entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryError {
    pub meta: CreateEntryErrorMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_objects: Option<Vec<DataObjectError>>,
}

/// Locates a rejected experience inside the submitted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperienceErrorMeta {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

/// Why the server rejected an offline experience as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperienceError {
    pub meta: CreateExperienceErrorMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_definitions: Option<Vec<DefinitionError>>,
}

// ---------------------------------------------------------------------------
// Create outcomes
// ---------------------------------------------------------------------------

/// Outcome of one submitted offline experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum CreateExperienceOutcome {
    /// The experience was created. `entries` is present when entries were
    /// submitted together with it.
    ExperienceSuccess {
        experience: Experience,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entries: Option<CreateEntriesOutcome>,
    },
    CreateExperienceErrors { errors: CreateExperienceError },
}

/// Per-entry results for entries created together with their experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntriesOutcome {
    pub experience_id: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<CreateEntryError>>,
}

// ---------------------------------------------------------------------------
// Update outcomes
// ---------------------------------------------------------------------------

/// Answer to a whole update batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum UpdateExperiencesOutcome {
    UpdateExperiencesSomeSuccess {
        experiences: Vec<UpdateExperienceOutcome>,
    },
    /// The batch was refused before any experience was looked at
    UpdateExperiencesAllFail { error: String },
}

/// Outcome of one submitted online experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum UpdateExperienceOutcome {
    UpdateExperienceSomeSuccess { experience: UpdateExperienceResult },
    UpdateExperienceErrors { errors: UpdateExperienceError },
}

impl UpdateExperienceOutcome {
    pub fn experience_id(&self) -> &str {
        match self {
            Self::UpdateExperienceSomeSuccess { experience } => &experience.experience_id,
            Self::UpdateExperienceErrors { errors } => &errors.experience_id,
        }
    }
}

/// The whole update of one experience was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperienceError {
    pub experience_id: String,
    pub error: String,
}

/// Per-part results of one accepted experience update. `None` means the
/// part was not submitted, not that it had no effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperienceResult {
    pub experience_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_fields: Option<OwnFieldsOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_definitions: Option<Vec<DefinitionOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_entries: Option<Vec<CreateEntryOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_entries: Option<Vec<UpdateEntryOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_entries: Option<Vec<DeleteEntryOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentOutcome>>,
}

impl UpdateExperienceResult {
    /// Result with every part absent
    pub fn new(experience_id: impl Into<String>) -> Self {
        Self {
            experience_id: experience_id.into(),
            own_fields: None,
            updated_definitions: None,
            new_entries: None,
            updated_entries: None,
            deleted_entries: None,
            comments: None,
        }
    }
}

/// Title and description as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnFieldsData {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum OwnFieldsOutcome {
    ExperienceOwnFieldsSuccess { data: OwnFieldsData },
    UpdateExperienceOwnFieldsErrors { errors: OwnFieldsError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum DefinitionOutcome {
    DefinitionSuccess { definition: DataDefinition },
    DefinitionErrors { errors: DefinitionError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum CreateEntryOutcome {
    /// `entry.client_id` is set when the entry was created offline
    CreateEntrySuccess { entry: Entry },
    CreateEntryErrors { errors: CreateEntryError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum UpdateEntryOutcome {
    UpdateEntrySomeSuccess { entry: UpdateEntrySuccess },
    UpdateEntryErrors { errors: UpdateEntryError },
}

/// Per-data-object results of one accepted entry update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntrySuccess {
    pub entry_id: String,
    #[serde(default)]
    pub data_objects: Vec<DataObjectOutcome>,
}

/// The whole update of one entry was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryError {
    pub entry_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum DataObjectOutcome {
    DataObjectSuccess { data_object: DataObject },
    DataObjectErrors { errors: DataObjectError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum DeleteEntryOutcome {
    EntrySuccess { entry: Entry },
    DeleteEntryErrors { errors: DeleteEntryError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEntryError {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__typename", rename_all_fields = "camelCase")]
pub enum CommentOutcome {
    CommentSuccess { comment: Comment },
    CommentErrors { errors: CommentError },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentError {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Combined exchange
// ---------------------------------------------------------------------------

/// Answer to a combined create + update request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_experiences: Option<Vec<CreateExperienceOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_experiences: Option<UpdateExperiencesOutcome>,
}
