//! # Remote Inputs
//!
//! Request payloads for the create and update batches.

use serde::{Deserialize, Serialize};

use crate::shared::journal::{DataType, DataValue};

/// A whole offline experience, submitted for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExperienceInput {
    /// The offline id, echoed back as the created experience's `clientId`
    pub client_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_definitions: Vec<CreateDefinitionInput>,
    /// Every entry in the local connection, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<CreateEntryInput>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDefinitionInput {
    pub client_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// A new entry. `experience_id` may be an offline id when the entry is
/// submitted together with its experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryInput {
    pub client_id: String,
    pub experience_id: String,
    pub data_objects: Vec<CreateDataObjectInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDataObjectInput {
    pub client_id: String,
    pub definition_id: String,
    pub data: DataValue,
}

/// The dirty parts of an online experience. Absent parts are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExperienceInput {
    pub experience_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_fields: Option<OwnFieldsInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_definitions: Option<Vec<UpdateDefinitionInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_entries: Option<Vec<CreateEntryInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_entries: Option<Vec<UpdateEntryInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_entries: Option<Vec<String>>,
}

impl UpdateExperienceInput {
    pub fn new(experience_id: impl Into<String>) -> Self {
        Self {
            experience_id: experience_id.into(),
            ..Default::default()
        }
    }

    /// True when no part would change anything on the server
    pub fn is_empty(&self) -> bool {
        self.own_fields.is_none()
            && self.update_definitions.is_none()
            && self.add_entries.is_none()
            && self.update_entries.is_none()
            && self.delete_entries.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnFieldsInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDefinitionInput {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEntryInput {
    pub entry_id: String,
    pub data_objects: Vec<UpdateDataObjectInput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataObjectInput {
    pub id: String,
    pub data: DataValue,
}

/// Body of the combined exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create_experiences: Vec<CreateExperienceInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_experiences: Vec<UpdateExperienceInput>,
}
