//! Experience Data Structure
//!
//! An experience is the aggregate a user owns: a title, an optional
//! description, the schema its entries follow and a list of comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The top-level journaling aggregate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    /// Server-issued id, or an offline id before the first successful sync
    pub id: String,
    /// Offline id this experience was created under, echoed back by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Experience title
    pub title: String,
    /// Optional free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Schema of the entries recorded under this experience
    #[serde(default)]
    pub data_definitions: Vec<DataDefinition>,
    /// Comments, newest first
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Experience {
    /// Create an experience with no definitions or comments
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            title: title.into(),
            description: None,
            data_definitions: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Look up a definition by id
    pub fn definition(&self, definition_id: &str) -> Option<&DataDefinition> {
        self.data_definitions.iter().find(|d| d.id == definition_id)
    }
}

/// The type a definition constrains its data objects to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    SingleLineText,
    MultiLineText,
    Date,
    Datetime,
    Integer,
    Decimal,
}

/// One typed field of an experience's schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataDefinition {
    pub id: String,
    /// Offline id the definition was created under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl DataDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            name: name.into(),
            data_type,
        }
    }
}

/// A comment attached to an experience
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub inserted_at: DateTime<Utc>,
}
