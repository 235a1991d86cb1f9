//! Entry Data Structure
//!
//! An entry is one recorded instance of an experience's schema. Each of its
//! data objects holds a value for one of the experience's definitions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::experience::DataType;

/// One instance of an experience's schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    /// Set when the entry was created offline. Equal to `id` while unsynced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub experience_id: String,
    #[serde(default)]
    pub data_objects: Vec<DataObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(id: impl Into<String>, experience_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            experience_id: experience_id.into(),
            data_objects: Vec::new(),
            inserted_at: None,
        }
    }

    pub fn with_data_objects(mut self, data_objects: Vec<DataObject>) -> Self {
        self.data_objects = data_objects;
        self
    }

    pub fn data_object(&self, data_object_id: &str) -> Option<&DataObject> {
        self.data_objects.iter().find(|d| d.id == data_object_id)
    }
}

/// A typed value stored under one definition of an entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataObject {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub definition_id: String,
    pub data: DataValue,
}

impl DataObject {
    pub fn new(id: impl Into<String>, definition_id: impl Into<String>, data: DataValue) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            definition_id: definition_id.into(),
            data,
        }
    }
}

/// Tagged scalar, one variant per [`DataType`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DataValue {
    SingleLineText(String),
    MultiLineText(String),
    Date(NaiveDate),
    Datetime(DateTime<Utc>),
    Integer(i64),
    Decimal(f64),
}

impl DataValue {
    /// The definition type this value is legal under
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::SingleLineText(_) => DataType::SingleLineText,
            DataValue::MultiLineText(_) => DataType::MultiLineText,
            DataValue::Date(_) => DataType::Date,
            DataValue::Datetime(_) => DataType::Datetime,
            DataValue::Integer(_) => DataType::Integer,
            DataValue::Decimal(_) => DataType::Decimal,
        }
    }
}
