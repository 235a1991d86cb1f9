//! Shared Error Types
//!
//! This module defines the error types of the sync engine's I/O layers.
//! Server-side *validation* failures are never errors here: they are data,
//! carried by the remote outcome types and folded into the sync error store.
//!
//! # Error Categories
//!
//! - `StoreError` - Local cache persistence failures
//! - `RemoteError` - Transport failures talking to the remote API
//! - `EditError` - Local edits referring to missing records
//! - `EngineError` - Umbrella type for application code
//!
//! # Usage
//!
//! ```rust
//! use journal_sync::shared::error::RemoteError;
//!
//! let error = RemoteError::api(503, "service unavailable");
//! assert_eq!(error.status_code(), Some(503));
//! ```
use thiserror::Error;

use crate::shared::config::ConfigError;
use crate::shared::journal::DataType;

/// Errors raised while reading or persisting the local cache
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization or deserialization of a cached value failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport errors talking to the remote API
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed response body
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success status from the API
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },

    /// Response did not contain the part of the exchange that was sent
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl RemoteError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// HTTP status if this is an API error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A local edit referred to something the cache does not hold
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Experience not found: {0}")]
    ExperienceNotFound(String),

    #[error("Definition not found: {0}")]
    DefinitionNotFound(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Data object not found: {0}")]
    DataObjectNotFound(String),

    /// Value variant does not match the definition's type
    #[error("Expected a {expected:?} value, got {actual:?}")]
    TypeMismatch { expected: DataType, actual: DataType },
}

/// Umbrella error for code wiring the engine together
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
