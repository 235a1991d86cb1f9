//! # Remote API
//!
//! The boundary between the sync engine and the server. The engine only
//! needs two batched operations plus a combined exchange; how they reach the
//! server is up to the implementation.
//!
//! - `inputs.rs`: request payloads
//! - `outcomes.rs`: per-experience results as closed sum types
//! - `http.rs`: JSON-over-HTTP implementation

pub mod http;
pub mod inputs;
pub mod outcomes;

pub use http::HttpRemoteApi;
pub use inputs::{CreateExperienceInput, UpdateExperienceInput};
pub use outcomes::{CreateExperienceOutcome, SyncResponse, UpdateExperiencesOutcome};

use async_trait::async_trait;

use crate::shared::error::RemoteError;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Batched operations of the remote API
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Create experiences that so far only exist offline
    async fn create_experiences(
        &self,
        input: Vec<CreateExperienceInput>,
    ) -> RemoteResult<Vec<CreateExperienceOutcome>>;

    /// Push the dirty parts of online experiences
    async fn update_experiences(
        &self,
        input: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<UpdateExperiencesOutcome>;

    /// Both batches in one network exchange
    async fn sync(
        &self,
        create: Vec<CreateExperienceInput>,
        update: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<SyncResponse>;
}
