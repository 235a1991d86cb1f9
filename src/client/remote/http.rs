/**
 * HTTP Remote API Client
 *
 * Posts the create, update and combined batches as JSON to the journal
 * server, authenticating with a bearer token when one is configured.
 */
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::inputs::{CreateExperienceInput, SyncInput, UpdateExperienceInput};
use super::outcomes::{CreateExperienceOutcome, SyncResponse, UpdateExperiencesOutcome};
use super::{RemoteApi, RemoteResult};
use crate::shared::config::SyncConfig;
use crate::shared::error::RemoteError;

const CREATE_PATH: &str = "/api/experiences/create";
const UPDATE_PATH: &str = "/api/experiences/update";
const SYNC_PATH: &str = "/api/experiences/sync";

/// `RemoteApi` over JSON/HTTP
#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: Client,
    server_url: String,
    token: Option<String>,
}

impl HttpRemoteApi {
    pub fn new(config: &SyncConfig) -> RemoteResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> RemoteResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(RemoteError::api(status.as_u16(), message));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create_experiences(
        &self,
        input: Vec<CreateExperienceInput>,
    ) -> RemoteResult<Vec<CreateExperienceOutcome>> {
        tracing::debug!(count = input.len(), "posting create batch");
        self.post(CREATE_PATH, &input).await
    }

    async fn update_experiences(
        &self,
        input: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<UpdateExperiencesOutcome> {
        tracing::debug!(count = input.len(), "posting update batch");
        self.post(UPDATE_PATH, &input).await
    }

    async fn sync(
        &self,
        create: Vec<CreateExperienceInput>,
        update: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<SyncResponse> {
        let expects_create = !create.is_empty();
        let expects_update = !update.is_empty();
        let body = SyncInput {
            create_experiences: create,
            update_experiences: update,
        };

        tracing::debug!(
            create = body.create_experiences.len(),
            update = body.update_experiences.len(),
            "posting combined sync"
        );
        let response: SyncResponse = self.post(SYNC_PATH, &body).await?;

        if expects_create && response.create_experiences.is_none() {
            return Err(RemoteError::malformed("combined response is missing createExperiences"));
        }
        if expects_update && response.update_experiences.is_none() {
            return Err(RemoteError::malformed("combined response is missing updateExperiences"));
        }
        Ok(response)
    }
}
