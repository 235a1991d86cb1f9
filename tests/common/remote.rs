//! Scripted remote API
//!
//! In-process `RemoteApi` that answers with canned outcomes, records what it
//! was sent and counts calls. A held remote blocks each call until the test
//! releases it, which leaves room to edit the store mid-request.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use journal_sync::client::remote::inputs::{CreateExperienceInput, UpdateExperienceInput};
use journal_sync::client::remote::outcomes::{
    CreateExperienceOutcome, SyncResponse, UpdateExperienceOutcome, UpdateExperienceResult,
    UpdateExperiencesOutcome,
};
use journal_sync::client::remote::{RemoteApi, RemoteResult};
use journal_sync::shared::RemoteError;

#[derive(Default)]
pub struct ScriptedRemote {
    create: Mutex<Option<Vec<CreateExperienceOutcome>>>,
    update: Mutex<Option<UpdateExperiencesOutcome>>,
    failure: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    held: AtomicBool,
    called: Notify,
    released: Notify,
    calls: AtomicUsize,
    combined_calls: AtomicUsize,
    sent_creates: Mutex<Vec<CreateExperienceInput>>,
    sent_updates: Mutex<Vec<UpdateExperienceInput>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_creates(self, outcomes: Vec<CreateExperienceOutcome>) -> Self {
        *self.create.lock() = Some(outcomes);
        self
    }

    pub fn answer_updates(self, outcomes: Vec<UpdateExperienceOutcome>) -> Self {
        *self.update.lock() = Some(UpdateExperiencesOutcome::UpdateExperiencesSomeSuccess {
            experiences: outcomes,
        });
        self
    }

    /// Answer one accepted update
    pub fn answer_update(self, result: UpdateExperienceResult) -> Self {
        self.answer_updates(vec![UpdateExperienceOutcome::UpdateExperienceSomeSuccess {
            experience: result,
        }])
    }

    pub fn answer_all_fail(self, error: &str) -> Self {
        *self.update.lock() = Some(UpdateExperiencesOutcome::UpdateExperiencesAllFail {
            error: error.to_string(),
        });
        self
    }

    /// Fail every call with a 503
    pub fn unreachable(self) -> Self {
        *self.failure.lock() = Some("service unavailable".to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    /// Block every call until [`release`](Self::release)
    pub fn held(self) -> Self {
        self.held.store(true, Ordering::SeqCst);
        self
    }

    /// Resolves once a call has reached the remote
    pub async fn wait_until_called(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.called.notified())
            .await
            .expect("remote was never called");
    }

    /// Let one held call answer
    pub fn release(&self) {
        self.released.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn combined_calls(&self) -> usize {
        self.combined_calls.load(Ordering::SeqCst)
    }

    pub fn sent_creates(&self) -> Vec<CreateExperienceInput> {
        self.sent_creates.lock().clone()
    }

    pub fn sent_updates(&self) -> Vec<UpdateExperienceInput> {
        self.sent_updates.lock().clone()
    }

    async fn enter(&self) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_one();
        if self.held.load(Ordering::SeqCst) {
            self.released.notified().await;
        }
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.failure.lock().clone() {
            Some(message) => Err(RemoteError::api(503, message)),
            None => Ok(()),
        }
    }

    fn scripted_creates(&self) -> RemoteResult<Vec<CreateExperienceOutcome>> {
        self.create
            .lock()
            .clone()
            .ok_or_else(|| RemoteError::malformed("no scripted create outcomes"))
    }

    fn scripted_updates(&self) -> RemoteResult<UpdateExperiencesOutcome> {
        self.update
            .lock()
            .clone()
            .ok_or_else(|| RemoteError::malformed("no scripted update outcome"))
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn create_experiences(
        &self,
        input: Vec<CreateExperienceInput>,
    ) -> RemoteResult<Vec<CreateExperienceOutcome>> {
        self.sent_creates.lock().extend(input);
        self.enter().await?;
        self.scripted_creates()
    }

    async fn update_experiences(
        &self,
        input: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<UpdateExperiencesOutcome> {
        self.sent_updates.lock().extend(input);
        self.enter().await?;
        self.scripted_updates()
    }

    async fn sync(
        &self,
        create: Vec<CreateExperienceInput>,
        update: Vec<UpdateExperienceInput>,
    ) -> RemoteResult<SyncResponse> {
        self.combined_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_creates.lock().extend(create);
        self.sent_updates.lock().extend(update);
        self.enter().await?;
        Ok(SyncResponse {
            create_experiences: Some(self.scripted_creates()?),
            update_experiences: Some(self.scripted_updates()?),
        })
    }
}
