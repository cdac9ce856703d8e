//! In-memory stand-in for the three remote services.
//!
//! Fixtures are plain records; failures are scripted per operation. Gates
//! hold a call until the test opens them, which is how overlapping loads are
//! put in a chosen order.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::{
    cancellable, ConnectionService, IdentityRecord, IdentityService,
    ProfileRecord, ProfileService, RequestAck, StatusRecord, SubjectProfile,
    ViewerIdentity,
};
use crate::{Result, ViewError};

const GATE_PERMITS: usize = 1 << 16;

/// Scripted failure of one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Unauthenticated,
    Conflict,
    Transport,
    Timeout,
}

impl Failure {
    fn into_error(self) -> ViewError {
        match self {
            Failure::NotFound => ViewError::NotFound,
            Failure::Unauthenticated => ViewError::Unauthenticated,
            Failure::Conflict => {
                ViewError::Conflict("request already exists".to_owned())
            }
            Failure::Transport => {
                ViewError::Transport("connection refused".to_owned())
            }
            Failure::Timeout => {
                ViewError::Transport("operation timed out".to_owned())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SubjectProfile,
    ViewerIdentity,
    ConnectionStatus,
    ConnectionRequest,
}

/// Lets held calls through once opened.
#[derive(Clone)]
pub struct Gate {
    semaphore: Arc<Semaphore>,
}

impl Gate {
    pub fn open(&self) {
        self.semaphore.add_permits(GATE_PERMITS);
    }
}

#[derive(Default)]
struct Fixtures {
    viewer: Option<IdentityRecord>,
    viewer_failure: Option<Failure>,
    subjects: HashMap<String, SubjectProfile>,
    profile_failures: HashMap<String, Failure>,
    statuses: HashMap<String, Option<String>>,
    status_failure: Option<Failure>,
    request_failure: Option<Failure>,
    ack_message: Option<String>,
}

#[derive(Default)]
pub struct MemoryBackend {
    fixtures: RwLock<Fixtures>,
    gates: Mutex<HashMap<(Operation, String), Gate>>,
    calls: Mutex<Vec<(Operation, String)>>,
    ignore_cancellation: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signed-in viewer, as the identity service reports it (`id` field).
    pub fn set_viewer<I: Into<Value>>(&self, id: I, username: &str) {
        self.write().viewer = Some(account(Some(id.into()), None, username));
    }

    /// Subject account (`user_id` field) with an optional authored profile.
    pub fn add_subject<I: Into<Value>>(
        &self,
        id: I,
        username: &str,
        profile: Option<ProfileRecord>,
    ) {
        let id = id.into();
        let key = key_of(&id);
        self.write().subjects.insert(
            key,
            SubjectProfile {
                user: Some(account(None, Some(id), username)),
                profile,
            },
        );
    }

    /// Register a raw subject response under `subject_id` verbatim.
    pub fn set_subject_response(&self, subject_id: &str, response: SubjectProfile) {
        self.write()
            .subjects
            .insert(subject_id.to_owned(), response);
    }

    pub fn set_status(&self, subject_id: &str, status: Option<&str>) {
        self.write()
            .statuses
            .insert(subject_id.to_owned(), status.map(str::to_owned));
    }

    pub fn set_ack_message(&self, message: &str) {
        self.write().ack_message = Some(message.to_owned());
    }

    pub fn fail_viewer(&self, failure: Failure) {
        self.write().viewer_failure = Some(failure);
    }

    pub fn fail_profile(&self, subject_id: &str, failure: Failure) {
        self.write()
            .profile_failures
            .insert(subject_id.to_owned(), failure);
    }

    pub fn fail_status(&self, failure: Failure) {
        self.write().status_failure = Some(failure);
    }

    pub fn fail_request(&self, failure: Failure) {
        self.write().request_failure = Some(failure);
    }

    /// Behave like a transport that cannot abort: calls run to completion
    /// even after their token is cancelled.
    pub fn ignore_cancellation(&self, ignore: bool) {
        self.ignore_cancellation.store(ignore, Ordering::Release);
    }

    /// Hold calls of `operation` for `key` (the subject id, or `""` for the
    /// viewer identity) until the returned gate is opened.
    pub fn hold(&self, operation: Operation, key: &str) -> Gate {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((operation, key.to_owned()))
            .or_insert_with(|| Gate {
                semaphore: Arc::new(Semaphore::new(0)),
            })
            .clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    pub fn calls_for(&self, operation: Operation, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(op, k)| *op == operation && k == key)
            .count()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Fixtures> {
        self.fixtures.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Fixtures> {
        self.fixtures.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call<T, F>(
        &self,
        operation: Operation,
        key: &str,
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((operation, key.to_owned()));

        let work = async {
            self.pass_gate(operation, key).await?;
            body(self)
        };
        self.guard(cancel, work).await
    }

    async fn guard<T, F>(&self, cancel: &CancellationToken, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.ignore_cancellation.load(Ordering::Acquire) {
            work.await
        } else {
            cancellable(cancel, work).await
        }
    }

    async fn pass_gate(&self, operation: Operation, key: &str) -> Result<()> {
        let gate = self
            .gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(operation, key.to_owned()))
            .cloned();
        if let Some(gate) = gate {
            gate.semaphore
                .acquire()
                .await
                .map_err(|e| ViewError::Transport(e.to_string()))?;
        }
        Ok(())
    }
}

fn account(
    id: Option<Value>,
    user_id: Option<Value>,
    username: &str,
) -> IdentityRecord {
    IdentityRecord {
        id,
        user_id,
        github_username: Some(username.to_owned()),
        github_avatar_url: Some(format!(
            "https://avatars.githubusercontent.com/{}",
            username
        )),
        github_profile_url: Some(format!("https://github.com/{}", username)),
    }
}

fn key_of(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl ProfileService for MemoryBackend {
    async fn fetch_subject_profile(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SubjectProfile> {
        self.call(Operation::SubjectProfile, subject_id, cancel, |this| {
            let fixtures = this.read();
            if let Some(failure) = fixtures.profile_failures.get(subject_id) {
                return Err(failure.into_error());
            }
            fixtures
                .subjects
                .get(subject_id)
                .cloned()
                .ok_or(ViewError::NotFound)
        })
        .await
    }
}

#[async_trait]
impl IdentityService for MemoryBackend {
    async fn fetch_viewer_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ViewerIdentity> {
        self.call(Operation::ViewerIdentity, "", cancel, |this| {
            let fixtures = this.read();
            if let Some(failure) = fixtures.viewer_failure {
                return Err(failure.into_error());
            }
            match &fixtures.viewer {
                Some(user) => Ok(ViewerIdentity {
                    user: Some(user.clone()),
                }),
                None => Err(ViewError::Unauthenticated),
            }
        })
        .await
    }
}

#[async_trait]
impl ConnectionService for MemoryBackend {
    async fn fetch_connection_status(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusRecord> {
        self.call(Operation::ConnectionStatus, subject_id, cancel, |this| {
            let fixtures = this.read();
            if let Some(failure) = fixtures.status_failure {
                return Err(failure.into_error());
            }
            Ok(StatusRecord {
                status: fixtures.statuses.get(subject_id).cloned().flatten(),
            })
        })
        .await
    }

    async fn send_connection_request(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestAck> {
        self.call(Operation::ConnectionRequest, subject_id, cancel, |this| {
            let mut fixtures = this.write();
            if let Some(failure) = fixtures.request_failure {
                return Err(failure.into_error());
            }
            let existing = fixtures.statuses.get(subject_id).cloned().flatten();
            if matches!(existing.as_deref(), Some("pending" | "accepted")) {
                return Err(Failure::Conflict.into_error());
            }
            fixtures
                .statuses
                .insert(subject_id.to_owned(), Some("pending".to_owned()));
            Ok(RequestAck {
                message: fixtures.ack_message.clone(),
            })
        })
        .await
    }
}
