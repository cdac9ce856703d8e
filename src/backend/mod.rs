//! Remote services the view depends on.
//!
//! Each service is a port (an async trait) so the controller can run against
//! the HTTP backend in production and the in-memory backend in tests. Every
//! call receives the cancellation token of the load it belongs to; a
//! cancelled call resolves to [`ViewError::Superseded`].

mod http;
#[cfg(any(test, feature = "test-util"))]
mod memory;

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{Result, ViewError};

pub use http::HttpBackend;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{Failure, Gate, MemoryBackend, Operation};

/// Raw account record, as returned by either the identity service (`id`) or
/// the profile service (`user_id`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IdentityRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub github_avatar_url: Option<String>,
    #[serde(default)]
    pub github_profile_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PersonalRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalRecord {
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub co_founder_summary: Option<String>,
    #[serde(default)]
    pub key_strengths: Vec<String>,
    #[serde(default)]
    pub potential_roles: Vec<String>,
    #[serde(default)]
    pub language_stats: BTreeMap<String, f64>,
    #[serde(default)]
    pub project_insights: Vec<ProjectInsightRecord>,
    #[serde(default)]
    pub identified_technologies: Vec<String>,
    #[serde(default)]
    pub architectural_concepts: Vec<String>,
    #[serde(default)]
    pub estimated_experience: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectInsightRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub highlight: String,
}

/// Profile authored by the subject. Both halves are optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub personal: Option<PersonalRecord>,
    #[serde(default)]
    pub technical: Option<TechnicalRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SubjectProfile {
    #[serde(default)]
    pub user: Option<IdentityRecord>,
    #[serde(default)]
    pub profile: Option<ProfileRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ViewerIdentity {
    #[serde(default)]
    pub user: Option<IdentityRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RequestAck {
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// Public profile of the subject. Fails with `NotFound` or `Transport`.
    async fn fetch_subject_profile(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SubjectProfile>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Identity of the signed-in viewer. Fails with `Unauthenticated` or
    /// `Transport`.
    async fn fetch_viewer_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ViewerIdentity>;
}

#[async_trait]
pub trait ConnectionService: Send + Sync {
    async fn fetch_connection_status(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusRecord>;

    /// Fails with `Conflict` when a connection or request already exists.
    async fn send_connection_request(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestAck>;
}

/// Race `fut` against `cancel`.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ViewError::Superseded),
        result = fut => result,
    }
}
