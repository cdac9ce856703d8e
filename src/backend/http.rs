use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    cancellable, ConnectionService, IdentityService, ProfileService,
    RequestAck, StatusRecord, SubjectProfile, ViewerIdentity,
};
use crate::config::BackendConfig;
use crate::session::SessionProvider;
use crate::{Result, ViewError};

const LOG_PREFIX: &str = "[http-backend]";

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionRequestBody<'a> {
    recipient_id: &'a str,
}

/// All three services over the REST API of the backend.
///
/// - `GET  auth/user`
/// - `GET  users/{id}/profile`
/// - `GET  connections/status/{id}`
/// - `POST connections/request`
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    session: Arc<dyn SessionProvider>,
}

impl HttpBackend {
    pub fn new(
        config: BackendConfig,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        let mut header = HeaderMap::new();
        header.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|_| {
                ViewError::Config(format!(
                    "invalid user agent {:?}",
                    config.user_agent
                ))
            })?,
        );
        let client = Client::builder()
            .default_headers(header)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url,
            session,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        // The url crate resolves dot segments instead of encoding them.
        if segments.iter().any(|s| matches!(*s, "." | "..")) {
            return Err(ViewError::NotFound);
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ViewError::Config(format!(
                    "{} cannot be a base url",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        cancel: &CancellationToken,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        log::trace!("{} GET {}", LOG_PREFIX, url);
        let request = self.authorize(self.client.get(url));
        cancellable(cancel, async {
            let response = request.send().await?;
            self.decode(response).await
        })
        .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        log::trace!("{} POST {}", LOG_PREFIX, url);
        let request = self
            .authorize(self.client.post(url))
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?);
        cancellable(cancel, async {
            let response = request.send().await?;
            self.decode(response).await
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;
        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }
        Err(self.classify(status, &body))
    }

    fn classify(&self, status: StatusCode, body: &[u8]) -> ViewError {
        let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
        let message = parsed.message.or(parsed.error);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                log::warn!(
                    "{} auth rejected ({}), dropping session",
                    LOG_PREFIX,
                    status
                );
                self.session.clear();
                ViewError::Unauthenticated
            }
            StatusCode::NOT_FOUND => ViewError::NotFound,
            StatusCode::CONFLICT => ViewError::Conflict(
                message.unwrap_or_else(|| status.to_string()),
            ),
            _ => ViewError::Transport(match message {
                Some(message) => format!("{}: {}", status, message),
                None => status.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ProfileService for HttpBackend {
    async fn fetch_subject_profile(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SubjectProfile> {
        self.get(&["users", subject_id, "profile"], cancel).await
    }
}

#[async_trait]
impl IdentityService for HttpBackend {
    async fn fetch_viewer_identity(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ViewerIdentity> {
        self.get(&["auth", "user"], cancel).await
    }
}

#[async_trait]
impl ConnectionService for HttpBackend {
    async fn fetch_connection_status(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusRecord> {
        self.get(&["connections", "status", subject_id], cancel)
            .await
    }

    async fn send_connection_request(
        &self,
        subject_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RequestAck> {
        let body = ConnectionRequestBody {
            recipient_id: subject_id,
        };
        self.post(&["connections", "request"], &body, cancel)
            .await
    }
}
