//! HTTP adapter for an ADK-style agent runner.
//!
//! Endpoints:
//! - POST   /apps/{task}/users/{caller}/sessions/{id}  (body: initial state)
//! - POST   /run                                       (body: run request)
//! - GET    /apps/{task}/users/{caller}/sessions/{id}  (response: { state })
//! - DELETE /apps/{task}/users/{caller}/sessions/{id}
//! - GET    /list-apps

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Backend;
use crate::core::error::TransportError;
use crate::core::safety::SafetyLimits;
use crate::domain::{Session, StateBlob};

/// Backend client speaking the ADK session API over HTTP
pub struct AdkBackend {
    /// Base URL without trailing slash
    base_url: String,

    /// Timeout for create, fetch, delete and list calls
    request_timeout: Duration,

    /// Timeout for the run call
    run_timeout: Duration,

    /// Shared connection pool; safe for concurrent sessions
    client: reqwest::Client,
}

/// Body of the run call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunRequest<'a> {
    app_name: &'a str,
    user_id: &'a str,
    session_id: &'a str,
    new_message: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'a str,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

/// Session as returned by the fetch call
#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    state: StateBlob,
}

impl AdkBackend {
    /// Create a client with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        let limits = SafetyLimits::default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout: limits.request_timeout(),
            run_timeout: limits.run_timeout(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client using the timeouts from `limits`
    pub fn from_limits(base_url: impl Into<String>, limits: &SafetyLimits) -> Self {
        Self::new(base_url).with_timeouts(limits.request_timeout(), limits.run_timeout())
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, run_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.run_timeout = run_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Base URL extended with percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let invalid = |message: String| TransportError::Connect {
            url: self.base_url.clone(),
            message,
        };

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| invalid(format!("invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| invalid("backend URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn session_url(&self, session: &Session) -> Result<Url, TransportError> {
        self.endpoint(&[
            "apps",
            &session.task_name,
            "users",
            &session.caller_id,
            "sessions",
            session.id.as_str(),
        ])
    }

    /// Send a request and turn every non-2xx answer into an error
    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let response = request
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        url: &str,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify(url, timeout, e))?;

        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Backend for AdkBackend {
    fn name(&self) -> &str {
        "adk"
    }

    async fn create_session(&self, session: &Session) -> Result<(), TransportError> {
        let url = self.session_url(session)?;
        debug!(%url, "Creating session");

        let request = self.client.post(url.clone()).json(&session.state);
        self.send(request, url.as_str(), self.request_timeout).await?;
        Ok(())
    }

    async fn run(&self, session: &Session, input: &str) -> Result<(), TransportError> {
        let url = self.endpoint(&["run"])?;
        debug!(%url, session_id = %session.id, "Running task");

        let body = RunRequest {
            app_name: &session.task_name,
            user_id: &session.caller_id,
            session_id: session.id.as_str(),
            new_message: Content {
                parts: vec![Part { text: input }],
                role: "user",
            },
        };

        let request = self.client.post(url.clone()).json(&body);
        self.send(request, url.as_str(), self.run_timeout).await?;
        Ok(())
    }

    async fn fetch_state(&self, session: &Session) -> Result<StateBlob, TransportError> {
        let url = self.session_url(session)?;

        let request = self.client.get(url.clone());
        let response = self.send(request, url.as_str(), self.request_timeout).await?;
        let session: SessionResponse =
            Self::read_json(response, url.as_str(), self.request_timeout).await?;

        Ok(session.state)
    }

    async fn delete_session(&self, session: &Session) -> Result<(), TransportError> {
        let url = self.session_url(session)?;

        let request = self.client.delete(url.clone());
        match self.send(request, url.as_str(), self.request_timeout).await {
            Ok(_) => Ok(()),
            // Already gone counts as deleted
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_tasks(&self) -> Result<Vec<String>, TransportError> {
        let url = self.endpoint(&["list-apps"])?;

        let request = self.client.get(url.clone());
        let response = self.send(request, url.as_str(), self.request_timeout).await?;
        Self::read_json(response, url.as_str(), self.request_timeout).await
    }
}

/// Map a reqwest error onto the transport taxonomy
fn classify(url: &str, timeout: Duration, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_string(),
            timeout,
        };
    }

    if error.is_decode() {
        return TransportError::Decode {
            url: url.to_string(),
            message: error_chain(&error),
        };
    }

    TransportError::Connect {
        url: url.to_string(),
        message: error_chain(&error),
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
