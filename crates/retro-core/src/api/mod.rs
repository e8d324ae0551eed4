//! HTTP client for the agent backend.
//!
//! The backend is an opaque collaborator: it lists agents, answers chat
//! messages and forgets sessions. Nothing here retries.

mod error;
mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT as USER_AGENT_HEADER};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use error::{ApiError, ApiErrorKind, ApiResult, classify_reqwest_error};
pub use types::{AgentMessage, ChatReply, ChatRequest, DeleteSessionRequest, HealthResponse};

use crate::config::Config;
use crate::store::SessionId;

/// Standard User-Agent header for backend requests.
pub const USER_AGENT: &str = concat!("retro/", env!("CARGO_PKG_VERSION"));

/// Environment variable overriding the backend base URL.
pub const BASE_URL_ENV: &str = "RETRO_API_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Agents offered when the backend returns none.
pub const DEFAULT_AGENTS: &[&str] = &["yapper"];

/// Buckets the backend accepts for `save_to`.
pub const SAVE_BUCKETS: &[&str] = &["journal", "definitions", "threads", "drafts", "audit_logs"];

/// Resolves the backend base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the chosen URL doesn't parse.
pub fn resolve_base_url(config_base_url: Option<&str>) -> Result<String> {
    resolve_base_url_from(std::env::var(BASE_URL_ENV).ok().as_deref(), config_base_url)
}

fn resolve_base_url_from(env_url: Option<&str>, config_url: Option<&str>) -> Result<String> {
    for candidate in [env_url, config_url].into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            url::Url::parse(trimmed)
                .with_context(|| format!("Invalid agent backend base URL: {trimmed}"))?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }
    Ok(DEFAULT_BASE_URL.to_string())
}

/// Agent backend client.
#[derive(Debug, Clone)]
pub struct AgentClient {
    base_url: String,
    http: reqwest::Client,
}

impl AgentClient {
    /// Builds a client for `base_url`. `timeout` applies to whole requests.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_static(USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Builds a client from config, honoring `RETRO_API_BASE_URL`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = resolve_base_url(config.effective_api_base_url())?;
        Self::new(base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Lists available agents.
    ///
    /// A response without a usable `agents` list yields [`DEFAULT_AGENTS`];
    /// a non-2xx response is an error.
    pub async fn agents(&self) -> ApiResult<Vec<String>> {
        let body: Value = self.send_json(self.http.get(self.url("/agents")), None).await?;
        let agents: Vec<String> = body
            .get("agents")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .filter(|name| !name.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if agents.is_empty() {
            debug!("backend returned no agents, using defaults");
            return Ok(default_agents());
        }
        Ok(agents)
    }

    /// Sends one chat message.
    pub async fn chat(
        &self,
        request: &ChatRequest,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<ChatReply> {
        debug!(
            session_id = %request.session_id,
            agent = %request.active_agent,
            "sending chat message"
        );
        self.send_json(self.http.post(self.url("/chat")).json(request), cancel)
            .await
    }

    /// Asks the backend to forget a session. The response body is ignored.
    pub async fn delete_session(&self, session_id: &SessionId) -> ApiResult<()> {
        let request = self
            .http
            .post(self.url("/session/delete"))
            .json(&DeleteSessionRequest { session_id });
        self.send(request, None).await.map(|_body| ())
    }

    pub async fn health(&self) -> ApiResult<HealthResponse> {
        self.send_json(self.http.get(self.url("/health")), None).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<T> {
        let body = self.send(request, cancel).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::parse(format!("Unexpected response from backend: {e}"), &body))
    }

    /// Sends a request and returns the body of a 2xx response.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> ApiResult<String> {
        let exchange = async {
            let response = request.send().await.map_err(|e| classify_reqwest_error(&e))?;
            let status = response.status();
            let body = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
            if !status.is_success() {
                return Err(ApiError::http_status(status.as_u16(), &body));
            }
            Ok(body)
        };

        match cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(ApiError::cancelled()),
                result = exchange => result,
            },
            None => exchange.await,
        }
    }
}

pub fn default_agents() -> Vec<String> {
    DEFAULT_AGENTS.iter().map(|s| (*s).to_string()).collect()
}
