// src/knocker.rs
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::{ErrorResponse, KnockRequest, KnockResponse};

const KNOCK_PATH: &str = "/knock";

#[derive(Debug, Error)]
pub enum KnockError {
    #[error("invalid endpoint URL {url}: {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// No HTTP response was obtained.
    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    /// The request could not be built or followed, e.g. a bad header value.
    #[error("invalid knock request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("unexpected knock response: {0}")]
    Schema(#[from] serde_json::Error),
}

impl KnockError {
    fn from_send(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || (e.is_request() && !e.is_builder()) {
            KnockError::Transport(e)
        } else {
            KnockError::Request(e)
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, KnockError::Transport(_))
    }
}

/// Resolve the knock URL for `endpoint`. An endpoint that already ends with
/// `/knock` is used as-is, otherwise one trailing slash is dropped and
/// `/knock` appended.
pub fn resolve_url(endpoint: &str) -> String {
    if endpoint.ends_with(KNOCK_PATH) {
        return endpoint.to_string();
    }
    let base = endpoint.strip_suffix('/').unwrap_or(endpoint);
    format!("{base}{KNOCK_PATH}")
}

/// Message used when a non-2xx body carries no usable `error` field.
pub fn status_message(status: StatusCode) -> String {
    format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
}

fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(parsed) => parsed.error,
        Err(_) => status_message(status),
    }
}

#[derive(Debug, Clone, Default)]
pub struct KnockClient {
    http: reqwest::Client,
}

impl KnockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Send a single knock. No retries and no timeout beyond the client's own.
    pub async fn knock(
        &self,
        endpoint: &str,
        token: &str,
        request: &KnockRequest,
    ) -> Result<KnockResponse, KnockError> {
        let resolved = resolve_url(endpoint);
        let url = Url::parse(&resolved).map_err(|source| KnockError::InvalidEndpoint {
            url: resolved.clone(),
            source,
        })?;
        debug!("knocking {url}");

        let res = self
            .http
            .post(url)
            .header("X-Api-Key", token)
            .json(request)
            .send()
            .await
            .map_err(KnockError::from_send)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.bytes().await.unwrap_or_default();
            let message = error_message(status, &body);
            warn!("knock rejected with {status}: {message}");
            return Err(KnockError::Http { status, message });
        }

        let body = res.bytes().await.map_err(KnockError::Body)?;
        let parsed: KnockResponse = serde_json::from_slice(&body)?;
        info!(
            "whitelisted {} for {}s",
            parsed.whitelisted_entry, parsed.expires_in_seconds
        );
        Ok(parsed)
    }
}
