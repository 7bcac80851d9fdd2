// src/mock.rs
//! A stand-in knock service for local development and tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{routing::post, Json, Router};
use chrono::Utc;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::types::{ErrorResponse, KnockResponse};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub valid_token: String,
    pub admin_token: String,
    pub max_ttl: i64,
    pub default_entry: String,
    /// Only the two configured tokens are accepted. Otherwise any non-empty
    /// key passes.
    pub strict: bool,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            valid_token: "test-token-123".into(),
            admin_token: "admin-token-456".into(),
            max_ttl: 3600,
            default_entry: "192.168.1.100".into(),
            strict: true,
        }
    }
}

type Rejection = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, msg: &str) -> Rejection {
    (status, Json(ErrorResponse { error: msg.into() }))
}

pub fn router(config: MockConfig) -> Router {
    Router::new()
        .route("/knock", post(knock))
        .route("/*path", post(knock))
        .with_state(Arc::new(config))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(config: MockConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("mock knocker listening on {}", listener.local_addr()?);
    axum::serve(listener, router(config)).await?;
    Ok(())
}

async fn knock(
    State(cfg): State<Arc<MockConfig>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<KnockResponse>, Rejection> {
    if !uri.path().ends_with("/knock") {
        return Err(reject(StatusCode::NOT_FOUND, "Not found"));
    }

    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    check_key(&cfg, api_key)?;

    let body: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid JSON"))?
    };

    let ip = body
        .get("ip_address")
        .and_then(Value::as_str)
        .filter(|ip| !ip.is_empty());
    if ip.is_some() && api_key != cfg.admin_token {
        return Err(reject(
            StatusCode::FORBIDDEN,
            "Insufficient permissions to whitelist remote IPs",
        ));
    }

    let ttl = capped_ttl(body.get("ttl").and_then(Value::as_f64), cfg.max_ttl);
    Ok(Json(KnockResponse {
        whitelisted_entry: ip.unwrap_or(cfg.default_entry.as_str()).to_string(),
        expires_at: Utc::now().timestamp() + ttl,
        expires_in_seconds: ttl,
    }))
}

fn check_key(cfg: &MockConfig, api_key: &str) -> Result<(), Rejection> {
    if api_key.is_empty() {
        return Err(reject(StatusCode::UNAUTHORIZED, "Missing API key"));
    }
    if cfg.strict && api_key != cfg.valid_token && api_key != cfg.admin_token {
        return Err(reject(StatusCode::UNAUTHORIZED, "Invalid API key"));
    }
    Ok(())
}

/// Floor the requested TTL, default to `max`, clamp into `1..=max`.
fn capped_ttl(requested: Option<f64>, max: i64) -> i64 {
    let ttl = requested
        .filter(|t| t.is_finite())
        .map(|t| t.floor() as i64)
        .unwrap_or(max);
    ttl.max(1).min(max)
}
