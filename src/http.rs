//! Thin HTTP transport over the engagement engine.
//!
//! Deliberately dumb: wire formats, the API-key check, and
//! empty/malformed-body tolerance live here; everything else is the
//! engine's job. An empty or incomplete body is answered with a neutral
//! greeting without ever invoking the core.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Engine;

/// Header carrying the transport API key.
const API_KEY_HEADER: &str = "x-api-key";

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    /// The engagement engine.
    pub engine: Arc<Engine>,
    /// Expected `X-API-Key` value.
    pub api_key: String,
}

/// Inbound message body. Both fields are optional so probe requests
/// with empty bodies do not error.
#[derive(Debug, Deserialize)]
pub struct HoneypotRequest {
    /// Conversation identifier.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    /// Message as an object or plain text.
    pub message: Option<MessageField>,
}

/// Message content: structured `{sender, text, timestamp}` or bare text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageField {
    /// Structured form; only `text` matters to the core.
    Structured {
        /// The message text.
        text: String,
    },
    /// Plain string form.
    Plain(String),
}

impl MessageField {
    fn text(&self) -> &str {
        match self {
            Self::Structured { text } | Self::Plain(text) => text,
        }
    }
}

/// Outbound reply body. Exactly these two fields; detection and
/// intelligence stay internal.
#[derive(Debug, Serialize)]
pub struct HoneypotResponse {
    /// Always "success".
    pub status: &'static str,
    /// The agent's reply text.
    pub reply: String,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/honeypot", get(honeypot_probe).post(honeypot_message))
        .route("/api/v1/health", get(health))
        .route("/api/v1/cleanup", post(cleanup))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn serve(bind: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {bind}: {e}"))?;
    info!(bind, "http transport listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("server error: {e}"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

/// Liveness echo used by external endpoint testers. Keyed like the
/// conversational endpoint; only the health route stays open.
async fn honeypot_probe(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_api_key(&state, &headers) {
        return rejection;
    }
    Json(HoneypotResponse {
        status: "success",
        reply: "Honeypot API is active".to_owned(),
    })
    .into_response()
}

/// The conversational endpoint.
async fn honeypot_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<HoneypotRequest>>,
) -> Response {
    if let Err(rejection) = check_api_key(&state, &headers) {
        return rejection;
    }

    // Empty or incomplete bodies never reach the core.
    let Some(Json(request)) = body else {
        return greeting();
    };
    let (Some(session_id), Some(message)) = (request.session_id, request.message) else {
        return greeting();
    };

    let reply = state.engine.handle_message(&session_id, message.text()).await;
    Json(HoneypotResponse {
        status: "success",
        reply,
    })
    .into_response()
}

fn greeting() -> Response {
    Json(HoneypotResponse {
        status: "success",
        reply: "Hello. How can I help you?".to_owned(),
    })
    .into_response()
}

/// Maintenance side channel: live session count.
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "active_sessions": state.engine.active_session_count().await,
    }))
}

/// Maintenance side channel: sweep idle sessions.
async fn cleanup(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = check_api_key(&state, &headers) {
        return rejection;
    }
    state.engine.force_cleanup().await;
    Json(serde_json::json!({
        "status": "success",
        "active_sessions": state.engine.active_session_count().await,
    }))
    .into_response()
}

fn check_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if provided == state.api_key {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"status": "error", "detail": "invalid API key"})),
        )
            .into_response())
    }
}
