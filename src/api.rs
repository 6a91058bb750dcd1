//! REST API server for the commerce agent orchestrator
//!
//! Exposes the chat loop and the dashboard snapshot via HTTP endpoints.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::agent::Orchestrator;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

/// One logical writer per turn: the orchestrator sits behind a Mutex and the
/// transcript/balance snapshot are only ever mutated while it is held.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Mutex<Orchestrator>>,
}

/// =============================
/// Helpers — Session Identity
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

fn parse_or_stable_uuid(value: Option<&str>, fallback_seed: &str) -> uuid::Uuid {
    match value {
        Some(v) if !v.trim().is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => stable_uuid_from_string(fallback_seed),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No user message found".into())),
        );
    }

    let session_id = parse_or_stable_uuid(req.session_id.as_deref(), "default-session");
    info!(%session_id, "Received chat request");

    let mut orchestrator = state.orchestrator.lock().await;
    let reply = orchestrator.handle_message(&req.message).await.clone();
    let snapshot = orchestrator.state();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id.to_string(),
            "answer": reply.text,
            "actions": reply.actions,
            "balances": snapshot.balances,
            "catalog": snapshot.catalog,
        }))),
    )
}

/// =============================
/// Snapshot Endpoint
/// =============================

async fn state_handler(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    let mut orchestrator = state.orchestrator.lock().await;

    // The dashboard view pulls fresh balances on load.
    if let Err(e) = orchestrator.refresh_balances().await {
        return (
            StatusCode::BAD_GATEWAY,
            Json(ApiResponse::error(format!("Balance refresh failed: {}", e))),
        );
    }

    let snapshot = orchestrator.state();
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "balances": snapshot.balances,
            "catalog": snapshot.catalog,
            "transcript": snapshot.transcript,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Mutex<Orchestrator>>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/state", get(state_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Mutex<Orchestrator>>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
