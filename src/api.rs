//! REST API server for the deposit advisor
//!
//! Session surface over HTTP: one chat turn per request, plus session
//! reset and history.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::models::ProductCategory;
use crate::session::{Advisor, SessionStore};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub category: Option<String>,
    pub question: String,
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

#[derive(Clone)]
pub struct ApiState {
    pub advisor: Arc<Advisor>,
    pub sessions: Arc<SessionStore>,
}

impl ApiState {
    pub fn new(advisor: Advisor) -> Self {
        Self {
            advisor: Arc::new(advisor),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

/// Client-chosen session keys that are not UUIDs map to a stable UUID
fn stable_uuid_from_string(input: &str) -> Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

fn session_key(value: Option<&str>) -> Uuid {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v)),
        _ => Uuid::new_v4(),
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
    let question = req.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Question must not be empty".into())),
        );
    }

    let session_id = session_key(req.session_id.as_deref());
    let category = req.category.as_deref().map(ProductCategory::parse);

    let handle = state
        .sessions
        .get_or_create(
            session_id,
            req.user_id.clone(),
            category.unwrap_or_default(),
        )
        .await;

    // Held for the whole turn: turns on one session are serialized
    let mut session = handle.lock().await;

    // Sidebar values sent with the turn replace the stored ones
    if let Some(user_id) = req.user_id {
        session.user_id = Some(user_id).filter(|id| !id.trim().is_empty());
    }
    if let Some(category) = category {
        session.category = category;
    }

    info!(%session_id, category = %session.category, "Chat turn received");

    let report = state.advisor.handle_turn(&mut session, question).await;
    drop(session);

    let notices: Vec<_> = report
        .notices
        .iter()
        .map(|n| serde_json::json!({ "code": n, "message": n.message() }))
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id,
            "answer": report.outcome.response,
            "kind": report.outcome.kind,
            "attempts": report.outcome.attempts,
            "intent": report.outcome.intent,
            "notices": notices,
            "audit_id": report.audit_id,
        }))),
    )
}

/// =============================
/// Session Endpoints
/// =============================

fn parse_session_id(raw: &str) -> Uuid {
    session_key(Some(raw))
}

async fn reset_session(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = parse_session_id(&id);

    if state.sessions.reset(session_id).await {
        info!(%session_id, "Session history reset");
        (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({ "session_id": session_id }))),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Session {} not found", id))),
        )
    }
}

async fn session_history(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    let session_id = parse_session_id(&id);

    match state.sessions.get(session_id).await {
        Some(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": session_id,
                "user_id": session.user_id,
                "category": session.category,
                "messages": session.history.messages(),
            }))),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Session {} not found", id))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/sessions/:id/reset", post(reset_session))
        .route("/api/sessions/:id/history", get(session_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
