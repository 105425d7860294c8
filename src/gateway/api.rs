//! Gateway handlers.

use super::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use tokio_util::sync::CancellationToken;

use crate::dispatch::DispatchRequest;

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "detail": message.into() }))).into_response()
}

/// GET /: liveness banner
pub async fn handle_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Helios Dynamics ERP Agent System is running!"
    }))
}

/// GET /health: status overview
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.provider,
        "model": state.model,
        "tools": state.tools.len(),
        "sessions": state.dispatcher.sessions().len(),
        "observer": state.observer.name(),
    }))
}

/// POST /chat/: route a prompt to a domain agent and return its answer
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Response {
    if request.prompt.trim().is_empty() {
        return detail(StatusCode::BAD_REQUEST, "prompt must not be empty");
    }

    // Cancels the in-flight loop if the client goes away or the request times out.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.dispatcher.dispatch(request, &cancel).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Chat request failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/tools: list registered tool specs
pub async fn handle_api_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({ "tools": state.tools.as_slice() }))
}

/// GET /api/sessions/{id}: a session's remembered exchanges
pub async fn handle_api_session_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let sessions = state.dispatcher.sessions();
    let (Some(summary), Some(exchanges)) =
        (sessions.summary(&id).await, sessions.exchanges(&id).await)
    else {
        return detail(StatusCode::NOT_FOUND, format!("Session '{id}' not found"));
    };

    Json(serde_json::json!({
        "id": summary.id,
        "last_activity": summary.last_activity,
        "exchanges": exchanges,
    }))
    .into_response()
}

/// DELETE /api/sessions/{id}: forget a session
pub async fn handle_api_session_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let deleted = state.dispatcher.sessions().clear(&id).await;
    Json(serde_json::json!({ "status": "ok", "deleted": deleted }))
}

/// GET /metrics: Prometheus text exposition, when that backend is active
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    match state.observer.render_metrics() {
        Some(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            text,
        )
            .into_response(),
        None => detail(
            StatusCode::NOT_FOUND,
            "Metrics are not enabled; set [observability] backend = \"prometheus\"",
        ),
    }
}
