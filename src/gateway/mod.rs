//! HTTP gateway: the chat endpoint plus tool, session, health and metrics
//! routes, served with `axum`.

pub mod api;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::observability::Observer;
use crate::tools::ToolSpec;

/// Shared state for all gateway handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub tools: Arc<Vec<ToolSpec>>,
    pub observer: Arc<dyn Observer>,
    pub provider: String,
    pub model: String,
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the gateway router with CORS, body limit and request timeout applied.
pub fn build_router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(api::handle_root))
        .route("/health", get(api::handle_health))
        .route("/chat", post(api::handle_chat))
        .route("/chat/", post(api::handle_chat))
        .route("/api/tools", get(api::handle_api_tools))
        .route(
            "/api/sessions/{id}",
            get(api::handle_api_session_get).delete(api::handle_api_session_delete),
        )
        .route("/metrics", get(api::handle_metrics))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(cors_layer(&config.cors_origins))
        .with_state(state)
}

/// Bind and serve until Ctrl+C.
pub async fn run_gateway(host: &str, port: u16, config: &GatewayConfig, state: AppState) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    tracing::info!(
        addr = %local,
        tools = state.tools.len(),
        observer = state.observer.name(),
        "Gateway listening"
    );

    let app = build_router(state, config);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Gateway server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
