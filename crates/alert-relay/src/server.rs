//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::relay::correlation::{self, CORRELATION_HEADER};
use crate::relay::Relay;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub endpoint: String,
}

/// Build the router. The relay endpoint path comes from configuration.
pub fn router(state: AppState) -> Router {
    let endpoint = state.endpoint.clone();

    Router::new()
        .route(&endpoint, post(handle_relay))
        .route("/health", get(handle_health))
        .route("/api/stats", get(handle_get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Build and run the HTTP server.
pub async fn run(state: AppState, listen_addr: &str) -> anyhow::Result<()> {
    let endpoint = state.endpoint.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(address = %listen_addr, endpoint = %endpoint, "alert-relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("alert-relay shut down gracefully");
    Ok(())
}

/// Relay handler for POST on the configured endpoint.
///
/// Answers 200 once every target has been attempted, whatever the targets
/// returned. Answers 500 only when the inbound body could not be read.
///
/// The relay runs on its own task: if the caller disconnects and this
/// handler is dropped, the remaining targets are still attempted.
async fn handle_relay(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let relay_id = correlation::generate_id();
    let span = relay_tracing::relay_request_span!(&relay_id, &state.endpoint);

    let relay = state.relay.clone();
    let task_relay_id = relay_id.clone();
    let body = request.into_body();
    let task = tokio::spawn(
        async move { relay.relay(body, &task_relay_id).await }.instrument(span),
    );

    let mut response = match task.await {
        Ok(Ok(outcome)) => (outcome.status(), Json(outcome.response_body())).into_response(),
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => {
            tracing::error!(relay_id = %relay_id, error = %e, "Relay task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "relay task failed").into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&relay_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

/// Counter snapshot.
async fn handle_get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.relay.stats().snapshot())
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining in-flight relays...");
}
