//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::BerthError;
use crate::server::handlers::{
    create_handler, delete_handler, get_handler, health_handler, list_handler, start_handler,
};
use crate::server::state::{ServerState, StreamState};
use crate::server::ws::stream_router;

/// Build the orchestrator API router
pub fn api_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/deployments", post(create_handler).get(list_handler))
        .route("/deployments/{id}", get(get_handler).delete(delete_handler))
        .route("/deployments/{id}/start", post(start_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the orchestrator API server
pub async fn serve_api(
    host: &str,
    port: u16,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), BerthError>>, BerthError> {
    let app = api_router(state);

    let addr = format!("{}:{}", host, port);
    info!("Starting API server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BerthError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| BerthError::ServerError(e.to_string()))
    });

    Ok(handle)
}

/// Start the log stream socket server on its own port
pub async fn serve_stream(
    host: &str,
    port: u16,
    state: Arc<StreamState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), BerthError>>, BerthError> {
    let app = stream_router(state);

    let addr = format!("{}:{}", host, port);
    info!("Starting log stream server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| BerthError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| BerthError::ServerError(e.to_string()))
    });

    Ok(handle)
}
