//! HTTP surface over the orchestrator.
//!
//! One operation per configured pipeline, one batch operation over all of
//! them, and a liveness check that reports the backend's tasks.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{Orchestrator, PipelineSet};

pub use handlers::{AnalyzeRequest, PipelineSummary, PipelinesResponse};

/// State shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub pipelines: Arc<PipelineSet>,
    pub caller_id: Arc<str>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, pipelines: PipelineSet, caller_id: &str) -> Self {
        Self {
            orchestrator,
            pipelines: Arc::new(pipelines),
            caller_id: Arc::from(caller_id),
        }
    }
}

/// Build the router with all routes and layers
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/pipelines", get(handlers::list_pipelines))
        .route("/analyze/all", post(handlers::analyze_all))
        .route("/analyze/:label", post(handlers::analyze))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl+C
pub async fn serve(address: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid server address: {}", address))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(%addr, pipelines = state.pipelines.len(), "Server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("Received shutdown signal");
    }
}
