//! HTTP handlers for the REST endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::AppState;
use crate::domain::{BackendHealth, BatchResult, PipelineResponse};

/// Body of the analyze endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(alias = "health_data")]
    pub input: String,
}

/// Body of GET /pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinesResponse {
    pub pipelines: Vec<PipelineSummary>,
    pub backend: BackendHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub name: String,
    pub description: String,
    pub stages: usize,
}

/// GET / - Liveness
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "agentrelay is running", "status": "ok" }))
}

/// GET /health - Backend reachability and exposed tasks
pub async fn health(State(state): State<AppState>) -> Json<BackendHealth> {
    Json(state.orchestrator.health().await)
}

/// GET /pipelines - Configured pipelines
pub async fn list_pipelines(State(state): State<AppState>) -> Json<PipelinesResponse> {
    let pipelines = state
        .pipelines
        .iter()
        .map(|(label, pipeline)| PipelineSummary {
            name: label.to_string(),
            description: pipeline.description.clone(),
            stages: pipeline.stages.len(),
        })
        .collect();

    Json(PipelinesResponse {
        pipelines,
        backend: state.orchestrator.health().await,
    })
}

/// POST /analyze/:label - Run one pipeline
pub async fn analyze(
    Path(label): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> (StatusCode, Json<PipelineResponse>) {
    let Some(pipeline) = state.pipelines.get(&label) else {
        return (
            StatusCode::NOT_FOUND,
            Json(PipelineResponse::error(format!("Unknown pipeline '{}'", label))),
        );
    };

    info!(%label, "Running pipeline");
    let response = state
        .orchestrator
        .run_labeled(&label, pipeline, &request.input, &state.caller_id)
        .await;

    let status = if response.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

/// POST /analyze/all - Run every pipeline
pub async fn analyze_all(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<BatchResult> {
    info!(pipelines = state.pipelines.len(), "Running batch");
    Json(
        state
            .orchestrator
            .run_batch(&state.pipelines, &request.input, &state.caller_id)
            .await,
    )
}
