//! Batch runner: several labeled pipelines against the same input.
//!
//! Each label runs on its own task and always yields exactly one
//! response; no failure, including a panic, escapes the batch.

use futures::future::join_all;
use tracing::{info, instrument};

use crate::domain::{BatchResult, PipelineResponse, PipelineRun};

use super::orchestrator::Orchestrator;
use super::pipeline::{Pipeline, PipelineSet};

impl Orchestrator {
    /// Run one pipeline and wrap the outcome as a labeled response
    pub async fn run_labeled(
        &self,
        label: &str,
        pipeline: &Pipeline,
        input: &str,
        caller_id: &str,
    ) -> PipelineResponse {
        match self.run_pipeline(pipeline, input, caller_id).await {
            Ok(run) => success_response(label, run),
            Err(e) => PipelineResponse::error(format!("Pipeline '{}' failed: {}", label, e)),
        }
    }

    /// Run every pipeline in the set concurrently.
    ///
    /// Pipelines run on detached tasks: dropping the returned future does
    /// not cancel them, so every in-flight session still gets closed.
    #[instrument(skip(self, pipelines, input), fields(pipelines = pipelines.len()))]
    pub async fn run_batch(
        &self,
        pipelines: &PipelineSet,
        input: &str,
        caller_id: &str,
    ) -> BatchResult {
        let (labels, handles): (Vec<String>, Vec<_>) = pipelines
            .iter()
            .map(|(label, pipeline)| {
                let orchestrator = self.clone();
                let label = label.to_string();
                let pipeline = pipeline.clone();
                let input = input.to_string();
                let caller_id = caller_id.to_string();

                let handle = tokio::spawn({
                    let label = label.clone();
                    async move {
                        orchestrator
                            .run_labeled(&label, &pipeline, &input, &caller_id)
                            .await
                    }
                });
                (label, handle)
            })
            .unzip();

        let joined = join_all(handles).await;

        let results: BatchResult = labels
            .into_iter()
            .zip(joined)
            .map(|(label, outcome)| {
                let response = outcome.unwrap_or_else(|e| {
                    PipelineResponse::error(format!("Pipeline '{}' crashed: {}", label, e))
                });
                (label, response)
            })
            .collect();

        let failed = results.values().filter(|r| !r.is_success()).count();
        info!(total = results.len(), failed, "Batch completed");

        results
    }
}

fn success_response(label: &str, run: PipelineRun) -> PipelineResponse {
    let message = if run.is_degraded() {
        format!(
            "Pipeline '{}' completed with {} degraded branch(es)",
            label,
            run.failures.len()
        )
    } else {
        format!("Pipeline '{}' completed successfully", label)
    };

    PipelineResponse::success(run.state, message)
}
