//! Main orchestrator for pipeline execution.
//!
//! Runs stages in strict order: a stage starts only after the previous
//! one, including every member of a parallel group, has terminated. Each
//! stage's outputs are merged into a context the next stage can see.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AdkBackend, Backend};
use crate::config::ResolvedConfig;
use crate::domain::state::{extract_output, merge_into, project, render_prompt};
use crate::domain::{BackendHealth, MemberStatus, PipelineRun, StateBlob};

use super::aggregator::{run_group, GroupOutcome};
use super::error::{AbortCause, InvocationFailed, PipelineError};
use super::invoker::TaskInvoker;
use super::pipeline::{ContextMode, PartialFailurePolicy, Pipeline, Stage};
use super::safety::SafetyLimits;
use super::session::{SessionClient, SessionIdGenerator};

/// Main pipeline orchestrator
#[derive(Clone)]
pub struct Orchestrator {
    /// Runs single tasks on their own sessions
    invoker: TaskInvoker,

    /// Input and shape limits
    limits: SafetyLimits,
}

impl Orchestrator {
    /// Create an orchestrator over a backend, with random session ids
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            invoker: TaskInvoker::new(SessionClient::new(backend)),
            limits: SafetyLimits::default(),
        }
    }

    /// Create an orchestrator with a custom session id strategy
    pub fn with_session_ids(backend: Arc<dyn Backend>, ids: Arc<dyn SessionIdGenerator>) -> Self {
        Self {
            invoker: TaskInvoker::new(SessionClient::with_ids(backend, ids)),
            limits: SafetyLimits::default(),
        }
    }

    /// Create an orchestrator talking HTTP to the configured backend
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let backend = AdkBackend::from_limits(&config.backend_url, &config.limits);
        Self::new(Arc::new(backend)).with_limits(config.limits.clone())
    }

    pub fn with_limits(mut self, limits: SafetyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn invoker(&self) -> &TaskInvoker {
        &self.invoker
    }

    pub fn limits(&self) -> &SafetyLimits {
        &self.limits
    }

    /// Invoke one backend task directly
    pub async fn invoke(
        &self,
        task_name: &str,
        input: &str,
        caller_id: &str,
    ) -> Result<StateBlob, InvocationFailed> {
        self.invoker.invoke(task_name, input, caller_id).await
    }

    /// Execute a pipeline with the given input
    ///
    /// A failed single stage aborts the run. A parallel stage aborts it
    /// when every member failed, or when some failed and the stage's
    /// policy is `abort`; with `degrade` the run continues without the
    /// failed members' keys and records them on the returned run.
    #[instrument(skip(self, pipeline, input), fields(pipeline = %pipeline.name))]
    pub async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        input: &str,
        caller_id: &str,
    ) -> Result<PipelineRun, PipelineError> {
        pipeline.validate()?;
        self.limits.check_pipeline(pipeline)?;
        self.limits.validate_input(input)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, stages = pipeline.stages.len(), "Starting pipeline execution");

        let mut context = StateBlob::new();
        let mut failures = Vec::new();

        for (stage_idx, stage) in pipeline.stages.iter().enumerate() {
            let label = stage.label(stage_idx);

            // Prior outputs travel either as the session's initial state or
            // inside the prompt, never both
            let (stage_input, seed) = match pipeline.context {
                ContextMode::SessionState => (input.to_string(), context.clone()),
                ContextMode::Prompt => (render_prompt(input, &context), StateBlob::new()),
            };

            match stage {
                Stage::Single(task) => {
                    let state = self
                        .invoker
                        .invoke_with_state(&task.task, &stage_input, caller_id, seed.clone())
                        .await
                        .map_err(|e| abort(pipeline, &label, AbortCause::Invocation(e)))?;

                    // An explicit key namespaces the output; otherwise every key merges
                    match &task.output_key {
                        Some(key) => {
                            let mut output = StateBlob::new();
                            output.insert(key.clone(), extract_output(state, key, &seed));
                            merge_into(&mut context, output);
                        }
                        None => merge_into(&mut context, state),
                    }
                }
                Stage::Parallel(group) => {
                    let outcome =
                        run_group(&self.invoker, &group.members, &stage_input, caller_id, &seed)
                            .await;

                    check_group(pipeline, &label, group.on_partial_failure, &outcome)?;
                    if outcome.is_partial_failure() {
                        warn!(
                            stage = %label,
                            failed = outcome.failed_count(),
                            total = outcome.statuses.len(),
                            "Continuing with degraded parallel stage"
                        );
                        failures.extend(outcome.failures().cloned());
                    }

                    merge_into(&mut context, outcome.state);
                }
            }

            info!(stage = %label, keys = context.len(), "Stage completed");
        }

        let state = match &pipeline.outputs {
            Some(keys) => project(&context, keys),
            None => context,
        };

        let run = PipelineRun {
            id: run_id,
            pipeline: pipeline.name.clone(),
            state,
            failures,
            started_at,
            completed_at: Utc::now(),
        };
        info!(%run_id, duration_ms = run.duration_ms(), degraded = run.is_degraded(), "Run completed");

        Ok(run)
    }

    /// Report whether the backend is reachable and which tasks it exposes
    pub async fn health(&self) -> BackendHealth {
        let client = self.invoker.client();
        let backend = client.backend().name().to_string();

        match client.list_tasks().await {
            Ok(tasks) => BackendHealth {
                healthy: true,
                backend,
                tasks,
                error: None,
            },
            Err(e) => BackendHealth {
                healthy: false,
                backend,
                tasks: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Apply the group failure policy to a joined parallel stage
fn check_group(
    pipeline: &Pipeline,
    label: &str,
    policy: PartialFailurePolicy,
    outcome: &GroupOutcome,
) -> Result<(), PipelineError> {
    let total = outcome.statuses.len();

    let failures = || -> Vec<MemberStatus> { outcome.failures().cloned().collect() };

    if outcome.is_total_failure() {
        return Err(abort(
            pipeline,
            label,
            AbortCause::GroupFailed {
                total,
                failures: failures(),
            },
        ));
    }

    if outcome.is_partial_failure() && policy == PartialFailurePolicy::Abort {
        return Err(abort(
            pipeline,
            label,
            AbortCause::GroupDegraded {
                failed: outcome.failed_count(),
                total,
                failures: failures(),
            },
        ));
    }

    Ok(())
}

fn abort(pipeline: &Pipeline, stage: &str, cause: AbortCause) -> PipelineError {
    error!(stage, error = %cause, "Pipeline aborted");
    PipelineError::Aborted {
        pipeline: pipeline.name.clone(),
        stage: stage.to_string(),
        cause,
    }
}
