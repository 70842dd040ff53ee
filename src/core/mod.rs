//! Core orchestration logic.
//!
//! This module contains:
//! - Session: Backend session client and id strategies
//! - Invoker: Single task invocation with guaranteed cleanup
//! - Aggregator: Parallel group fan-out/fan-in
//! - Orchestrator: Sequential stage composition
//! - Batch: Labeled pipelines with isolated failures
//! - Pipeline: Pipeline definitions and loading
//! - Safety: Limits and timeouts

pub mod aggregator;
pub mod batch;
pub mod error;
pub mod invoker;
pub mod orchestrator;
pub mod pipeline;
pub mod safety;
pub mod session;

// Re-export commonly used types
pub use aggregator::{run_group, GroupOutcome};
pub use error::{AbortCause, InvocationFailed, Phase, PipelineError, TransportError};
pub use invoker::{SessionGuard, TaskInvoker};
pub use orchestrator::Orchestrator;
pub use pipeline::{
    ContextMode, ParallelGroup, PartialFailurePolicy, Pipeline, PipelineSet, Stage, TaskSpec,
};
pub use safety::{SafetyLimits, SafetyViolation};
pub use session::{RandomSessionIds, SequentialSessionIds, SessionClient, SessionIdGenerator};
