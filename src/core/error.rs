//! Error taxonomy for backend calls, invocations and pipelines.
//!
//! Transport errors never travel past the task invoker on their own: they
//! are wrapped in [`InvocationFailed`] together with the task name and the
//! phase that broke.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::MemberStatus;

use super::safety::SafetyViolation;

/// Failure talking to the backend
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("could not reach {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("backend returned {status} for {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    /// True for a 404 from the backend
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Session lifecycle phase in which an invocation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Create,
    Dispatch,
    Fetch,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Dispatch => "dispatch",
            Self::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// A single task invocation could not complete
#[derive(Debug, Clone, Error)]
#[error("task '{task}' failed during {phase}: {source}")]
pub struct InvocationFailed {
    pub task: String,
    pub phase: Phase,
    #[source]
    pub source: TransportError,
}

impl InvocationFailed {
    pub fn new(task: impl Into<String>, phase: Phase, source: TransportError) -> Self {
        Self {
            task: task.into(),
            phase,
            source,
        }
    }
}

/// Why a pipeline stopped at a stage
#[derive(Debug, Clone, Error)]
pub enum AbortCause {
    #[error(transparent)]
    Invocation(#[from] InvocationFailed),

    #[error("all {total} parallel members failed: {}", describe(.failures))]
    GroupFailed {
        total: usize,
        failures: Vec<MemberStatus>,
    },

    #[error("{failed} of {total} parallel members failed: {}", describe(.failures))]
    GroupDegraded {
        failed: usize,
        total: usize,
        failures: Vec<MemberStatus>,
    },
}

/// One `task: cause` entry per failed member
fn describe(failures: &[MemberStatus]) -> String {
    failures
        .iter()
        .map(|status| format!("{}: {}", status.task, status.error().unwrap_or("failed")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Stage Composer failure
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("pipeline '{pipeline}' aborted at stage '{stage}': {cause}")]
    Aborted {
        pipeline: String,
        stage: String,
        #[source]
        cause: AbortCause,
    },

    #[error("invalid pipeline '{pipeline}': {reason}")]
    Invalid { pipeline: String, reason: String },

    #[error(transparent)]
    Safety(#[from] SafetyViolation),
}
