//! Pipeline runs and per-member statuses.
//!
//! A PipelineRun is the record of one successful Stage Composer run:
//! the final state plus the parallel members that degraded on the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::StateBlob;

/// A completed pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Name of the pipeline that was executed
    pub pipeline: String,

    /// Final state, with every earlier stage's keys merged in
    pub state: StateBlob,

    /// Parallel members that failed without aborting the run
    pub failures: Vec<MemberStatus>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed
    pub completed_at: DateTime<Utc>,
}

impl PipelineRun {
    /// True when some parallel branch was dropped along the way
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Terminal status of one parallel group member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    /// Task the member invoked
    pub task: String,

    /// Key the member's output is merged under
    pub output_key: String,

    /// How the member ended
    #[serde(flatten)]
    pub outcome: MemberOutcome,
}

impl MemberStatus {
    pub fn ok(task: impl Into<String>, output_key: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            output_key: output_key.into(),
            outcome: MemberOutcome::Ok,
        }
    }

    pub fn failed(
        task: impl Into<String>,
        output_key: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            output_key: output_key.into(),
            outcome: MemberOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, MemberOutcome::Failed { .. })
    }

    /// Cause of a failed member
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            MemberOutcome::Ok => None,
            MemberOutcome::Failed { error } => Some(error),
        }
    }
}

/// Outcome of a parallel member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum MemberOutcome {
    /// Output merged under the member's key
    Ok,

    /// Member failed; its key is absent from the merged state
    Failed { error: String },
}
