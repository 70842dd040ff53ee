//! Fan-out/fan-in over a parallel group.
//!
//! Every member runs to a terminal state before the group returns; one
//! member failing never cancels its siblings. Merging happens only after
//! the join, so no locking is needed on the merged state.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::state::extract_output;
use crate::domain::{MemberStatus, StateBlob};

use super::invoker::TaskInvoker;
use super::pipeline::TaskSpec;

/// Joined result of a parallel group
#[derive(Debug, Clone, Default)]
pub struct GroupOutcome {
    /// One key per successful member
    pub state: StateBlob,

    /// One entry per member, in declaration order
    pub statuses: Vec<MemberStatus>,
}

impl GroupOutcome {
    pub fn failed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_failed()).count()
    }

    /// Every member failed
    pub fn is_total_failure(&self) -> bool {
        !self.statuses.is_empty() && self.failed_count() == self.statuses.len()
    }

    /// Some, but not all, members failed
    pub fn is_partial_failure(&self) -> bool {
        let failed = self.failed_count();
        failed > 0 && failed < self.statuses.len()
    }

    /// Statuses of the failed members
    pub fn failures(&self) -> impl Iterator<Item = &MemberStatus> {
        self.statuses.iter().filter(|s| s.is_failed())
    }
}

/// Run every member concurrently and merge the survivors' outputs.
///
/// Never fails: member errors are recorded as statuses and their keys are
/// left out of the merged state.
pub async fn run_group(
    invoker: &TaskInvoker,
    members: &[TaskSpec],
    input: &str,
    caller_id: &str,
    context: &StateBlob,
) -> GroupOutcome {
    let calls = members.iter().map(|member| {
        invoker.invoke_with_state(&member.task, input, caller_id, context.clone())
    });
    let results = join_all(calls).await;

    let mut outcome = GroupOutcome::default();
    for (member, result) in members.iter().zip(results) {
        let key = member.output_key();
        match result {
            Ok(state) => {
                debug!(task = %member.task, %key, "Parallel member completed");
                outcome
                    .state
                    .insert(key.to_string(), extract_output(state, key, context));
                outcome.statuses.push(MemberStatus::ok(&member.task, key));
            }
            Err(e) => {
                warn!(task = %member.task, %key, error = %e, "Parallel member failed");
                outcome
                    .statuses
                    .push(MemberStatus::failed(&member.task, key, e.to_string()));
            }
        }
    }

    outcome
}
