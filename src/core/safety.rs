//! Limits and timeouts for backend calls and pipelines.
//!
//! Bounds what a single request may do:
//! - Input size
//! - Number of stages and parallel members
//! - Per-call timeouts towards the backend

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pipeline::{Pipeline, Stage};

/// Limits applied to every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum input size in bytes (default: 1MB)
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,

    /// Maximum number of stages per pipeline (default: 32)
    #[serde(default = "default_max_stages")]
    pub max_stages: usize,

    /// Maximum members in one parallel group (default: 16)
    #[serde(default = "default_max_parallel_members")]
    pub max_parallel_members: usize,

    /// Timeout for create, fetch, delete and list calls (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for the run call, which does the actual work (default: 600s)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

fn default_max_input_bytes() -> u64 {
    1024 * 1024
}
fn default_max_stages() -> usize {
    32
}
fn default_max_parallel_members() -> usize {
    16
}
fn default_request_timeout() -> u64 {
    30
}
fn default_run_timeout() -> u64 {
    600
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: default_max_input_bytes(),
            max_stages: default_max_stages(),
            max_parallel_members: default_max_parallel_members(),
            request_timeout_seconds: default_request_timeout(),
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

impl SafetyLimits {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_seconds)
    }

    /// Validate input against the size limit
    pub fn validate_input(&self, input: &str) -> Result<(), SafetyViolation> {
        let size = input.len() as u64;
        if size > self.max_input_bytes {
            return Err(SafetyViolation::MaxInputBytes {
                actual: size,
                limit: self.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Check a pipeline's shape against stage and fan-out limits
    pub fn check_pipeline(&self, pipeline: &Pipeline) -> Result<(), SafetyViolation> {
        if pipeline.stages.len() > self.max_stages {
            return Err(SafetyViolation::MaxStages {
                actual: pipeline.stages.len(),
                limit: self.max_stages,
            });
        }

        for stage in &pipeline.stages {
            if let Stage::Parallel(group) = stage {
                if group.members.len() > self.max_parallel_members {
                    return Err(SafetyViolation::MaxParallelMembers {
                        actual: group.members.len(),
                        limit: self.max_parallel_members,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Limit violations, raised before any session is opened
#[derive(Debug, Clone, Error)]
pub enum SafetyViolation {
    #[error("Maximum input bytes exceeded: {actual} > {limit}")]
    MaxInputBytes { actual: u64, limit: u64 },

    #[error("Maximum stages exceeded: {actual} > {limit}")]
    MaxStages { actual: usize, limit: usize },

    #[error("Maximum parallel members exceeded: {actual} > {limit}")]
    MaxParallelMembers { actual: usize, limit: usize },
}
