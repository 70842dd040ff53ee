//! Labeled status/data/message results handed to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::state::StateBlob;

/// Result of one pipeline, as seen by callers of the single and batch
/// operations. Either a success with data or an error with empty data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    status: ResponseStatus,
    data: StateBlob,
    #[serde(default)]
    message: String,
}

impl PipelineResponse {
    pub fn success(data: StateBlob, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            data,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: StateBlob::new(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn status(&self) -> ResponseStatus {
        self.status
    }

    pub fn data(&self) -> &StateBlob {
        &self.data
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_data(self) -> StateBlob {
        self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// One response per pipeline label
pub type BatchResult = BTreeMap<String, PipelineResponse>;

/// Backend liveness report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    /// Whether the backend answered the task listing
    pub healthy: bool,

    /// Backend name
    pub backend: String,

    /// Task names the backend exposes
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Why the backend could not be reached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
