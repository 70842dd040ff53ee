//! Backend sessions.
//!
//! A session is an ephemeral execution context on the backend. It is
//! created right before a task runs and deleted right after; it is never
//! reused across invocations.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::StateBlob;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One backend session, owned by the invocation that opened it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,

    /// Task (backend app) the session belongs to
    pub task_name: String,

    /// Caller (backend user) the session is scoped to
    pub caller_id: String,

    /// Initial state the session was created with
    pub state: StateBlob,
}

impl Session {
    pub fn new(id: SessionId, task_name: impl Into<String>, caller_id: impl Into<String>) -> Self {
        Self {
            id,
            task_name: task_name.into(),
            caller_id: caller_id.into(),
            state: StateBlob::new(),
        }
    }

    /// Seed the session with an initial state
    pub fn with_state(mut self, state: StateBlob) -> Self {
        self.state = state;
        self
    }
}
