//! Backend interfaces for the remote agent runner.
//!
//! The orchestrator only consumes the session contract below; how the
//! backend computes outputs is not its concern.

pub mod adk;

use async_trait::async_trait;

use crate::core::error::TransportError;
use crate::domain::{Session, StateBlob};

// Re-export the ADK adapter
pub use adk::AdkBackend;

/// Session-scoped operations exposed by an execution backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Create the session, seeded with `session.state`
    async fn create_session(&self, session: &Session) -> Result<(), TransportError>;

    /// Execute the session's task on the input text
    async fn run(&self, session: &Session, input: &str) -> Result<(), TransportError>;

    /// Current state attached to the session; an empty map is valid
    async fn fetch_state(&self, session: &Session) -> Result<StateBlob, TransportError>;

    /// Delete the session
    async fn delete_session(&self, session: &Session) -> Result<(), TransportError>;

    /// Task names the backend currently exposes (liveness check)
    async fn list_tasks(&self) -> Result<Vec<String>, TransportError>;
}
