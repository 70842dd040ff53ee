//! Domain types for the agentrelay orchestrator.
//!
//! This module contains the core data structures:
//! - Session: Ephemeral backend execution context
//! - State: Keyed outputs and how they merge
//! - Run: Pipeline execution record and member statuses
//! - Response: Labeled results returned to callers

pub mod response;
pub mod run;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use response::{BackendHealth, BatchResult, PipelineResponse, ResponseStatus};
pub use run::{MemberOutcome, MemberStatus, PipelineRun};
pub use session::{Session, SessionId};
pub use state::StateBlob;
