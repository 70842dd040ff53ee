//! agentrelay - Session-scoped orchestrator for agent-runner backends
//!
//! Coordinates calls to a remote, stateful task-execution backend. Every
//! task runs on its own backend session, which is created right before
//! the run and deleted right after, whatever the outcome.
//!
//! # Architecture
//!
//! - A task invocation drives one session through create, run, fetch and
//!   delete
//! - Pipelines chain stages; a stage is one task or a parallel group whose
//!   outputs are joined before the next stage
//! - A batch runs several labeled pipelines on the same input, each
//!   reporting its own success or error
//!
//! # Modules
//!
//! - `adapters`: Backend contract and the ADK HTTP backend
//! - `core`: Orchestration logic (Session, Invoker, Aggregator, Orchestrator, Batch)
//! - `domain`: Data structures (Session, StateBlob, PipelineRun, PipelineResponse)
//! - `server`: HTTP API
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run a pipeline
//! echo "input text" | agentrelay run parallel
//!
//! # Run every configured pipeline
//! agentrelay batch --input patient.txt
//!
//! # Serve the HTTP API
//! agentrelay serve --address 0.0.0.0:8002
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;

// Re-export main types at crate root for convenience
pub use adapters::{AdkBackend, Backend};
pub use core::{Orchestrator, Pipeline, PipelineError, PipelineSet, Stage, TaskSpec};
pub use domain::{BatchResult, PipelineResponse, PipelineRun, ResponseStatus, StateBlob};
