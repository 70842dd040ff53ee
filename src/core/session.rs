//! Session client: the four backend operations behind one handle.
//!
//! Create, dispatch and fetch failures surface as [`InvocationFailed`];
//! close never fails from the caller's point of view.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::adapters::Backend;
use crate::domain::{Session, SessionId, StateBlob};

use super::error::{InvocationFailed, Phase, TransportError};

/// Strategy for allocating session identifiers
pub trait SessionIdGenerator: Send + Sync {
    fn next_id(&self) -> SessionId;
}

/// `s_` followed by the 32 hex digits of a random v4 uuid
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSessionIds;

impl SessionIdGenerator for RandomSessionIds {
    fn next_id(&self) -> SessionId {
        SessionId::new(format!("s_{}", Uuid::new_v4().simple()))
    }
}

/// Deterministic ids (`<prefix>1`, `<prefix>2`, ...) for tests and replays
#[derive(Debug)]
pub struct SequentialSessionIds {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialSessionIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl SessionIdGenerator for SequentialSessionIds {
    fn next_id(&self) -> SessionId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        SessionId::new(format!("{}{}", self.prefix, n))
    }
}

/// Handle over the backend's session operations
#[derive(Clone)]
pub struct SessionClient {
    backend: Arc<dyn Backend>,
    ids: Arc<dyn SessionIdGenerator>,
}

impl SessionClient {
    /// Create a client with random session ids
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_ids(backend, Arc::new(RandomSessionIds))
    }

    pub fn with_ids(backend: Arc<dyn Backend>, ids: Arc<dyn SessionIdGenerator>) -> Self {
        Self { backend, ids }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Allocate a fresh session handle without touching the backend
    pub fn allocate(&self, task_name: &str, caller_id: &str, state: StateBlob) -> Session {
        Session::new(self.ids.next_id(), task_name, caller_id).with_state(state)
    }

    /// Allocate a session and create it on the backend.
    ///
    /// If creation fails, a delete is still attempted before the error is
    /// returned.
    pub async fn open(&self, task_name: &str, caller_id: &str) -> Result<Session, InvocationFailed> {
        self.open_with_state(task_name, caller_id, StateBlob::new())
            .await
    }

    /// Like [`open`](Self::open), seeding the session with `state`
    pub async fn open_with_state(
        &self,
        task_name: &str,
        caller_id: &str,
        state: StateBlob,
    ) -> Result<Session, InvocationFailed> {
        let session = self.allocate(task_name, caller_id, state);
        match self.create(&session).await {
            Ok(()) => Ok(session),
            Err(e) => {
                self.close(&session).await;
                Err(e)
            }
        }
    }

    /// Create an allocated session on the backend
    pub async fn create(&self, session: &Session) -> Result<(), InvocationFailed> {
        debug!(task = %session.task_name, session_id = %session.id, "Opening session");
        self.backend
            .create_session(session)
            .await
            .map_err(|e| InvocationFailed::new(&session.task_name, Phase::Create, e))
    }

    /// Run the session's task on `input`; may take as long as the backend needs
    pub async fn dispatch(&self, session: &Session, input: &str) -> Result<(), InvocationFailed> {
        debug!(task = %session.task_name, session_id = %session.id, "Dispatching input");
        self.backend
            .run(session, input)
            .await
            .map_err(|e| InvocationFailed::new(&session.task_name, Phase::Dispatch, e))
    }

    /// Retrieve the state attached to the session
    pub async fn fetch(&self, session: &Session) -> Result<StateBlob, InvocationFailed> {
        self.backend
            .fetch_state(session)
            .await
            .map_err(|e| InvocationFailed::new(&session.task_name, Phase::Fetch, e))
    }

    /// Delete the session. Best effort: failures are logged, never returned.
    pub async fn close(&self, session: &Session) {
        match self.backend.delete_session(session).await {
            Ok(()) => {
                debug!(task = %session.task_name, session_id = %session.id, "Session closed");
            }
            Err(e) => {
                warn!(
                    task = %session.task_name,
                    session_id = %session.id,
                    error = %e,
                    "Failed to close session"
                );
            }
        }
    }

    /// Task names the backend exposes
    pub async fn list_tasks(&self) -> Result<Vec<String>, TransportError> {
        self.backend.list_tasks().await
    }
}
