//! Task invoker: one task, one session, create → run → fetch → delete.
//!
//! The session is held by a [`SessionGuard`] for the whole invocation, so
//! the delete is attempted on every exit path: success, failure at any
//! phase, or the invoking future being dropped.

use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Session, StateBlob};

use super::error::InvocationFailed;
use super::session::SessionClient;

/// Runs single tasks against the backend
#[derive(Clone)]
pub struct TaskInvoker {
    client: SessionClient,
}

impl TaskInvoker {
    pub fn new(client: SessionClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    /// Invoke a task on a fresh, empty session
    pub async fn invoke(
        &self,
        task_name: &str,
        input: &str,
        caller_id: &str,
    ) -> Result<StateBlob, InvocationFailed> {
        self.invoke_with_state(task_name, input, caller_id, StateBlob::new())
            .await
    }

    /// Invoke a task on a fresh session seeded with `state`.
    ///
    /// No retries: a failed invocation is reported to the caller, and no
    /// partial state is returned.
    #[instrument(skip(self, task_name, input, state), fields(task = %task_name))]
    pub async fn invoke_with_state(
        &self,
        task_name: &str,
        input: &str,
        caller_id: &str,
        state: StateBlob,
    ) -> Result<StateBlob, InvocationFailed> {
        let started = Instant::now();
        let session = self.client.allocate(task_name, caller_id, state);
        let guard = SessionGuard::new(self.client.clone(), session);

        let result = self.drive(guard.session(), input).await;
        guard.close().await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(state) => info!(duration_ms, keys = state.len(), "Task completed"),
            Err(e) => warn!(duration_ms, phase = %e.phase, error = %e.source, "Task failed"),
        }

        result
    }

    async fn drive(&self, session: &Session, input: &str) -> Result<StateBlob, InvocationFailed> {
        self.client.create(session).await?;
        self.client.dispatch(session, input).await?;
        self.client.fetch(session).await
    }
}

/// Scoped ownership of an open session.
///
/// [`close`](Self::close) deletes the session; if the guard is dropped
/// without being closed, the delete is spawned on the current runtime.
pub struct SessionGuard {
    client: SessionClient,
    session: Session,
    closed: bool,
}

impl SessionGuard {
    pub fn new(client: SessionClient, session: Session) -> Self {
        Self {
            client,
            session,
            closed: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Delete the session and wait for it.
    ///
    /// The delete runs on its own task, so cancelling this future does not
    /// cut the cleanup short.
    pub async fn close(mut self) {
        if let Some(handle) = self.spawn_close() {
            if let Err(e) = handle.await {
                warn!(session_id = %self.session.id, error = %e, "Session close task failed");
            }
        }
    }

    fn spawn_close(&mut self) -> Option<JoinHandle<()>> {
        if self.closed {
            return None;
        }
        self.closed = true;

        let client = self.client.clone();
        let session = self.session.clone();
        match Handle::try_current() {
            Ok(handle) => Some(handle.spawn(async move { client.close(&session).await })),
            Err(_) => {
                warn!(
                    session_id = %self.session.id,
                    "No async runtime available, session left open"
                );
                None
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            debug!(session_id = %self.session.id, "Invocation dropped, closing session in background");
            self.spawn_close();
        }
    }
}
