//! In-memory backend for integration tests.
//!
//! Records every call in order, answers fetches with the seeded state plus
//! the task's configured output, and injects faults per task and phase.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use agentrelay::adapters::Backend;
use agentrelay::core::TransportError;
use agentrelay::domain::{Session, StateBlob};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPhase {
    Create,
    Run,
    Fetch,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create {
        task: String,
        session_id: String,
        state: StateBlob,
    },
    Run {
        task: String,
        session_id: String,
        input: String,
    },
    Fetch {
        task: String,
        session_id: String,
    },
    Delete {
        task: String,
        session_id: String,
    },
    List,
}

impl Call {
    pub fn task(&self) -> Option<&str> {
        match self {
            Call::Create { task, .. }
            | Call::Run { task, .. }
            | Call::Fetch { task, .. }
            | Call::Delete { task, .. } => Some(task),
            Call::List => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Call::Create { session_id, .. }
            | Call::Run { session_id, .. }
            | Call::Fetch { session_id, .. }
            | Call::Delete { session_id, .. } => Some(session_id),
            Call::List => None,
        }
    }
}

#[derive(Default)]
pub struct FakeBackend {
    outputs: HashMap<String, StateBlob>,
    faults: HashMap<String, FaultPhase>,
    hanging: HashSet<String>,
    run_delay: Option<Duration>,
    unreachable: bool,

    calls: Mutex<Vec<Call>>,
    sessions: Mutex<HashMap<String, StateBlob>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub fn blob(value: Value) -> StateBlob {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

fn refused(task: &str) -> TransportError {
    TransportError::Connect {
        url: format!("fake://backend/{}", task),
        message: "connection refused".to_string(),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys the task adds to its session state when run
    pub fn with_output(mut self, task: &str, output: Value) -> Self {
        self.outputs.insert(task.to_string(), blob(output));
        self
    }

    pub fn failing(mut self, task: &str, phase: FaultPhase) -> Self {
        self.faults.insert(task.to_string(), phase);
        self
    }

    /// The task's run call never completes
    pub fn hanging(mut self, task: &str) -> Self {
        self.hanging.insert(task.to_string());
        self
    }

    pub fn with_run_delay(mut self, delay: Duration) -> Self {
        self.run_delay = Some(delay);
        self
    }

    /// Every call fails as if the backend were down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, task: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.task() == Some(task))
            .collect()
    }

    pub fn count(&self, task: &str, phase: FaultPhase) -> usize {
        self.calls_for(task)
            .iter()
            .filter(|c| {
                matches!(
                    (c, phase),
                    (Call::Create { .. }, FaultPhase::Create)
                        | (Call::Run { .. }, FaultPhase::Run)
                        | (Call::Fetch { .. }, FaultPhase::Fetch)
                        | (Call::Delete { .. }, FaultPhase::Delete)
                )
            })
            .count()
    }

    /// Sessions created but not yet deleted
    pub fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, task: &str, phase: FaultPhase) -> Result<(), TransportError> {
        if self.unreachable || self.faults.get(task) == Some(&phase) {
            return Err(refused(task));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_session(&self, session: &Session) -> Result<(), TransportError> {
        self.record(Call::Create {
            task: session.task_name.clone(),
            session_id: session.id.to_string(),
            state: session.state.clone(),
        });
        self.check(&session.task_name, FaultPhase::Create)?;

        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.to_string(), session.state.clone());
        Ok(())
    }

    async fn run(&self, session: &Session, input: &str) -> Result<(), TransportError> {
        self.record(Call::Run {
            task: session.task_name.clone(),
            session_id: session.id.to_string(),
            input: input.to_string(),
        });
        self.check(&session.task_name, FaultPhase::Run)?;

        if self.hanging.contains(&session.task_name) {
            std::future::pending::<()>().await;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(output) = self.outputs.get(&session.task_name) {
            if let Some(state) = self.sessions.lock().unwrap().get_mut(session.id.as_str()) {
                for (key, value) in output {
                    state.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn fetch_state(&self, session: &Session) -> Result<StateBlob, TransportError> {
        self.record(Call::Fetch {
            task: session.task_name.clone(),
            session_id: session.id.to_string(),
        });
        self.check(&session.task_name, FaultPhase::Fetch)?;

        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(session.id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_session(&self, session: &Session) -> Result<(), TransportError> {
        self.record(Call::Delete {
            task: session.task_name.clone(),
            session_id: session.id.to_string(),
        });
        self.check(&session.task_name, FaultPhase::Delete)?;

        self.sessions.lock().unwrap().remove(session.id.as_str());
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<String>, TransportError> {
        self.record(Call::List);
        if self.unreachable {
            return Err(refused("list-apps"));
        }

        let mut tasks: Vec<String> = self.outputs.keys().cloned().collect();
        tasks.sort();
        Ok(tasks)
    }
}
