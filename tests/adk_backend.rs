//! ADK HTTP Backend Integration Tests
//!
//! Runs the HTTP backend against an in-process fake of the ADK session
//! API and checks the wire calls, error mapping and cleanup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentrelay::adapters::{AdkBackend, Backend};
use agentrelay::core::{Phase, SessionClient, TaskInvoker, TransportError};
use agentrelay::domain::{Session, SessionId, StateBlob};
use agentrelay::Orchestrator;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct FakeAdk {
    sessions: Arc<Mutex<HashMap<String, StateBlob>>>,
    created: Arc<Mutex<Vec<String>>>,
    fail_run: bool,
    run_delay: Option<Duration>,
}

impl FakeAdk {
    fn open_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

async fn create_session(
    State(adk): State<FakeAdk>,
    Path((app, user, id)): Path<(String, String, String)>,
    Json(state): Json<StateBlob>,
) -> Json<Value> {
    adk.sessions.lock().unwrap().insert(id.clone(), state.clone());
    adk.created
        .lock()
        .unwrap()
        .push(format!("{}/{}/{}", app, user, id));
    Json(json!({ "id": id, "appName": app, "userId": user, "state": state }))
}

async fn get_session(
    State(adk): State<FakeAdk>,
    Path((_app, _user, id)): Path<(String, String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let sessions = adk.sessions.lock().unwrap();
    let state = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(json!({ "id": id, "state": state })))
}

async fn delete_session(
    State(adk): State<FakeAdk>,
    Path((_app, _user, id)): Path<(String, String, String)>,
) -> StatusCode {
    match adk.sessions.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn run(
    State(adk): State<FakeAdk>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    if let Some(delay) = adk.run_delay {
        tokio::time::sleep(delay).await;
    }
    if adk.fail_run {
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "agent crashed".to_string()));
    }

    let app = body["appName"].as_str().unwrap_or_default();
    let session_id = body["sessionId"].as_str().unwrap_or_default();
    let text = body["newMessage"]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();

    let mut sessions = adk.sessions.lock().unwrap();
    let state = sessions
        .get_mut(session_id)
        .ok_or((StatusCode::NOT_FOUND, "no such session".to_string()))?;
    state.insert("reply".to_string(), json!(format!("{}: {}", app, text)));

    Ok(Json(json!([])))
}

async fn list_apps() -> Json<Value> {
    Json(json!(["essay_analyzer_agent", "search_agent"]))
}

async fn spawn_adk(adk: FakeAdk) -> String {
    let app = Router::new()
        .route(
            "/apps/:app/users/:user/sessions/:id",
            post(create_session).get(get_session).delete(delete_session),
        )
        .route("/run", post(run))
        .route("/list-apps", get(list_apps))
        .with_state(adk);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// A base URL nothing listens on
async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn invoker(backend: AdkBackend) -> TaskInvoker {
    TaskInvoker::new(SessionClient::new(Arc::new(backend)))
}

#[tokio::test]
async fn test_full_invocation_over_http() {
    let adk = FakeAdk::default();
    let url = spawn_adk(adk.clone()).await;
    let invoker = invoker(AdkBackend::new(&url));

    let mut seed = StateBlob::new();
    seed.insert("topic".to_string(), json!("rust"));

    let state = invoker
        .invoke_with_state("search_agent", "find crates", "u_test", seed)
        .await
        .unwrap();

    assert_eq!(state["topic"], json!("rust"));
    assert_eq!(state["reply"], json!("search_agent: find crates"));

    let created = adk.created.lock().unwrap().clone();
    assert_eq!(created.len(), 1);
    assert!(created[0].starts_with("search_agent/u_test/s_"));
    assert_eq!(adk.open_sessions(), 0);
}

#[tokio::test]
async fn test_delete_of_missing_session_is_ok() {
    let url = spawn_adk(FakeAdk::default()).await;
    let backend = AdkBackend::new(&url);
    let session = Session::new(SessionId::new("s_gone"), "search_agent", "u_test");

    assert!(backend.delete_session(&session).await.is_ok());

    // Fetching it is still an error
    let err = backend.fetch_state(&session).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_run_error_status_is_dispatch_failure() {
    let adk = FakeAdk {
        fail_run: true,
        ..Default::default()
    };
    let url = spawn_adk(adk.clone()).await;
    let invoker = invoker(AdkBackend::new(&url));

    let err = invoker
        .invoke("essay_analyzer_agent", "my essay", "u_test")
        .await
        .unwrap_err();

    assert_eq!(err.phase, Phase::Dispatch);
    match &err.source {
        TransportError::Status { status, body, .. } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "agent crashed");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(adk.open_sessions(), 0);
}

#[tokio::test]
async fn test_unreachable_backend() {
    let url = dead_url().await;

    let err = invoker(AdkBackend::new(&url))
        .invoke("search_agent", "hello", "u_test")
        .await
        .unwrap_err();
    assert_eq!(err.phase, Phase::Create);
    assert!(matches!(err.source, TransportError::Connect { .. }));

    let health = Orchestrator::new(Arc::new(AdkBackend::new(&url)))
        .health()
        .await;
    assert!(!health.healthy);
    assert_eq!(health.backend, "adk");
    assert!(health.error.is_some());
}

#[tokio::test]
async fn test_run_timeout() {
    let adk = FakeAdk {
        run_delay: Some(Duration::from_millis(500)),
        ..Default::default()
    };
    let url = spawn_adk(adk.clone()).await;
    let backend =
        AdkBackend::new(&url).with_timeouts(Duration::from_secs(5), Duration::from_millis(100));

    let err = invoker(backend)
        .invoke("search_agent", "slow", "u_test")
        .await
        .unwrap_err();

    assert_eq!(err.phase, Phase::Dispatch);
    assert!(matches!(
        err.source,
        TransportError::Timeout { timeout, .. } if timeout == Duration::from_millis(100)
    ));
    assert_eq!(adk.open_sessions(), 0);
}

#[tokio::test]
async fn test_health_lists_tasks() {
    let url = spawn_adk(FakeAdk::default()).await;

    let health = Orchestrator::new(Arc::new(AdkBackend::new(&url)))
        .health()
        .await;

    assert!(health.healthy);
    assert_eq!(health.tasks, vec!["essay_analyzer_agent", "search_agent"]);
    assert!(health.error.is_none());
}

#[tokio::test]
async fn test_path_segments_are_encoded() {
    let adk = FakeAdk::default();
    let url = spawn_adk(adk.clone()).await;
    let invoker = invoker(AdkBackend::new(&url));

    let state = invoker
        .invoke("search_agent", "hello", "team/a?b=1")
        .await
        .unwrap();

    assert_eq!(state["reply"], json!("search_agent: hello"));

    // The caller id arrives as one segment, not as extra path or a query
    let created = adk.created.lock().unwrap().clone();
    assert!(created[0].starts_with("search_agent/team/a?b=1/s_"));
    assert_eq!(adk.open_sessions(), 0);
}
