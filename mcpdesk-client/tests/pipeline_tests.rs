//! Request pipeline against a live backend and under concurrent 401s

mod helpers;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router as AxumRouter};
use helpers::{desk, init_tracing, spawn_server};
use mcpdesk_client::navigation::Navigator;
use mcpdesk_client::pipeline::notice::NO_RESPONSE_MESSAGE;
use mcpdesk_client::{
    ApiClient, HttpRequest, HttpResponse, HttpSender, KeyValueStorage, MemoryStorage, Notice,
    NoticeLog, Router, SessionStore,
};
use mcpdesk_core::{DeskError, DeskResult, ErrorContext, NavigationConfig, SessionCredential};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

#[derive(Default)]
struct Backend {
    seen_authorization: Mutex<Vec<Option<String>>>,
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "secret" {
        let username = body["username"].as_str().unwrap_or_default();
        (
            StatusCode::OK,
            Json(json!({
                "code": 0,
                "message": "ok",
                "data": {
                    "user_id": 7,
                    "username": username,
                    "is_admin": username == "admin",
                    "tenants": [],
                    "token": format!("tok-{}", username)
                }
            })),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": 401, "message": "invalid username or password"})),
        )
    }
}

async fn status(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    backend
        .seen_authorization
        .lock()
        .unwrap()
        .push(authorization(&headers));
    Json(json!({
        "code": 0,
        "data": {"running": true, "port": 8002, "enabled_tools": ["add"], "enabled_tools_count": 1}
    }))
}

async fn current_user(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match authorization(&headers).as_deref() {
        Some("Bearer tok-admin") => (
            StatusCode::OK,
            Json(json!({
                "code": 0,
                "data": {"user_id": 7, "username": "admin", "is_admin": true, "tenants": []}
            })),
        ),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "token expired"})),
        ),
    }
}

async fn forbidden() -> (StatusCode, Json<Value>) {
    (StatusCode::FORBIDDEN, Json(json!({"detail": "admin only"})))
}

async fn broken_logout() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn backend() -> (Arc<Backend>, String) {
    let state = Arc::new(Backend::default());
    let app = AxumRouter::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(broken_logout))
        .route("/api/auth/current-user", get(current_user))
        .route("/api/v1/mcp/service/status", get(status))
        .route("/api/v1/mcp/service/list", get(forbidden))
        .with_state(state.clone());
    let address = spawn_server(app).await;
    (state, address)
}

#[tokio::test]
async fn test_bearer_header_follows_the_session() {
    let (backend, address) = backend().await;
    let desk = desk(&address);
    let client = &desk.client;

    let status = client.services().status().await.unwrap();
    assert!(status.running);

    let login = client.auth().login("ops", "secret").await.unwrap();
    assert!(!login.is_admin);
    assert!(client.session().is_authenticated());

    client.services().status().await.unwrap();

    assert_eq!(
        *backend.seen_authorization.lock().unwrap(),
        vec![None, Some("Bearer tok-ops".to_string())]
    );
}

#[tokio::test]
async fn test_failed_login_rejects_without_recovery() {
    let (_, address) = backend().await;
    let desk = desk(&address);

    let err = desk.client.auth().login("ops", "wrong").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!desk.client.session().is_authenticated());
    assert!(desk.notices.notices().is_empty());
    assert!(desk.client.router().history().is_empty());
}

#[tokio::test]
async fn test_expired_token_recovers_to_login() {
    let (_, address) = backend().await;
    let desk = desk(&address);
    let client = &desk.client;

    client.auth().login("ops", "secret").await.unwrap();
    client.router().push("/tools").unwrap();

    let err = client.auth().current_user().await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthorized: token expired");

    assert!(!client.session().is_authenticated());
    assert_eq!(client.router().history(), vec!["/login".to_string()]);
    assert_eq!(desk.notices.notices().len(), 1);

    // nothing protected renders afterwards
    assert_eq!(client.router().push("/tools").unwrap().landed, "/login");
}

#[tokio::test]
async fn test_admin_session_is_accepted() {
    let (_, address) = backend().await;
    let desk = desk(&address);

    desk.client.auth().login("admin", "secret").await.unwrap();
    let me = desk.client.auth().current_user().await.unwrap();

    assert!(me.is_admin);
    assert!(desk.client.session().is_admin());
    assert_eq!(desk.client.router().push("/users").unwrap().landed, "/users");
}

#[tokio::test]
async fn test_forbidden_notifies_and_keeps_session() {
    let (_, address) = backend().await;
    let desk = desk(&address);

    desk.client.auth().login("ops", "secret").await.unwrap();
    let err = desk.client.services().list_services(Some(3)).await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert!(desk.client.session().is_authenticated());
    let notices = desk.notices.notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(
        notices[0].message,
        "You do not have permission to access this resource"
    );
}

#[tokio::test]
async fn test_logout_clears_even_when_backend_fails() {
    let (_, address) = backend().await;
    let desk = desk(&address);

    desk.client.auth().login("ops", "secret").await.unwrap();
    desk.client.auth().logout().await.unwrap();

    assert!(!desk.client.session().is_authenticated());
}

#[tokio::test]
async fn test_network_failure_notifies_and_propagates() {
    let desk = desk("http://127.0.0.1:1");
    desk.client
        .session()
        .save(&SessionCredential::new("1", "tok", false))
        .unwrap();

    let err = desk.client.services().status().await.unwrap_err();
    assert!(matches!(err, DeskError::Network { .. }));
    assert!(desk.client.session().is_authenticated());
    assert_eq!(
        desk.notices.notices(),
        vec![Notice::error("Error", NO_RESPONSE_MESSAGE)]
    );
    assert!(desk.client.router().history().is_empty());
}

/// Holds every request until all of them are in flight, then answers 401
struct ExpiredTokenSender {
    barrier: Barrier,
    calls: AtomicUsize,
}

#[async_trait]
impl HttpSender for ExpiredTokenSender {
    async fn send(&self, _request: HttpRequest) -> DeskResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.barrier.wait().await;
        Ok(HttpResponse::new(401, r#"{"detail": "token expired"}"#))
    }
}

/// Memory storage that counts removals
#[derive(Default)]
struct CountingStorage {
    inner: MemoryStorage,
    removes: AtomicUsize,
}

impl KeyValueStorage for CountingStorage {
    fn get(&self, key: &str) -> DeskResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> DeskResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> DeskResult<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }
}

/// Memory storage whose entries cannot be removed
#[derive(Default)]
struct StuckStorage {
    inner: MemoryStorage,
}

impl KeyValueStorage for StuckStorage {
    fn get(&self, key: &str) -> DeskResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> DeskResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, _key: &str) -> DeskResult<()> {
        Err(DeskError::Storage {
            message: "read-only medium".to_string(),
            source: None,
            context: ErrorContext::new("stuck_storage"),
        })
    }
}

async fn concurrent_401s(n: usize) {
    init_tracing();

    let storage = Arc::new(CountingStorage::default());
    let store = Arc::new(SessionStore::new(storage.clone(), "userInfo"));
    store
        .save(&SessionCredential::new("7", "expired-token", false))
        .unwrap();

    let router = Arc::new(Router::admin_console(store.clone(), &NavigationConfig::default()));
    router.push("/tools").unwrap();

    let notices = Arc::new(NoticeLog::new());
    let sender = Arc::new(ExpiredTokenSender {
        barrier: Barrier::new(n),
        calls: AtomicUsize::new(0),
    });
    let client = ApiClient::builder(sender.clone())
        .with_session(store.clone(), notices.clone(), router.clone(), "/login")
        .build();

    let tasks: Vec<_> = (0..n)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .execute(HttpRequest::get(format!("/api/v1/mcp/tools/{}", i)))
                    .await
            })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap();
        assert!(matches!(result, Err(DeskError::Unauthorized { .. })));
    }

    assert_eq!(sender.calls.load(Ordering::SeqCst), n);
    assert_eq!(storage.removes.load(Ordering::SeqCst), 1);
    assert_eq!(notices.notices().len(), 1);
    assert_eq!(router.history(), vec!["/login".to_string()]);
    assert!(!store.is_authenticated());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_parallel_401s_recover_once() {
    concurrent_401s(3).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_parallel_401s_recover_once() {
    concurrent_401s(32).await;
}

#[tokio::test]
async fn test_single_401_recovers() {
    concurrent_401s(1).await;
}

#[tokio::test]
async fn test_login_after_recovery_rearms_it() {
    init_tracing();

    let store = Arc::new(SessionStore::new(Arc::new(MemoryStorage::new()), "userInfo"));
    let router = Arc::new(Router::admin_console(store.clone(), &NavigationConfig::default()));
    let notices = Arc::new(NoticeLog::new());
    let sender = Arc::new(ExpiredTokenSender {
        barrier: Barrier::new(1),
        calls: AtomicUsize::new(0),
    });
    let client = ApiClient::builder(sender)
        .with_session(store.clone(), notices.clone(), router.clone(), "/login")
        .build();

    for token in ["first", "second"] {
        store
            .save(&SessionCredential::new("7", token, false))
            .unwrap();
        let err = client.execute(HttpRequest::get("/x")).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!store.is_authenticated());
    }

    assert_eq!(notices.notices().len(), 2);
    assert_eq!(router.current().as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_failed_removal_still_ends_the_session() {
    init_tracing();

    let store = Arc::new(SessionStore::new(Arc::new(StuckStorage::default()), "userInfo"));
    store
        .save(&SessionCredential::new("7", "dead-token", false))
        .unwrap();
    let router = Arc::new(Router::admin_console(store.clone(), &NavigationConfig::default()));
    let notices = Arc::new(NoticeLog::new());
    let sender = Arc::new(ExpiredTokenSender {
        barrier: Barrier::new(1),
        calls: AtomicUsize::new(0),
    });
    let client = ApiClient::builder(sender)
        .with_session(store.clone(), notices.clone(), router.clone(), "/login")
        .build();

    for _ in 0..3 {
        let err = client.execute(HttpRequest::get("/x")).await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    assert!(!store.is_authenticated());
    assert_eq!(notices.notices().len(), 1);
    assert_eq!(router.history(), vec!["/login".to_string()]);
}
