use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const PATH_ROOT: &str = "/";
pub const PATH_EXECUTE: &str = "/execute";
pub const PATH_PUBLISH_SUMMARY: &str = "/publish-metrics-summary";
pub const PATH_PUBLISH_EVENTHUBS: &str = "/publish-eventhubs";
pub const PATH_PUBLISH_REAL_TIME: &str = "/publish-metrics-real-time";

/// Timing headers the emulated service reports, with the value each one carries.
pub const TIMING_HEADERS: [(&str, &str); 7] = [
    ("X-Ms-Allocation-Time", "3"),
    ("X-Ms-Container-Execution-Duration", "12"),
    ("X-Ms-Execution-Read-Response-Time", "1.5"),
    ("X-Ms-Execution-Request-Time", "2.25"),
    ("X-Ms-Overall-Execution-Time", "18"),
    ("X-Ms-Preparation-Time", "4"),
    ("X-Ms-Total-Execution-Service-Time", "21"),
];

/// How the emulated endpoints answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Behavior {
    /// Status returned by `/execute`.
    pub execute_status: u16,
    /// Whether `/execute` attaches the timing headers.
    pub timing_headers: bool,
    /// Status returned by the publish endpoints.
    pub sink_status: u16,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            execute_status: 200,
            timing_headers: true,
            sink_status: 200,
        }
    }
}

impl Behavior {
    /// `/execute` fails with `status` and no timing headers.
    pub fn failing_execute(status: u16) -> Self {
        Self {
            execute_status: status,
            timing_headers: false,
            ..Self::default()
        }
    }

    pub fn failing_sink(status: u16) -> Self {
        Self {
            sink_status: status,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    code: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse<'a> {
    identifier: &'a str,
    stdout: &'a str,
    location: Option<&'a str>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What the server has been sent so far.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    execute_total: Arc<AtomicU64>,
    execute_bad_request: Arc<AtomicU64>,
    sessions: Arc<Mutex<Vec<String>>>,
    locations: Arc<Mutex<Vec<String>>>,
    summaries: Arc<Mutex<Vec<serde_json::Value>>>,
    real_time_run_ids: Arc<Mutex<Vec<String>>>,
}

impl TestServerStats {
    pub fn execute_total(&self) -> u64 {
        self.execute_total.load(Ordering::Relaxed)
    }

    pub fn execute_bad_request(&self) -> u64 {
        self.execute_bad_request.load(Ordering::Relaxed)
    }

    /// `IDENTIFIER` header of every execute call, in arrival order.
    pub fn sessions(&self) -> Vec<String> {
        lock(&self.sessions).clone()
    }

    pub fn locations(&self) -> Vec<String> {
        lock(&self.locations).clone()
    }

    /// Bodies received by either summary endpoint.
    pub fn summaries(&self) -> Vec<serde_json::Value> {
        lock(&self.summaries).clone()
    }

    pub fn real_time_run_ids(&self) -> Vec<String> {
        lock(&self.real_time_run_ids).clone()
    }
}

#[derive(Debug, Clone)]
struct AppState {
    stats: TestServerStats,
    behavior: Behavior,
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn handle_root() -> &'static str {
    "OK"
}

async fn handle_execute(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    app.stats.execute_total.fetch_add(1, Ordering::Relaxed);

    let req: ExecuteRequest = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => {
            app.stats.execute_bad_request.fetch_add(1, Ordering::Relaxed);
            return (StatusCode::BAD_REQUEST, "bad json").into_response();
        }
    };

    let identifier = headers
        .get("identifier")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    lock(&app.stats.sessions).push(identifier.clone());
    if let Some(location) = &req.location {
        lock(&app.stats.locations).push(location.clone());
    }

    let code = status(app.behavior.execute_status);
    if !code.is_success() {
        return (code, "service unavailable").into_response();
    }

    let stdout = if req.code == "1+2" { "3" } else { "" };
    let payload = serde_json::to_vec(&ExecuteResponse {
        identifier: &identifier,
        stdout,
        location: req.location.as_deref(),
    })
    .unwrap_or_default();

    let mut res = (code, Bytes::from(payload)).into_response();
    let out = res.headers_mut();
    out.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if app.behavior.timing_headers {
        for (name, value) in TIMING_HEADERS {
            if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                out.insert(name, HeaderValue::from_static(value));
            }
        }
    }
    res
}

async fn handle_publish_summary(
    State(app): State<AppState>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(v) => lock(&app.stats.summaries).push(v),
        Err(_) => return (StatusCode::BAD_REQUEST, "bad json"),
    }
    (status(app.behavior.sink_status), "OK")
}

async fn handle_publish_real_time(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    let run_id = headers
        .get("runid")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    lock(&app.stats.real_time_run_ids).push(run_id);
    (status(app.behavior.sink_status), "OK")
}

pub fn router(stats: TestServerStats, behavior: Behavior) -> Router {
    Router::new()
        .route(PATH_ROOT, get(handle_root))
        .route(PATH_EXECUTE, post(handle_execute))
        .route(PATH_PUBLISH_SUMMARY, post(handle_publish_summary))
        .route(PATH_PUBLISH_EVENTHUBS, post(handle_publish_summary))
        .route(PATH_PUBLISH_REAL_TIME, get(handle_publish_real_time))
        .with_state(AppState { stats, behavior })
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(Behavior::default()).await
    }

    pub async fn start_with(behavior: Behavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), behavior);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
