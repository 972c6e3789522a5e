use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;

use crate::config::WorkloadConfig;
use crate::http::{self, HttpClient, HttpRequest, HttpResponse};
use crate::runner::IterationContext;

/// Code submitted on every iteration.
pub const EXECUTE_CODE: &str = "1+2";

/// Correlation header carrying the session id.
pub const IDENTIFIER_HEADER: &str = "IDENTIFIER";

/// Sends one request and reports what came back. Latency is measured by the transport.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, req: HttpRequest) -> impl Future<Output = http::Result<HttpResponse>> + Send;
}

impl Transport for HttpClient {
    fn send(&self, req: HttpRequest) -> impl Future<Output = http::Result<HttpResponse>> + Send {
        self.request(req)
    }
}

/// Result of one iteration's request. `status == 0` means the transport itself failed and
/// `body` holds the error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOutcome {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub session_id: String,
    pub latency: Duration,
}

impl RequestOutcome {
    pub fn passed(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    location: &'a str,
}

#[derive(Debug)]
pub struct RequestExecutor<T: Transport> {
    transport: T,
    execute_url: String,
    body: Bytes,
    timeout: Duration,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, execute_url: String, region: &str, timeout: Duration) -> Self {
        let body = serde_json::to_vec(&ExecuteRequest {
            code: EXECUTE_CODE,
            location: region,
        })
        .map(Bytes::from)
        .unwrap_or_default();

        Self {
            transport,
            execute_url,
            body,
            timeout,
        }
    }

    pub fn from_config(transport: T, cfg: &WorkloadConfig) -> Self {
        Self::new(
            transport,
            cfg.endpoints.execute_url(),
            &cfg.region,
            cfg.request_timeout,
        )
    }

    pub fn payload(&self) -> &Bytes {
        &self.body
    }

    /// Issues exactly one request. Non-2xx responses and transport failures are returned as
    /// outcomes, never as errors.
    pub async fn execute(&self, ctx: &IterationContext) -> RequestOutcome {
        let req = HttpRequest::post(&self.execute_url, self.body.clone())
            .header("Content-Type", "application/json")
            .header(IDENTIFIER_HEADER, &ctx.session_id)
            .timeout(self.timeout);

        let started = Instant::now();
        match self.transport.send(req).await {
            Ok(res) => RequestOutcome {
                status: res.status,
                headers: res.headers,
                body: res.body,
                session_id: ctx.session_id.clone(),
                latency: res.latency,
            },
            Err(err) => {
                tracing::debug!(session_id = %ctx.session_id, error = %err, "transport failure");
                RequestOutcome {
                    status: 0,
                    headers: Vec::new(),
                    body: Bytes::from(err.to_string()),
                    session_id: ctx.session_id.clone(),
                    latency: started.elapsed(),
                }
            }
        }
    }
}
