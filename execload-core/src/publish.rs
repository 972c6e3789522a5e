use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::config::Endpoints;
use crate::executor::Transport;
use crate::http::HttpRequest;
use crate::summary::SummaryReport;

/// Header carrying the run id on the real-time signal.
pub const RUN_ID_HEADER: &str = "RunID";

/// Result of one publish attempt. A failure never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published { url: String, status: u16 },
    Failed { url: String, reason: String },
}

impl PublishOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Published { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published { url, status } => write!(f, "{url}: published ({status})"),
            Self::Failed { url, reason } => write!(f, "{url}: failed ({reason})"),
        }
    }
}

/// Best-effort delivery of run results to the configured sinks.
#[derive(Debug)]
pub struct Publisher<T: Transport> {
    transport: T,
    summary_sinks: Vec<String>,
    real_time_url: String,
    timeout: Duration,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, endpoints: &Endpoints, timeout: Duration) -> Self {
        Self {
            transport,
            summary_sinks: endpoints.summary_sinks.clone(),
            real_time_url: endpoints.real_time_url.clone(),
            timeout,
        }
    }

    /// POSTs the summary to every sink, one attempt each, in configuration order.
    pub async fn publish_summary(&self, report: &SummaryReport) -> Vec<PublishOutcome> {
        let body = match serde_json::to_vec(report) {
            Ok(body) => Bytes::from(body),
            Err(err) => {
                let reason = format!("failed to encode summary: {err}");
                return self
                    .summary_sinks
                    .iter()
                    .map(|url| failed(url, reason.clone()))
                    .collect();
            }
        };

        let mut outcomes = Vec::with_capacity(self.summary_sinks.len());
        for url in &self.summary_sinks {
            let req = HttpRequest::post(url, body.clone())
                .header("Content-Type", "application/json")
                .timeout(self.timeout);
            outcomes.push(self.send(url, req).await);
        }
        outcomes
    }

    /// Asks the sink to ingest the run's out-of-band points.
    pub async fn publish_real_time(&self, run_id: &str) -> PublishOutcome {
        let req = HttpRequest::get(&self.real_time_url)
            .header(RUN_ID_HEADER, run_id)
            .timeout(self.timeout);
        self.send(&self.real_time_url, req).await
    }

    async fn send(&self, url: &str, req: HttpRequest) -> PublishOutcome {
        match self.transport.send(req).await {
            Ok(res) if res.is_success() => {
                tracing::info!(url, status = res.status, "published");
                PublishOutcome::Published {
                    url: url.to_string(),
                    status: res.status,
                }
            }
            Ok(res) => {
                let body = String::from_utf8_lossy(&res.body);
                failed(url, format!("status {}: {}", res.status, body.trim()))
            }
            Err(err) => failed(url, err.to_string()),
        }
    }
}

fn failed(url: &str, reason: String) -> PublishOutcome {
    tracing::error!(url, reason = %reason, "publish failed");
    PublishOutcome::Failed {
        url: url.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{self, HttpResponse};
    use std::future::Future;
    use std::sync::Mutex;

    struct ScriptedTransport {
        status: u16,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for ScriptedTransport {
        fn send(
            &self,
            req: HttpRequest,
        ) -> impl Future<Output = http::Result<HttpResponse>> + Send {
            let fails = req.url.contains("unreachable");
            self.seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(req);
            let status = self.status;
            async move {
                if fails {
                    return Err(http::Error::InvalidUrl("unreachable".to_string()));
                }
                Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: Bytes::from_static(b"sink says no\n"),
                    latency: Duration::ZERO,
                })
            }
        }
    }

    fn publisher(status: u16, sinks: &[&str]) -> Publisher<ScriptedTransport> {
        Publisher::new(
            ScriptedTransport {
                status,
                seen: Mutex::new(Vec::new()),
            },
            &Endpoints {
                target_url: "http://svc".to_string(),
                summary_sinks: sinks.iter().map(|s| s.to_string()).collect(),
                real_time_url: "http://svc/publish-metrics-real-time".to_string(),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn each_sink_gets_one_post_and_failures_are_isolated() {
        let p = publisher(200, &["http://a/publish", "http://unreachable/publish"]);
        let outcomes = p.publish_summary(&SummaryReport::default()).await;

        assert_eq!(
            outcomes[0],
            PublishOutcome::Published {
                url: "http://a/publish".to_string(),
                status: 200
            }
        );
        assert!(outcomes[1].is_failed());
        assert_eq!(outcomes[1].url(), "http://unreachable/publish");

        let seen = p
            .transport
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method, ::http::Method::POST);
        assert_eq!(seen[0].body.as_ref(), b"{}");
    }

    #[tokio::test]
    async fn non_2xx_sink_response_is_a_failure() {
        let p = publisher(500, &["http://a/publish"]);
        let outcomes = p.publish_summary(&SummaryReport::default()).await;
        assert_eq!(
            outcomes,
            [PublishOutcome::Failed {
                url: "http://a/publish".to_string(),
                reason: "status 500: sink says no".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn real_time_signal_is_a_get_with_the_run_id() {
        let p = publisher(200, &[]);
        let outcome = p.publish_real_time("R1").await;
        assert!(!outcome.is_failed());

        let seen = p
            .transport
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(seen[0].method, ::http::Method::GET);
        assert_eq!(seen[0].url, "http://svc/publish-metrics-real-time");
        assert!(
            seen[0]
                .headers
                .iter()
                .any(|(k, v)| k == RUN_ID_HEADER && v == "R1")
        );
    }
}
