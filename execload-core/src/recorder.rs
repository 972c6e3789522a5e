use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use execload_metrics::{MetricHandle, MetricKind, MetricsSnapshot, Registry};

use crate::error::Result;
use crate::executor::RequestOutcome;
use crate::realtime::{Point, PointSender};

pub const CHECKS: &str = "checks";
pub const HTTP_REQS: &str = "http_reqs";
pub const ITERATIONS: &str = "iterations";
pub const DROPPED_ITERATIONS: &str = "dropped_iterations";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";

pub const CHECK_NAME: &str = "response code was 2xx";

pub const TAG_SESSION_ID: &str = "sessionId";
pub const TAG_STATUS: &str = "status";

/// A response timing header and the trend it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSeries {
    pub header: &'static str,
    pub series: &'static str,
    /// Label stem used in the flattened summary.
    pub stem: &'static str,
}

pub const REQ_DURATION_STEM: &str = "ReqDuration";

pub const HEADER_SERIES: [HeaderSeries; 7] = [
    HeaderSeries {
        header: "X-Ms-Allocation-Time",
        series: "X_Ms_Allocation_Time",
        stem: "XMsAllocationTime",
    },
    HeaderSeries {
        header: "X-Ms-Container-Execution-Duration",
        series: "X_Ms_Container_Execution_Duration",
        stem: "XMsContainerExecutionDuration",
    },
    HeaderSeries {
        header: "X-Ms-Execution-Read-Response-Time",
        series: "X_Ms_Execution_Read_Response_Time",
        stem: "XMsExecutionReadResponseTime",
    },
    HeaderSeries {
        header: "X-Ms-Execution-Request-Time",
        series: "X_Ms_Execution_Request_Time",
        stem: "XMsExecutionRequestTime",
    },
    HeaderSeries {
        header: "X-Ms-Overall-Execution-Time",
        series: "X_Ms_Overall_Execution_Time",
        stem: "XMsOverallExecutionTime",
    },
    HeaderSeries {
        header: "X-Ms-Preparation-Time",
        series: "X_Ms_Preparation_Time",
        stem: "XMsPreparationTime",
    },
    HeaderSeries {
        header: "X-Ms-Total-Execution-Service-Time",
        series: "X_Ms_Total_Execution_Service_Time",
        stem: "XMsTotalExecutionServiceTime",
    },
];

/// Trend series in report order, paired with their summary stems.
pub fn trend_series() -> impl Iterator<Item = (&'static str, &'static str)> {
    std::iter::once((HTTP_REQ_DURATION, REQ_DURATION_STEM))
        .chain(HEADER_SERIES.iter().map(|h| (h.series, h.stem)))
}

/// Counters readable while the run is in flight, without touching the registry.
#[derive(Debug, Default)]
pub struct LiveCounters {
    requests: AtomicU64,
    failed: AtomicU64,
}

impl LiveCounters {
    pub fn requests_total(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn failed_total(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedOutcome {
    pub passed: bool,
    /// Trend samples appended for this outcome.
    pub samples: usize,
}

#[derive(Debug)]
struct Series {
    checks: MetricHandle,
    http_reqs: MetricHandle,
    iterations: MetricHandle,
    dropped_iterations: MetricHandle,
    req_duration: MetricHandle,
    headers: Vec<(HeaderSeries, MetricHandle)>,
}

/// Classifies outcomes and appends their telemetry to the run's registry.
#[derive(Debug)]
pub struct OutcomeRecorder {
    registry: Registry,
    series: Series,
    points: Option<PointSender>,
    live: Arc<LiveCounters>,
}

impl OutcomeRecorder {
    pub fn new() -> Result<Self> {
        let registry = Registry::default();
        let handle = |name: &str, kind: MetricKind| -> Result<MetricHandle> {
            Ok(registry.register_handle(name, kind)?)
        };

        // Registration order is the order series appear in the raw report.
        let checks = handle(CHECKS, MetricKind::Rate)?;
        let http_reqs = handle(HTTP_REQS, MetricKind::Counter)?;
        let iterations = handle(ITERATIONS, MetricKind::Counter)?;
        let dropped_iterations = handle(DROPPED_ITERATIONS, MetricKind::Counter)?;
        let req_duration = handle(HTTP_REQ_DURATION, MetricKind::Trend)?;
        let headers = HEADER_SERIES
            .iter()
            .map(|h| Ok((*h, handle(h.series, MetricKind::Trend)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            series: Series {
                checks,
                http_reqs,
                iterations,
                dropped_iterations,
                req_duration,
                headers,
            },
            registry,
            points: None,
            live: Arc::new(LiveCounters::default()),
        })
    }

    /// Forward every trend sample to a real-time point stream as well.
    #[must_use]
    pub fn with_points(mut self, points: PointSender) -> Self {
        self.points = Some(points);
        self
    }

    /// Share counters created by the caller, so progress can be wired up before the run.
    #[must_use]
    pub fn with_live(mut self, live: Arc<LiveCounters>) -> Self {
        self.live = live;
        self
    }

    pub fn live(&self) -> Arc<LiveCounters> {
        self.live.clone()
    }

    pub fn record(&self, outcome: &RequestOutcome) -> RecordedOutcome {
        let passed = outcome.passed();
        let s = &self.series;

        s.checks.add_check(passed);
        s.http_reqs.increment(1);
        s.iterations.increment(1);
        self.live.requests.fetch_add(1, Ordering::Relaxed);

        if !passed {
            self.live.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                session_id = %outcome.session_id,
                status = outcome.status,
                body = %outcome.body_lossy(),
                "check failed: {CHECK_NAME}"
            );
        }

        let status = outcome.status.to_string();
        let at = SystemTime::now();
        let mut samples = 0;

        if passed {
            let ms = outcome.latency.as_secs_f64() * 1_000.0;
            if self.append(&s.req_duration, HTTP_REQ_DURATION, ms, outcome, &status, at) {
                samples += 1;
            }
        }

        for (h, handle) in &s.headers {
            let Some(raw) = outcome.header(h.header) else {
                continue;
            };

            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => {
                    if self.append(handle, h.series, v, outcome, &status, at) {
                        samples += 1;
                    }
                }
                _ => tracing::warn!(
                    session_id = %outcome.session_id,
                    header = h.header,
                    value = raw,
                    "ignoring non-numeric timing header"
                ),
            }
        }

        RecordedOutcome { passed, samples }
    }

    fn append(
        &self,
        handle: &MetricHandle,
        metric: &'static str,
        value: f64,
        outcome: &RequestOutcome,
        status: &str,
        at: SystemTime,
    ) -> bool {
        let tags = self.registry.resolve_tags(&[
            (TAG_SESSION_ID, outcome.session_id.as_str()),
            (TAG_STATUS, status),
        ]);
        if !handle.add_sample_at(value, tags, at) {
            return false;
        }

        if let Some(points) = &self.points {
            // The writer outlives every sender, so a send can only fail during teardown.
            let _ = points.send(Point {
                metric,
                time: at.into(),
                value,
                session_id: outcome.session_id.clone(),
                status: outcome.status,
            });
        }
        true
    }

    pub fn record_dropped(&self, n: u64) {
        self.series.dropped_iterations.increment(n);
    }

    /// Ends the write phase. Dropping the point sender here lets the point writer finish.
    pub fn into_snapshot(self) -> MetricsSnapshot {
        let Self {
            registry,
            series,
            points,
            live: _,
        } = self;
        drop(series);
        drop(points);
        registry.into_snapshot()
    }
}
