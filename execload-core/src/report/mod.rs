//! Artifact rendering. Each artifact is written independently; one failing does not stop the
//! others.

mod html;
mod json;
mod junit;
mod text;

use std::io::Write;
use std::path::{Path, PathBuf};

use execload_metrics::{MetricSeriesSummary, MetricsSnapshot};

use crate::config::OutputConfig;
use crate::publish::PublishOutcome;
use crate::realtime::{ExecutionRecord, collate_executions, points_from_snapshot};
use crate::recorder::{CHECKS, DROPPED_ITERATIONS, HTTP_REQS, ITERATIONS};
use crate::runner::RunTiming;
use crate::summary::{RunInfo, SummaryReport};

pub use html::escape as html_escape;
pub use json::{RawReport, flattened_json, raw_json};
pub use junit::render as render_junit;
pub use text::render as render_text;

/// Everything known about a finished run, read from its snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run: RunInfo,
    pub scenario: String,
    pub timing: RunTiming,
    pub series: Vec<MetricSeriesSummary>,
    pub checks_total: u64,
    pub checks_passed: u64,
    pub http_reqs: u64,
    pub iterations: u64,
    pub dropped_iterations: u64,
    pub executions: Vec<ExecutionRecord>,
    pub publish: Vec<PublishOutcome>,
}

impl RunReport {
    pub fn new(
        run: RunInfo,
        scenario: &str,
        timing: RunTiming,
        snapshot: &MetricsSnapshot,
    ) -> Self {
        let (checks_total, checks_passed) = snapshot.rate(CHECKS);
        let executions = collate_executions(&points_from_snapshot(snapshot), &run.run_id);

        Self {
            scenario: scenario.to_string(),
            series: snapshot.summarize(),
            checks_total,
            checks_passed,
            http_reqs: snapshot.counter(HTTP_REQS),
            iterations: snapshot.counter(ITERATIONS),
            dropped_iterations: snapshot.counter(DROPPED_ITERATIONS),
            executions,
            publish: Vec::new(),
            run,
            timing,
        }
    }

    pub fn checks_failed(&self) -> u64 {
        self.checks_total.saturating_sub(self.checks_passed)
    }

    /// Count per second of wall-clock run time.
    pub fn per_second(&self, count: u64) -> f64 {
        count as f64 / self.timing.elapsed.as_secs_f64().max(1e-9)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
    Console,
    RawJson,
    Junit,
    MetricsJson,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    Written {
        kind: ArtifactKind,
        path: Option<PathBuf>,
    },
    Failed {
        kind: ArtifactKind,
        path: Option<PathBuf>,
        reason: String,
    },
}

impl ArtifactOutcome {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Written { kind, .. } | Self::Failed { kind, .. } => *kind,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written { path, .. } | Self::Failed { path, .. } => path.as_deref(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    fn from_result(kind: ArtifactKind, path: Option<PathBuf>, res: crate::Result<()>) -> Self {
        match res {
            Ok(()) => Self::Written { kind, path },
            Err(err) => {
                let reason = err.to_string();
                tracing::error!(
                    artifact = %kind,
                    path = ?path,
                    reason = %reason,
                    "failed to write artifact"
                );
                Self::Failed { kind, path, reason }
            }
        }
    }
}

fn write_file(path: &Path, contents: &[u8]) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Writes the console summary and the four file artifacts, in that order.
pub fn emit_all(
    report: &RunReport,
    summary: &SummaryReport,
    outputs: &OutputConfig,
    console: &mut dyn Write,
) -> Vec<ArtifactOutcome> {
    let mut outcomes = Vec::with_capacity(5);

    let text = render_text(report, summary);
    let res = console
        .write_all(text.as_bytes())
        .and_then(|()| console.flush())
        .map_err(crate::Error::from);
    outcomes.push(ArtifactOutcome::from_result(ArtifactKind::Console, None, res));

    let path = outputs.raw_json_path();
    let res = raw_json(report, summary).and_then(|bytes| write_file(&path, &bytes));
    outcomes.push(ArtifactOutcome::from_result(
        ArtifactKind::RawJson,
        Some(path),
        res,
    ));

    let path = outputs.junit_path();
    let res = render_junit(report, summary).and_then(|bytes| write_file(&path, &bytes));
    outcomes.push(ArtifactOutcome::from_result(
        ArtifactKind::Junit,
        Some(path),
        res,
    ));

    let path = outputs.metrics_json_path();
    let res = flattened_json(summary).and_then(|bytes| write_file(&path, &bytes));
    outcomes.push(ArtifactOutcome::from_result(
        ArtifactKind::MetricsJson,
        Some(path),
        res,
    ));

    let path = outputs.html_path();
    let res = write_file(&path, html::render(report, summary).as_bytes());
    outcomes.push(ArtifactOutcome::from_result(
        ArtifactKind::Html,
        Some(path),
        res,
    ));

    let written = outcomes.iter().filter(|o| !o.is_failed()).count();
    tracing::info!(written, total = outcomes.len(), "artifacts emitted");
    outcomes
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::time::{Duration, SystemTime};

    use chrono::TimeZone as _;
    use chrono::Utc;
    use execload_metrics::{MetricKind, MetricsSnapshot, SeriesData, SeriesSnapshot, TrendSample};

    use super::RunReport;
    use crate::recorder::{
        CHECKS, DROPPED_ITERATIONS, HTTP_REQ_DURATION, HTTP_REQS, ITERATIONS, TAG_SESSION_ID,
        TAG_STATUS,
    };
    use crate::runner::RunTiming;
    use crate::summary::{RunInfo, SummaryReport, aggregate};

    fn sample(value: f64, session: &str, status: &str) -> TrendSample {
        TrendSample {
            value,
            tags: vec![
                (TAG_SESSION_ID.into(), session.into()),
                (TAG_STATUS.into(), status.into()),
            ],
            at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    pub(crate) fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot::new(vec![
            SeriesSnapshot {
                name: CHECKS.to_string(),
                kind: MetricKind::Rate,
                data: SeriesData::Rate {
                    total: 3,
                    passes: 2,
                },
            },
            SeriesSnapshot {
                name: HTTP_REQS.to_string(),
                kind: MetricKind::Counter,
                data: SeriesData::Counter(3),
            },
            SeriesSnapshot {
                name: ITERATIONS.to_string(),
                kind: MetricKind::Counter,
                data: SeriesData::Counter(3),
            },
            SeriesSnapshot {
                name: DROPPED_ITERATIONS.to_string(),
                kind: MetricKind::Counter,
                data: SeriesData::Counter(0),
            },
            SeriesSnapshot {
                name: HTTP_REQ_DURATION.to_string(),
                kind: MetricKind::Trend,
                data: SeriesData::Trend(vec![sample(12.5, "R<1>_0", "200"), sample(20.0, "R<1>_1", "200")]),
            },
        ])
    }

    pub(crate) fn report() -> (RunReport, SummaryReport) {
        let at = |s: i64| {
            Utc.timestamp_opt(1_700_000_000 + s, 0)
                .single()
                .unwrap_or_else(|| panic!("bad timestamp"))
        };
        let run = RunInfo {
            run_id: "R<1>".to_string(),
            region: "west & us".to_string(),
            start: at(0),
            end: at(60),
        };
        let timing = RunTiming {
            started_at: at(0),
            ended_at: at(2),
            elapsed: Duration::from_secs(2),
            iterations: 3,
            dropped_iterations: 0,
        };
        let snap = snapshot();
        let summary = aggregate(&snap, &run);
        (RunReport::new(run, "constant", timing, &snap), summary)
    }
}
