use serde::Serialize;
use std::io::Write as _;
use std::sync::Arc;

use execload_core::{
    LiveCounters, ProgressFn, ProgressUpdate, PublishOutcome, RunOutcome, Scenario,
    ScenarioProgress, SummaryReport, WorkloadConfig,
};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _cfg: &WorkloadConfig, _scenario: &Scenario) {}

    fn progress(&self, live: Arc<LiveCounters>) -> Option<ProgressFn> {
        Some(Arc::new(move |u| {
            let line = build_progress_line(&u, &live);
            emit_json_line(&line);
        }))
    }

    fn print_summary(&self, outcome: &RunOutcome, _console: &[u8]) -> anyhow::Result<()> {
        let line = build_summary_line(outcome);
        emit_json_line(&line);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonProgressLine {
    pub kind: &'static str,
    pub scenario: &'static str,
    pub elapsed_secs: u64,
    pub interval_secs: f64,

    pub iterations_total: u64,
    pub iterations_per_sec: f64,
    pub requests_total: u64,
    pub failed_total: u64,

    pub workers: u64,
    pub busy_workers: Option<u64>,
    pub dropped_iterations_total: Option<u64>,
    pub current_target: Option<u64>,
}

fn build_progress_line(u: &ProgressUpdate, live: &LiveCounters) -> JsonProgressLine {
    let (workers, busy_workers, dropped_iterations_total, current_target) = match &u.progress {
        ScenarioProgress::FixedIterations { workers, .. } => (*workers, None, None, None),
        ScenarioProgress::ArrivalRate {
            stage,
            busy_workers,
            workers,
            dropped_iterations_total,
            ..
        } => (
            *workers,
            Some(*busy_workers),
            Some(*dropped_iterations_total),
            stage.as_ref().map(|s| s.current_target),
        ),
    };

    JsonProgressLine {
        kind: "progress",
        scenario: u.scenario,
        elapsed_secs: u.elapsed.as_secs(),
        interval_secs: u.interval.as_secs_f64(),
        iterations_total: u.iterations_total,
        iterations_per_sec: u.iterations_per_sec_now,
        requests_total: live.requests_total(),
        failed_total: live.failed_total(),
        workers,
        busy_workers,
        dropped_iterations_total,
        current_target,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    pub run_id: &'a str,
    pub scenario: &'a str,
    pub elapsed_secs: f64,

    pub checks_total: u64,
    pub checks_failed: u64,
    pub http_reqs: u64,
    pub iterations: u64,
    pub dropped_iterations: u64,
    pub points_written: Option<u64>,

    pub summary: &'a SummaryReport,
    pub publish: Vec<JsonPublish<'a>>,
    pub artifacts: Vec<JsonArtifact>,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonPublish<'a> {
    pub url: &'a str,
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonArtifact {
    pub kind: String,
    pub path: Option<String>,
    pub ok: bool,
}

fn build_summary_line(outcome: &RunOutcome) -> JsonSummaryLine<'_> {
    let report = &outcome.report;

    JsonSummaryLine {
        kind: "summary",
        run_id: &report.run.run_id,
        scenario: &report.scenario,
        elapsed_secs: report.timing.elapsed.as_secs_f64(),
        checks_total: report.checks_total,
        checks_failed: report.checks_failed(),
        http_reqs: report.http_reqs,
        iterations: report.iterations,
        dropped_iterations: report.dropped_iterations,
        points_written: outcome.points_written,
        summary: &outcome.summary,
        publish: report
            .publish
            .iter()
            .map(|p: &PublishOutcome| JsonPublish {
                url: p.url(),
                ok: !p.is_failed(),
            })
            .collect(),
        artifacts: outcome
            .artifacts
            .iter()
            .map(|a| JsonArtifact {
                kind: a.kind().to_string(),
                path: a.path().map(|p| p.display().to_string()),
                ok: !a.is_failed(),
            })
            .collect(),
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
