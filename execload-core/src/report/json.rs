use serde::Serialize;

use execload_metrics::{MetricSeriesSummary, MetricValue};

use super::RunReport;
use crate::error::Result;
use crate::publish::PublishOutcome;
use crate::realtime::ExecutionRecord;
use crate::summary::{SummaryReport, format_timestamp};

#[derive(Debug, Serialize)]
pub struct RawReport<'a> {
    pub run: RawRun<'a>,
    pub metrics: Vec<RawSeries<'a>>,
    pub summary: &'a SummaryReport,
    pub publish: Vec<RawPublish<'a>>,
    pub executions: &'a [ExecutionRecord],
}

#[derive(Debug, Serialize)]
pub struct RawRun<'a> {
    pub run_id: &'a str,
    pub region: &'a str,
    pub scenario: &'a str,
    pub start_time: String,
    pub end_time: String,
    pub started_at: String,
    pub ended_at: String,
    pub elapsed_secs: f64,
    pub iterations: u64,
    pub dropped_iterations: u64,
}

#[derive(Debug, Serialize)]
pub struct RawSeries<'a> {
    pub name: &'a str,
    pub kind: String,
    pub tag_keys: &'a [String],
    #[serde(flatten)]
    pub values: RawValues,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RawValues {
    Counter {
        count: u64,
        rate: f64,
    },
    Rate {
        total: u64,
        passes: u64,
        fails: u64,
        rate: Option<f64>,
    },
    Trend {
        count: u64,
        min: f64,
        max: f64,
        med: f64,
        avg: f64,
        p90: f64,
        p95: f64,
        p98: f64,
        p99: f64,
        #[serde(rename = "p99.9")]
        p99_9: f64,
    },
    Empty {
        count: u64,
    },
}

#[derive(Debug, Serialize)]
pub struct RawPublish<'a> {
    pub url: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

fn raw_series<'a>(report: &RunReport, s: &'a MetricSeriesSummary) -> RawSeries<'a> {
    let values = match &s.values {
        MetricValue::Counter(count) => RawValues::Counter {
            count: *count,
            rate: report.per_second(*count),
        },
        MetricValue::Rate {
            total,
            passes,
            rate,
        } => RawValues::Rate {
            total: *total,
            passes: *passes,
            fails: total.saturating_sub(*passes),
            rate: *rate,
        },
        MetricValue::Trend(Some(t)) => RawValues::Trend {
            count: t.count,
            min: t.min,
            max: t.max,
            med: t.med,
            avg: t.avg,
            p90: t.p90,
            p95: t.p95,
            p98: t.p98,
            p99: t.p99,
            p99_9: t.p99_9,
        },
        MetricValue::Trend(None) => RawValues::Empty { count: 0 },
    };

    RawSeries {
        name: &s.name,
        kind: s.kind.to_string(),
        tag_keys: &s.tag_keys,
        values,
    }
}

impl<'a> RawReport<'a> {
    pub fn new(report: &'a RunReport, summary: &'a SummaryReport) -> Self {
        let run = &report.run;
        Self {
            run: RawRun {
                run_id: &run.run_id,
                region: &run.region,
                scenario: &report.scenario,
                start_time: format_timestamp(&run.start),
                end_time: format_timestamp(&run.end),
                started_at: format_timestamp(&report.timing.started_at),
                ended_at: format_timestamp(&report.timing.ended_at),
                elapsed_secs: report.timing.elapsed.as_secs_f64(),
                iterations: report.iterations,
                dropped_iterations: report.dropped_iterations,
            },
            metrics: report.series.iter().map(|s| raw_series(report, s)).collect(),
            summary,
            publish: report
                .publish
                .iter()
                .map(|p| match p {
                    PublishOutcome::Published { url, status } => RawPublish {
                        url: url.as_str(),
                        ok: true,
                        status: Some(*status),
                        reason: None,
                    },
                    PublishOutcome::Failed { url, reason } => RawPublish {
                        url: url.as_str(),
                        ok: false,
                        status: None,
                        reason: Some(reason.as_str()),
                    },
                })
                .collect(),
            executions: &report.executions,
        }
    }
}

pub fn raw_json(report: &RunReport, summary: &SummaryReport) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&RawReport::new(report, summary))?)
}

/// `[[label, "value"], ...]` in summary order.
pub fn flattened_json(summary: &SummaryReport) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&summary.flattened())?)
}
