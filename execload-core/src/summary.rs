use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use execload_metrics::{MetricsSnapshot, summarize_trend};
use serde::Serialize;
use serde::ser::SerializeMap as _;

use crate::config::WorkloadConfig;
use crate::recorder::{CHECKS, trend_series};

#[derive(Debug, Clone, PartialEq)]
pub enum SummaryValue {
    Text(String),
    Integer(u64),
    Number(f64),
}

impl fmt::Display for SummaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
        }
    }
}

impl Serialize for SummaryValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(v) => serializer.serialize_str(v),
            Self::Integer(v) => serializer.serialize_u64(*v),
            Self::Number(v) => serializer.serialize_f64(*v),
        }
    }
}

/// Flattened run summary. Row order is part of the output contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryReport {
    rows: Vec<(String, SummaryValue)>,
}

impl SummaryReport {
    pub fn rows(&self) -> &[(String, SummaryValue)] {
        &self.rows
    }

    pub fn get(&self, label: &str) -> Option<&SummaryValue> {
        self.rows.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(l, _)| l.as_str())
    }

    /// `[label, value]` pairs with every value stringified.
    pub fn flattened(&self) -> Vec<[String; 2]> {
        self.rows
            .iter()
            .map(|(l, v)| [l.clone(), v.to_string()])
            .collect()
    }

    fn push(&mut self, label: impl Into<String>, value: SummaryValue) {
        self.rows.push((label.into(), value));
    }
}

/// Serializes as one JSON object with keys in row order.
impl Serialize for SummaryReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (label, value) in &self.rows {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

/// Run metadata the summary is stamped with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    pub run_id: String,
    pub region: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RunInfo {
    /// Stamps the summary with `clock()` as its end time. Without a configured start time the
    /// same instant is used for the start as well.
    pub fn resolve(cfg: &WorkloadConfig, clock: impl Fn() -> DateTime<Utc>) -> Self {
        let end = clock();
        let start = cfg.test_start_time.unwrap_or_else(|| {
            tracing::info!("no test start time configured, using the current time");
            end
        });

        Self {
            run_id: cfg.run_id.clone(),
            region: cfg.region.clone(),
            start,
            end,
        }
    }

    pub fn duration_minutes(&self) -> f64 {
        let ms = (self.end - self.start).num_milliseconds().max(0);
        round_to(ms as f64 / 60_000.0, 2)
    }
}

pub const STAT_SUFFIXES: [&str; 9] = ["Min", "Max", "Med", "Avg", "P90", "P95", "P98", "P99", "P99_9"];

fn round_to(v: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (v * scale).round() / scale
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reduces a finished run to its flattened summary. Pure: the same snapshot and run info
/// always give the same rows.
pub fn aggregate(snapshot: &MetricsSnapshot, run: &RunInfo) -> SummaryReport {
    let mut report = SummaryReport::default();
    let (total, passed) = snapshot.rate(CHECKS);

    report.push("RunID", SummaryValue::Text(run.run_id.clone()));
    report.push("StartTime", SummaryValue::Text(format_timestamp(&run.start)));
    report.push("EndTime", SummaryValue::Text(format_timestamp(&run.end)));
    report.push("DurationMinutes", SummaryValue::Number(run.duration_minutes()));
    report.push("Region", SummaryValue::Text(run.region.clone()));
    report.push("RequestsTotal", SummaryValue::Integer(total));
    report.push("RequestsPassed", SummaryValue::Integer(passed));
    report.push("RequestsFailed", SummaryValue::Integer(total.saturating_sub(passed)));

    for (series, stem) in trend_series() {
        let Some(t) = summarize_trend(&snapshot.trend_values(series)) else {
            continue;
        };
        let stats = [
            t.min, t.max, t.med, t.avg, t.p90, t.p95, t.p98, t.p99, t.p99_9,
        ];
        for (suffix, v) in STAT_SUFFIXES.iter().zip(stats) {
            report.push(format!("{stem}_{suffix}"), SummaryValue::Number(round_to(v, 3)));
        }
    }

    report
}
