use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use execload_metrics::MetricsSnapshot;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt as _, AsyncWriteExt as _, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::recorder::{HTTP_REQ_DURATION, TAG_SESSION_ID, TAG_STATUS, trend_series};

/// One trend sample as it leaves the recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub metric: &'static str,
    pub time: DateTime<Utc>,
    pub value: f64,
    pub session_id: String,
    pub status: u16,
}

pub type PointSender = mpsc::UnboundedSender<Point>;
pub type PointReceiver = mpsc::UnboundedReceiver<Point>;

pub fn point_channel() -> (PointSender, PointReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Serialize, Deserialize)]
struct PointLine<M, S> {
    #[serde(rename = "type")]
    kind: S,
    metric: M,
    data: PointData<S>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointData<S> {
    time: DateTime<Utc>,
    value: f64,
    tags: PointTags<S>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointTags<S> {
    #[serde(rename = "sessionId")]
    session_id: S,
    status: S,
}

const POINT_TYPE: &str = "Point";

fn encode(point: &Point) -> Result<Vec<u8>> {
    let status = point.status.to_string();
    let line = PointLine {
        kind: POINT_TYPE,
        metric: point.metric,
        data: PointData {
            time: point.time,
            value: point.value,
            tags: PointTags {
                session_id: point.session_id.as_str(),
                status: status.as_str(),
            },
        },
    };
    let mut buf = serde_json::to_vec(&line)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Appends points to an NDJSON file until every sender is gone.
#[derive(Debug)]
pub struct PointWriter {
    path: PathBuf,
    handle: JoinHandle<Result<u64>>,
}

impl PointWriter {
    /// Creates (truncating) the file up front so a run with no samples still leaves one behind.
    pub async fn spawn(path: impl Into<PathBuf>, mut rx: PointReceiver) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(&path).await?;

        let handle = tokio::spawn(async move {
            let mut out = BufWriter::new(file);
            let mut written = 0u64;
            while let Some(point) = rx.recv().await {
                out.write_all(&encode(&point)?).await?;
                written += 1;
            }
            out.flush().await?;
            Ok(written)
        });

        Ok(Self { path, handle })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits for the stream to close and returns how many points were written.
    pub async fn finish(self) -> Result<u64> {
        let written = self.handle.await??;
        tracing::debug!(path = %self.path.display(), written, "real-time points flushed");
        Ok(written)
    }
}

/// Reads back a point file. Lines for metrics outside the trend table are ignored.
pub async fn read_points(path: &Path) -> Result<Vec<Point>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut points = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: PointLine<String, String> = serde_json::from_str(&line)?;
        if parsed.kind != POINT_TYPE {
            continue;
        }
        let Some((metric, _)) = trend_series().find(|(name, _)| *name == parsed.metric) else {
            continue;
        };
        let Ok(status) = parsed.data.tags.status.parse::<u16>() else {
            tracing::warn!(line = %line, "skipping point with a non-numeric status tag");
            continue;
        };
        points.push(Point {
            metric,
            time: parsed.data.time,
            value: parsed.data.value,
            session_id: parsed.data.tags.session_id,
            status,
        });
    }

    Ok(points)
}

/// Every trend sample of a finished run, in report order.
pub fn points_from_snapshot(snapshot: &MetricsSnapshot) -> Vec<Point> {
    trend_series()
        .flat_map(|(metric, _)| {
            snapshot.trend(metric).iter().filter_map(move |s| {
                Some(Point {
                    metric,
                    time: s.at.into(),
                    value: s.value,
                    session_id: s.tag(TAG_SESSION_ID)?.to_string(),
                    status: s.tag(TAG_STATUS)?.parse().ok()?,
                })
            })
        })
        .collect()
}

/// Per-session view of one iteration's telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    #[serde(rename = "TIMESTAMP")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "RunID")]
    pub run_id: String,
    #[serde(rename = "SessionID")]
    pub session_id: String,
    #[serde(rename = "Passed")]
    pub passed: bool,
    #[serde(rename = "ReqDuration_Ms")]
    pub req_duration_ms: f64,
    #[serde(rename = "XMsAllocationTime_Ms")]
    pub x_ms_allocation_time_ms: f64,
    #[serde(rename = "XMsContainerExecutionDuration_Ms")]
    pub x_ms_container_execution_duration_ms: f64,
    #[serde(rename = "XMsExecutionReadResponseTime_Ms")]
    pub x_ms_execution_read_response_time_ms: f64,
    #[serde(rename = "XMsExecutionRequestTime_Ms")]
    pub x_ms_execution_request_time_ms: f64,
    #[serde(rename = "XMsOverallExecutionTime_Ms")]
    pub x_ms_overall_execution_time_ms: f64,
    #[serde(rename = "XMsPreparationTime_Ms")]
    pub x_ms_preparation_time_ms: f64,
    #[serde(rename = "XMsTotalExecutionServiceTime_Ms")]
    pub x_ms_total_execution_service_time_ms: f64,
}

impl ExecutionRecord {
    fn slot(&mut self, metric: &str) -> Option<&mut f64> {
        Some(match metric {
            HTTP_REQ_DURATION => &mut self.req_duration_ms,
            "X_Ms_Allocation_Time" => &mut self.x_ms_allocation_time_ms,
            "X_Ms_Container_Execution_Duration" => &mut self.x_ms_container_execution_duration_ms,
            "X_Ms_Execution_Read_Response_Time" => &mut self.x_ms_execution_read_response_time_ms,
            "X_Ms_Execution_Request_Time" => &mut self.x_ms_execution_request_time_ms,
            "X_Ms_Overall_Execution_Time" => &mut self.x_ms_overall_execution_time_ms,
            "X_Ms_Preparation_Time" => &mut self.x_ms_preparation_time_ms,
            "X_Ms_Total_Execution_Service_Time" => &mut self.x_ms_total_execution_service_time_ms,
            _ => return None,
        })
    }
}

/// Groups points into one record per session, sorted by session id.
///
/// A session that produced no samples has no record. The timestamp is the earliest sample
/// time and `passed` follows the status tag.
pub fn collate_executions<'a>(
    points: impl IntoIterator<Item = &'a Point>,
    run_id: &str,
) -> Vec<ExecutionRecord> {
    let mut by_session: BTreeMap<&str, ExecutionRecord> = BTreeMap::new();

    for p in points {
        let rec = by_session
            .entry(p.session_id.as_str())
            .or_insert_with(|| ExecutionRecord {
                run_id: run_id.to_string(),
                session_id: p.session_id.clone(),
                ..ExecutionRecord::default()
            });

        let Some(slot) = rec.slot(p.metric) else {
            continue;
        };
        *slot = p.value;
        rec.passed = (200..300).contains(&p.status);
        rec.timestamp = Some(rec.timestamp.map_or(p.time, |t| t.min(p.time)));
    }

    by_session.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn point(metric: &'static str, session: &str, value: f64, secs: i64) -> Point {
        Point {
            metric,
            time: Utc
                .timestamp_opt(1_700_000_000 + secs, 0)
                .single()
                .unwrap_or_else(|| panic!("bad timestamp")),
            value,
            session_id: session.to_string(),
            status: 200,
        }
    }

    #[test]
    fn point_lines_use_the_k6_json_shape() {
        let bytes = encode(&point("X_Ms_Preparation_Time", "R_4", 12.5, 0))
            .unwrap_or_else(|e| panic!("encode: {e}"));
        let text = String::from_utf8(bytes).unwrap_or_else(|e| panic!("utf8: {e}"));

        assert!(text.ends_with('\n'));
        let v: serde_json::Value =
            serde_json::from_str(text.trim_end()).unwrap_or_else(|e| panic!("json: {e}"));
        assert_eq!(v["type"], "Point");
        assert_eq!(v["metric"], "X_Ms_Preparation_Time");
        assert_eq!(v["data"]["value"], 12.5);
        assert_eq!(v["data"]["tags"]["sessionId"], "R_4");
        assert_eq!(v["data"]["tags"]["status"], "200");
        assert!(
            v["data"]["time"]
                .as_str()
                .is_some_and(|t| t.starts_with("2023-11-14T22:13:20"))
        );
    }

    #[test]
    fn executions_are_grouped_per_session_and_sorted() {
        let mut failed = point("X_Ms_Allocation_Time", "R_0", 3.0, 5);
        failed.status = 503;
        let points = vec![
            point(HTTP_REQ_DURATION, "R_1", 40.0, 2),
            point("X_Ms_Preparation_Time", "R_1", 7.0, 1),
            failed,
        ];

        let records = collate_executions(&points, "RUN");

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_id, "R_0");
        assert!(!records[0].passed);
        assert_eq!(records[0].x_ms_allocation_time_ms, 3.0);
        assert_eq!(records[0].req_duration_ms, 0.0);

        let r1 = &records[1];
        assert_eq!(r1.run_id, "RUN");
        assert!(r1.passed);
        assert_eq!(r1.req_duration_ms, 40.0);
        assert_eq!(r1.x_ms_preparation_time_ms, 7.0);
        assert_eq!(r1.timestamp, Some(points[1].time));
    }

    #[test]
    fn records_serialize_with_the_sink_field_names() {
        let records = collate_executions(&[point(HTTP_REQ_DURATION, "S", 1.0, 0)], "RUN");
        let v = serde_json::to_value(&records[0]).unwrap_or_else(|e| panic!("json: {e}"));
        for key in [
            "TIMESTAMP",
            "RunID",
            "SessionID",
            "Passed",
            "ReqDuration_Ms",
            "XMsAllocationTime_Ms",
            "XMsTotalExecutionServiceTime_Ms",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn writer_flushes_every_point_once_senders_are_dropped() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("nested").join("points.json");

        let (tx, rx) = point_channel();
        let writer = PointWriter::spawn(&path, rx)
            .await
            .unwrap_or_else(|e| panic!("spawn: {e}"));

        let sent = [
            point(HTTP_REQ_DURATION, "R_0", 10.0, 0),
            point("X_Ms_Overall_Execution_Time", "R_0", 4.0, 0),
            point(HTTP_REQ_DURATION, "R_1", 11.0, 1),
        ];
        for p in &sent {
            tx.send(p.clone()).unwrap_or_else(|e| panic!("send: {e}"));
        }
        drop(tx);

        let written = writer
            .finish()
            .await
            .unwrap_or_else(|e| panic!("finish: {e}"));
        assert_eq!(written, 3);

        let back = read_points(&path)
            .await
            .unwrap_or_else(|e| panic!("read: {e}"));
        assert_eq!(back, sent);
    }
}
