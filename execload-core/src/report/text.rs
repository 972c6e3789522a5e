use std::fmt::Write as _;

use execload_metrics::{MetricKind, MetricValue};

use super::RunReport;
use crate::recorder::CHECK_NAME;
use crate::summary::{SummaryReport, format_timestamp};

fn format_ms(v: f64) -> String {
    if v >= 1_000.0 {
        format!("{:.2}s", v / 1_000.0)
    } else {
        format!("{v:.2}ms")
    }
}

/// Console summary: run header, check tally, counters, then one line per trend.
pub fn render(report: &RunReport, summary: &SummaryReport) -> String {
    let mut out = String::new();
    let run = &report.run;

    writeln!(out, "summary").ok();
    writeln!(out, "  run: {} ({})", run.run_id, report.scenario).ok();
    writeln!(out, "  region: {}", run.region).ok();
    writeln!(
        out,
        "  window: {} .. {}",
        format_timestamp(&run.start),
        format_timestamp(&run.end)
    )
    .ok();
    writeln!(
        out,
        "  elapsed: {}",
        humantime::format_duration(std::time::Duration::from_millis(
            report.timing.elapsed.as_millis() as u64
        ))
    )
    .ok();

    let status = if report.checks_failed() > 0 {
        "FAIL"
    } else {
        "OK"
    };
    out.push_str("\nchecks\n");
    writeln!(
        out,
        "    {CHECK_NAME}: pass={} fail={} [{status}]",
        report.checks_passed,
        report.checks_failed()
    )
    .ok();

    out.push_str("\nmetrics\n");
    for s in &report.series {
        match (&s.kind, &s.values) {
            (MetricKind::Counter, MetricValue::Counter(v)) => {
                writeln!(
                    out,
                    "    {} = {v} ({:.2}/s)",
                    s.name,
                    report.per_second(*v)
                )
                .ok();
            }
            (MetricKind::Rate, MetricValue::Rate { total, passes, rate }) => {
                let pct = rate.map(|r| r * 100.0).unwrap_or(0.0);
                writeln!(out, "    {} = {pct:.2}% ({passes}/{total})", s.name).ok();
            }
            (MetricKind::Trend, MetricValue::Trend(Some(t))) => {
                writeln!(
                    out,
                    "    {} = min={} med={} avg={} p90={} p95={} p99={} max={} (n={})",
                    s.name,
                    format_ms(t.min),
                    format_ms(t.med),
                    format_ms(t.avg),
                    format_ms(t.p90),
                    format_ms(t.p95),
                    format_ms(t.p99),
                    format_ms(t.max),
                    t.count
                )
                .ok();
            }
            (MetricKind::Trend, MetricValue::Trend(None)) => {
                writeln!(out, "    {} = n/a", s.name).ok();
            }
            _ => {}
        }
    }

    if !report.publish.is_empty() {
        out.push_str("\npublish\n");
        for p in &report.publish {
            writeln!(out, "    {p}").ok();
        }
    }

    writeln!(out, "\n{} summary rows", summary.rows().len()).ok();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishOutcome;
    use crate::report::fixtures;

    #[test]
    fn text_summary_lists_checks_counters_and_trends() {
        let (mut report, summary) = fixtures::report();
        report.publish.push(PublishOutcome::Failed {
            url: "http://sink/publish".to_string(),
            reason: "status 500".to_string(),
        });

        let text = render(&report, &summary);

        assert!(text.contains("run: R<1> (constant)"));
        assert!(text.contains("response code was 2xx: pass=2 fail=1 [FAIL]"));
        assert!(text.contains("http_reqs = 3 (1.50/s)"));
        assert!(text.contains("checks = 66.67% (2/3)"));
        assert!(text.contains("http_req_duration = min=12.50ms"));
        assert!(text.contains("http://sink/publish: failed (status 500)"));
        assert!(text.contains("elapsed: 2s"));
    }

    #[test]
    fn format_ms_switches_to_seconds() {
        assert_eq!(format_ms(12.346), "12.35ms");
        assert_eq!(format_ms(1_500.0), "1.50s");
    }
}
