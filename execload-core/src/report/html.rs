use std::fmt::Write as _;

use execload_metrics::MetricValue;

use super::RunReport;
use crate::recorder::CHECK_NAME;
use crate::summary::{SummaryReport, format_timestamp};

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 2rem; color: #1f2328; }
h1 { font-size: 1.5rem; margin-bottom: 0.25rem; }
h2 { font-size: 1.1rem; margin-top: 2rem; }
.meta { color: #59636e; }
.verdict { display: inline-block; padding: 0.2rem 0.6rem; border-radius: 4px; font-weight: 600; }
.pass { background: #dafbe1; color: #1a7f37; }
.fail { background: #ffebe9; color: #cf222e; }
table { border-collapse: collapse; margin-top: 0.5rem; }
th, td { border: 1px solid #d1d9e0; padding: 0.3rem 0.7rem; text-align: left; }
th { background: #f6f8fa; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
"#;

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn trend_rows(report: &RunReport, out: &mut String) {
    for s in &report.series {
        let MetricValue::Trend(Some(t)) = &s.values else {
            continue;
        };
        writeln!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td><td class=\"num\">{:.3}</td></tr>",
            escape(&s.name),
            t.count,
            t.min,
            t.med,
            t.avg,
            t.p90,
            t.p95,
            t.p99,
            t.max
        )
        .ok();
    }
}

/// Standalone report page with inline styles and no external assets.
pub fn render(report: &RunReport, summary: &SummaryReport) -> String {
    let run = &report.run;
    let failed = report.checks_failed();
    let (verdict_class, verdict) = if failed > 0 {
        ("fail", "FAILED")
    } else {
        ("pass", "PASSED")
    };

    let mut trends = String::new();
    trend_rows(report, &mut trends);

    let mut rows = String::new();
    for (label, value) in summary.rows() {
        writeln!(
            rows,
            "<tr><td>{}</td><td class=\"num\">{}</td></tr>",
            escape(label),
            escape(&value.to_string())
        )
        .ok();
    }

    let mut publish = String::new();
    for p in &report.publish {
        writeln!(publish, "<li>{}</li>", escape(&p.to_string())).ok();
    }
    let publish = if publish.is_empty() {
        "<p class=\"meta\">Nothing was published.</p>".to_string()
    } else {
        format!("<ul>\n{publish}</ul>")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Load test {run_id}</title>
<style>{STYLE}</style>
</head>
<body>
<h1>Load test {run_id}</h1>
<p class="meta">{scenario} scenario in {region}, {start} to {end}</p>
<p><span class="verdict {verdict_class}">{verdict}</span> {check}: {passed} passed, {failed} failed of {total}</p>

<h2>Requests</h2>
<table>
<tr><th>http_reqs</th><td class="num">{http_reqs}</td></tr>
<tr><th>iterations</th><td class="num">{iterations}</td></tr>
<tr><th>dropped_iterations</th><td class="num">{dropped}</td></tr>
<tr><th>rate</th><td class="num">{rps:.2}/s</td></tr>
</table>

<h2>Timings (ms)</h2>
<table>
<tr><th>series</th><th>n</th><th>min</th><th>med</th><th>avg</th><th>p90</th><th>p95</th><th>p99</th><th>max</th></tr>
{trends}</table>

<h2>Summary</h2>
<table>
<tr><th>label</th><th>value</th></tr>
{rows}</table>

<h2>Publishing</h2>
{publish}
</body>
</html>
"#,
        run_id = escape(&run.run_id),
        scenario = escape(&report.scenario),
        region = escape(&run.region),
        start = format_timestamp(&run.start),
        end = format_timestamp(&run.end),
        check = escape(CHECK_NAME),
        passed = report.checks_passed,
        total = report.checks_total,
        http_reqs = report.http_reqs,
        iterations = report.iterations,
        dropped = report.dropped_iterations,
        rps = report.per_second(report.http_reqs),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn report_escapes_run_metadata() {
        let (report, summary) = fixtures::report();
        let html = render(&report, &summary);

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Load test R&lt;1&gt;</title>"));
        assert!(html.contains("constant scenario in west &amp; us"));
        assert!(!html.contains("R<1>"));
        assert!(html.contains(r#"<span class="verdict fail">FAILED</span>"#));
        assert!(html.contains("<tr><td>http_req_duration</td><td class=\"num\">2</td>"));
        assert!(html.contains("<tr><td>ReqDuration_Max</td><td class=\"num\">20</td></tr>"));
        assert!(html.contains("Nothing was published."));
    }
}
