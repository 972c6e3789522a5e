use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::RunReport;
use crate::error::Result;
use crate::recorder::CHECK_NAME;
use crate::summary::{SummaryReport, format_timestamp};

const SUITE: &str = "execload";

/// JUnit-style results: one test case per check, summary rows as suite properties.
pub fn render(report: &RunReport, summary: &SummaryReport) -> Result<Vec<u8>> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    let failures = u64::from(report.checks_failed() > 0);
    let secs = format!("{:.3}", report.timing.elapsed.as_secs_f64());

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut suites = BytesStart::new("testsuites");
    suites.push_attribute(("name", SUITE));
    suites.push_attribute(("tests", "1"));
    suites.push_attribute(("failures", failures.to_string().as_str()));
    suites.push_attribute(("time", secs.as_str()));
    w.write_event(Event::Start(suites))?;

    let mut suite = BytesStart::new("testsuite");
    suite.push_attribute(("name", report.run.run_id.as_str()));
    suite.push_attribute(("tests", "1"));
    suite.push_attribute(("failures", failures.to_string().as_str()));
    suite.push_attribute(("errors", "0"));
    suite.push_attribute(("time", secs.as_str()));
    suite.push_attribute((
        "timestamp",
        format_timestamp(&report.timing.started_at).as_str(),
    ));
    w.write_event(Event::Start(suite))?;

    w.write_event(Event::Start(BytesStart::new("properties")))?;
    for (label, value) in summary.rows() {
        let mut prop = BytesStart::new("property");
        prop.push_attribute(("name", label.as_str()));
        prop.push_attribute(("value", value.to_string().as_str()));
        w.write_event(Event::Empty(prop))?;
    }
    w.write_event(Event::End(BytesEnd::new("properties")))?;

    let mut case = BytesStart::new("testcase");
    case.push_attribute(("name", CHECK_NAME));
    case.push_attribute(("classname", report.scenario.as_str()));
    case.push_attribute(("time", secs.as_str()));

    if report.checks_failed() > 0 {
        w.write_event(Event::Start(case))?;

        let message = format!(
            "{} of {} requests failed",
            report.checks_failed(),
            report.checks_total
        );
        let mut failure = BytesStart::new("failure");
        failure.push_attribute(("message", message.as_str()));
        failure.push_attribute(("type", "check"));
        w.write_event(Event::Start(failure))?;
        w.write_event(Event::Text(BytesText::new(&format!(
            "checks rate {}/{}",
            report.checks_passed, report.checks_total
        ))))?;
        w.write_event(Event::End(BytesEnd::new("failure")))?;

        w.write_event(Event::End(BytesEnd::new("testcase")))?;
    } else {
        w.write_event(Event::Empty(case))?;
    }

    w.write_event(Event::End(BytesEnd::new("testsuite")))?;
    w.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let mut out = w.into_inner();
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    fn render_str() -> String {
        let (report, summary) = fixtures::report();
        let bytes = render(&report, &summary).unwrap_or_else(|e| panic!("render: {e}"));
        String::from_utf8(bytes).unwrap_or_else(|e| panic!("utf8: {e}"))
    }

    #[test]
    fn failed_checks_become_a_failing_test_case() {
        let xml = render_str();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<testsuite name="R&lt;1&gt;" tests="1" failures="1""#));
        assert!(xml.contains(r#"<testcase name="response code was 2xx" classname="constant""#));
        assert!(xml.contains(r#"<failure message="1 of 3 requests failed" type="check">"#));
        assert!(xml.contains("checks rate 2/3"));
    }

    #[test]
    fn summary_rows_are_escaped_properties() {
        let xml = render_str();

        assert!(xml.contains(r#"<property name="Region" value="west &amp; us"/>"#));
        assert!(xml.contains(r#"<property name="RequestsTotal" value="3"/>"#));
        assert!(!xml.contains("west & us"));

        let props = xml.matches("<property ").count();
        let (_, summary) = fixtures::report();
        assert_eq!(props, summary.rows().len());
    }
}
