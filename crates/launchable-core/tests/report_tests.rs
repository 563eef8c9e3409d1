use std::fs;
use std::path::{Path, PathBuf};

use launchable_core::junit::{parse_report_str, JunitCase, JunitSuite};
use launchable_core::{
    format_test_path, CaseStatus, DefaultPathBuilder, PathBuilder, TestPath, TestPathComponent,
    TestReports,
};
use tempfile::TempDir;

const CYPRESS_STYLE_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="Mocha Tests" time="4.0" tests="3" failures="1">
  <testsuite name="window" timestamp="2024-05-01T10:00:00" tests="3" file="cypress/integration/window.spec.js" time="4.0" failures="1">
    <testcase name="opens a window" time="1.5" classname="window"/>
    <testcase name="scrolls the window" time="2.0" classname="window"/>
    <testcase name="closes the window" time="0.5" classname="window">
      <failure message="expected true to be false"><![CDATA[AssertionError: expected true to be false
    at Context.eval (window.spec.js:42:7)]]></failure>
    </testcase>
  </testsuite>
</testsuites>
"#;

const EMPTY_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites name="Mocha Tests" time="0" tests="0" failures="0"/>
"#;

fn default_builder() -> Box<dyn PathBuilder> {
    Box::new(DefaultPathBuilder::new(None))
}

// ============================================================
// JUnit parsing
// ============================================================

#[test]
fn test_parse_cypress_style_report() {
    let suites = parse_report_str(CYPRESS_STYLE_REPORT).unwrap();
    assert_eq!(suites.len(), 1);

    let suite = &suites[0];
    assert_eq!(suite.name.as_deref(), Some("window"));
    assert_eq!(
        suite.filepath,
        Some(PathBuf::from("cypress/integration/window.spec.js"))
    );
    assert!(suite.timestamp.is_some());
    assert_eq!(suite.cases.len(), 3);

    assert_eq!(suite.cases[0].name, "opens a window");
    assert_eq!(suite.cases[0].status, CaseStatus::Success);
    assert_eq!(suite.cases[0].time, 1.5);

    let failed = &suite.cases[2];
    assert_eq!(failed.status, CaseStatus::Failure);
    assert_eq!(failed.time, 0.5);
    let trace = failed.stack_trace.as_deref().unwrap();
    assert!(trace.contains("expected true to be false"));
    assert!(trace.contains("window.spec.js:42:7"));
}

#[test]
fn test_parse_skipped_and_errored_cases() {
    let xml = r#"
<testsuite name="suite" tests="3">
  <testcase name="a" time="0.1"/>
  <testcase name="b" time="0.0"><skipped/></testcase>
  <testcase name="c" time="0.2"><error message="boom"/></testcase>
</testsuite>"#;

    let suites = parse_report_str(xml).unwrap();
    let cases = &suites[0].cases;
    assert_eq!(cases[0].status, CaseStatus::Success);
    assert_eq!(cases[1].status, CaseStatus::Skipped);
    assert_eq!(cases[2].status, CaseStatus::Failure);
    assert_eq!(cases[2].stack_trace.as_deref(), Some("boom"));
}

#[test]
fn test_parse_empty_report_yields_no_cases() {
    let suites = parse_report_str(EMPTY_REPORT).unwrap();
    assert!(suites.iter().all(|s| s.cases.is_empty()));
}

#[test]
fn test_parse_multiple_suites() {
    let xml = r#"
<testsuites>
  <testsuite name="one"><testcase name="a" time="1.0"/></testsuite>
  <testsuite name="two"><testcase name="b" time="2.0"/><testcase name="c" time="3.0"/></testsuite>
</testsuites>"#;

    let suites = parse_report_str(xml).unwrap();
    assert_eq!(suites.len(), 2);
    assert_eq!(suites[0].cases.len(), 1);
    assert_eq!(suites[1].cases.len(), 2);
}

#[test]
fn test_parse_malformed_xml_is_an_error() {
    assert!(parse_report_str("<testsuite><testcase name=\"a\"</testsuite>").is_err());
}

// ============================================================
// Path building
// ============================================================

#[test]
fn test_default_builder_prefers_the_case_file_attribute() {
    let xml = r#"
<testsuite name="s">
  <testcase name="a" time="1.0" file="tests/a_test.py"/>
</testsuite>"#;
    let suites = parse_report_str(xml).unwrap();

    let builder = DefaultPathBuilder::new(None);
    let path = builder.build(&suites[0].cases[0], &suites[0], Path::new("report.xml"));
    assert_eq!(format_test_path(&path), "file=tests/a_test.py");
}

#[test]
fn test_default_builder_falls_back_to_the_report_path() {
    let xml = r#"<testsuite name="s"><testcase name="a" time="1.0"/></testsuite>"#;
    let suites = parse_report_str(xml).unwrap();

    let builder = DefaultPathBuilder::new(None);
    let path = builder.build(
        &suites[0].cases[0],
        &suites[0],
        Path::new("build/reports/report.xml"),
    );
    assert_eq!(format_test_path(&path), "file=build/reports/report.xml");
}

#[test]
fn test_default_builder_relativizes_against_the_base() {
    let xml = r#"
<testsuite name="s">
  <testcase name="a" time="1.0" file="/ci/checkout/tests/a_test.py"/>
</testsuite>"#;
    let suites = parse_report_str(xml).unwrap();

    let builder = DefaultPathBuilder::new(Some(PathBuf::from("/ci/checkout")));
    let path = builder.build(&suites[0].cases[0], &suites[0], Path::new("report.xml"));
    assert_eq!(format_test_path(&path), "file=tests/a_test.py");
}

/// A runner with richer metadata can supply its own builder; the ingester
/// only sees the resulting components.
struct ClassnameBuilder;

impl PathBuilder for ClassnameBuilder {
    fn build(&self, case: &JunitCase, _suite: &JunitSuite, _report: &Path) -> TestPath {
        let mut path = Vec::new();
        if let Some(classname) = &case.classname {
            path.push(TestPathComponent::new("class", classname.clone()));
        }
        path.push(TestPathComponent::new("testcase", case.name.clone()));
        path
    }
}

#[test]
fn test_custom_builder_produces_multi_component_paths() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("report.xml");
    fs::write(
        &report,
        r#"<testsuite name="s"><testcase name="parses" classname="ParserTest" time="0.3"/></testsuite>"#,
    )
    .unwrap();

    let mut reports = TestReports::new(Box::new(ClassnameBuilder));
    reports.report(&report);

    let events: Vec<_> = reports
        .into_events()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(
        format_test_path(&events[0].test_path),
        "class=ParserTest#testcase=parses"
    );
}

// ============================================================
// Report sets and event production
// ============================================================

#[test]
fn test_scan_queues_matching_reports() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
    fs::write(dir.path().join("a.xml"), EMPTY_REPORT).unwrap();
    fs::write(dir.path().join("nested/b.xml"), EMPTY_REPORT).unwrap();
    fs::write(dir.path().join("nested/deeper/c.xml"), EMPTY_REPORT).unwrap();
    fs::write(dir.path().join("nested/readme.md"), "skip me").unwrap();

    let mut reports = TestReports::new(default_builder());
    reports.scan(dir.path(), "**/*.xml").unwrap();
    assert_eq!(reports.len(), 3);
}

#[test]
fn test_scan_with_no_matches_queues_nothing() {
    let dir = TempDir::new().unwrap();
    let mut reports = TestReports::new(default_builder());
    reports.scan(dir.path(), "**/*.xml").unwrap();
    assert!(reports.is_empty());
}

#[test]
fn test_empty_report_produces_zero_events() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("empty.xml");
    fs::write(&report, EMPTY_REPORT).unwrap();

    let mut reports = TestReports::new(default_builder());
    reports.report(&report);
    assert_eq!(reports.into_events().count(), 0);
}

#[test]
fn test_each_case_becomes_one_event() {
    let dir = TempDir::new().unwrap();
    let report = dir.path().join("window.xml");
    fs::write(&report, CYPRESS_STYLE_REPORT).unwrap();

    let mut reports = TestReports::new(default_builder());
    reports.report(&report);

    let events: Vec<_> = reports
        .into_events()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(events.len(), 3);

    for event in &events {
        assert!(!event.test_path.is_empty());
        assert!(event.created_at.is_some());
    }
    assert_eq!(events[0].status, CaseStatus::Success);
    assert_eq!(events[0].duration, 1.5);
    assert_eq!(events[2].status, CaseStatus::Failure);
    assert_eq!(events[2].duration, 0.5);
}

#[test]
fn test_events_stream_across_multiple_reports() {
    let dir = TempDir::new().unwrap();
    for (name, cases) in [("a.xml", 2), ("b.xml", 1)] {
        let body: String = (0..cases)
            .map(|i| format!(r#"<testcase name="t{}" time="0.1"/>"#, i))
            .collect();
        fs::write(
            dir.path().join(name),
            format!(r#"<testsuite name="s">{}</testsuite>"#, body),
        )
        .unwrap();
    }

    let mut reports = TestReports::new(default_builder());
    reports.scan(dir.path(), "*.xml").unwrap();
    assert_eq!(reports.into_events().count(), 3);
}

#[test]
fn test_malformed_report_ends_the_stream_with_an_error() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("a.xml");
    let bad = dir.path().join("b.xml");
    fs::write(&good, r#"<testsuite><testcase name="t" time="0.1"/></testsuite>"#).unwrap();
    fs::write(&bad, "<testsuite><unclosed").unwrap();

    let mut reports = TestReports::new(default_builder());
    reports.report(&good);
    reports.report(&bad);

    let mut events = reports.into_events();
    assert!(events.next().unwrap().is_ok());
    let err = events.next().unwrap().unwrap_err();
    assert!(err.to_string().contains("b.xml"));

    // Fused after the failure.
    assert!(events.next().is_none());
}
