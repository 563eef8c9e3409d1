//! JUnit-style XML report parsing.
//!
//! Handles the common shape emitted by most runners: an optional
//! `<testsuites>` wrapper, `<testsuite>` elements carrying `<testcase>`
//! children, with `<failure>`/`<error>`/`<skipped>` children marking the
//! outcome. See <https://llg.cubic.org/docs/junit/> for the format survey.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::events::CaseStatus;

/// One `<testcase>` entry.
#[derive(Debug, Clone)]
pub struct JunitCase {
    pub name: String,
    pub classname: Option<String>,
    /// Source file the runner attributed the case to, when recorded.
    pub file: Option<PathBuf>,
    /// Seconds.
    pub time: f64,
    pub status: CaseStatus,
    pub stack_trace: Option<String>,
}

/// One `<testsuite>` element and its cases.
#[derive(Debug, Clone, Default)]
pub struct JunitSuite {
    pub name: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub filepath: Option<PathBuf>,
    pub cases: Vec<JunitCase>,
}

/// Parse one report file. A report with no test cases is valid and yields
/// suites with empty `cases` (or no suites at all).
pub fn parse_report(path: &Path) -> Result<Vec<JunitSuite>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    parse_report_str(&text).with_context(|| format!("failed to parse report {}", path.display()))
}

/// Parse report XML from a string.
pub fn parse_report_str(text: &str) -> Result<Vec<JunitSuite>> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut suites: Vec<JunitSuite> = Vec::new();
    let mut current_suite: Option<JunitSuite> = None;
    let mut current_case: Option<JunitCase> = None;
    // Non-empty while inside a <failure>/<error> body.
    let mut trace_buf: Option<String> = None;

    loop {
        match reader.read_event().context("invalid XML")? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"testsuite" => {
                    if let Some(done) = current_suite.take() {
                        suites.push(done);
                    }
                    current_suite = Some(read_suite(&e)?);
                }
                b"testcase" => {
                    current_case = Some(read_case(&e)?);
                }
                b"failure" | b"error" => {
                    if let Some(case) = current_case.as_mut() {
                        case.status = CaseStatus::Failure;
                        trace_buf = Some(attr(&e, "message")?.unwrap_or_default());
                    }
                }
                b"skipped" => {
                    if let Some(case) = current_case.as_mut() {
                        case.status = CaseStatus::Skipped;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"testcase" => {
                    let case = read_case(&e)?;
                    push_case(&mut current_suite, case);
                }
                b"failure" | b"error" => {
                    if let Some(case) = current_case.as_mut() {
                        case.status = CaseStatus::Failure;
                        case.stack_trace = attr(&e, "message")?.filter(|m| !m.is_empty());
                    }
                }
                b"skipped" => {
                    if let Some(case) = current_case.as_mut() {
                        case.status = CaseStatus::Skipped;
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"testsuite" => {
                    if let Some(done) = current_suite.take() {
                        suites.push(done);
                    }
                }
                b"testcase" => {
                    if let Some(case) = current_case.take() {
                        push_case(&mut current_suite, case);
                    }
                }
                b"failure" | b"error" => {
                    if let (Some(case), Some(trace)) = (current_case.as_mut(), trace_buf.take()) {
                        let trace = trace.trim().to_string();
                        if !trace.is_empty() {
                            case.stack_trace = Some(trace);
                        }
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(buf) = trace_buf.as_mut() {
                    if !buf.is_empty() {
                        buf.push('\n');
                    }
                    buf.push_str(&t.unescape().context("invalid XML text")?);
                }
            }
            Event::CData(t) => {
                if let Some(buf) = trace_buf.as_mut() {
                    if !buf.is_empty() {
                        buf.push('\n');
                    }
                    buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // A bare <testsuite> with no closing tag has already failed XML
    // parsing; this only catches a dangling implicit suite.
    if let Some(done) = current_suite.take() {
        suites.push(done);
    }

    Ok(suites)
}

fn push_case(current_suite: &mut Option<JunitSuite>, case: JunitCase) {
    // Some runners emit bare <testcase> elements; give them an anonymous suite.
    current_suite
        .get_or_insert_with(JunitSuite::default)
        .cases
        .push(case);
}

fn read_suite(e: &BytesStart<'_>) -> Result<JunitSuite> {
    Ok(JunitSuite {
        name: attr(e, "name")?,
        timestamp: attr(e, "timestamp")?.and_then(|t| parse_timestamp(&t)),
        filepath: attr(e, "file")?.map(PathBuf::from),
        cases: Vec::new(),
    })
}

fn read_case(e: &BytesStart<'_>) -> Result<JunitCase> {
    Ok(JunitCase {
        name: attr(e, "name")?.unwrap_or_default(),
        classname: attr(e, "classname")?,
        file: attr(e, "file")?.map(PathBuf::from),
        time: attr(e, "time")?
            .and_then(|t| t.parse::<f64>().ok())
            .unwrap_or(0.0),
        status: CaseStatus::Success,
        stack_trace: None,
    })
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let value = e
        .try_get_attribute(name)
        .with_context(|| format!("bad '{}' attribute", name))?
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .with_context(|| format!("bad '{}' attribute value", name))
        })
        .transpose()?;
    Ok(value)
}

/// Runners disagree on timestamp format; accept RFC 3339 and the common
/// zone-less `2024-01-01T10:00:00` form (interpreted as UTC).
fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
