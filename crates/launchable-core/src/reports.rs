//! Report discovery and lazy event production.
//!
//! Report sets can run to thousands of files, so cases are never collected
//! into one big vector: [`EventIter`] holds at most one parsed report at a
//! time and hands events downstream one by one.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::events::TestCaseEvent;
use crate::junit::{parse_report, JunitSuite};
use crate::testpath::PathBuilder;

/// The set of report files queued for one recording run.
pub struct TestReports {
    reports: Vec<PathBuf>,
    builder: Box<dyn PathBuilder>,
}

impl TestReports {
    pub fn new(builder: Box<dyn PathBuilder>) -> Self {
        TestReports {
            reports: Vec::new(),
            builder,
        }
    }

    /// Queue a single report file, whether or not any scan pattern would
    /// have matched it.
    pub fn report(&mut self, path: impl Into<PathBuf>) {
        self.reports.push(path.into());
    }

    /// Queue everything under `base` matching the glob `pattern`
    /// (`**` recurses). A pattern with zero matches is not an error.
    pub fn scan(&mut self, base: &Path, pattern: &str) -> Result<()> {
        let full = base.join(pattern);
        let matches = glob::glob(&full.to_string_lossy())
            .map_err(|e| anyhow::anyhow!("bad report pattern '{}': {}", pattern, e))?;

        for entry in matches {
            match entry {
                Ok(path) if path.is_file() => self.report(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping unreadable path while scanning: {}", e),
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Consume the set, yielding one event per parsed test case.
    pub fn into_events(self) -> EventIter {
        EventIter {
            reports: self.reports.into_iter(),
            builder: self.builder,
            pending: Vec::new().into_iter(),
            failed: false,
        }
    }
}

/// Lazy event stream over the queued reports.
///
/// Yields `Err` once for the first report that fails to parse and then
/// fuses: a malformed report aborts the whole run rather than silently
/// dropping part of the result set.
pub struct EventIter {
    reports: std::vec::IntoIter<PathBuf>,
    builder: Box<dyn PathBuilder>,
    pending: std::vec::IntoIter<TestCaseEvent>,
    failed: bool,
}

impl Iterator for EventIter {
    type Item = Result<TestCaseEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(event) = self.pending.next() {
                return Some(Ok(event));
            }
            let report = self.reports.next()?;
            match load_events(&report, self.builder.as_ref()) {
                Ok(events) => {
                    tracing::debug!(
                        report = %report.display(),
                        count = events.len(),
                        "parsed report"
                    );
                    self.pending = events.into_iter();
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Parse one report into its events. Materializes one file's worth of
/// cases, which bounds memory at the largest single report.
fn load_events(report: &Path, builder: &dyn PathBuilder) -> Result<Vec<TestCaseEvent>> {
    let suites = parse_report(report)?;
    let mut events = Vec::new();
    for suite in &suites {
        collect_suite_events(suite, report, builder, &mut events);
    }
    Ok(events)
}

fn collect_suite_events(
    suite: &JunitSuite,
    report: &Path,
    builder: &dyn PathBuilder,
    out: &mut Vec<TestCaseEvent>,
) {
    for case in &suite.cases {
        out.push(TestCaseEvent {
            test_path: builder.build(case, suite, report),
            status: case.status,
            duration: case.time,
            created_at: suite.timestamp,
            stack_trace: case.stack_trace.clone(),
        });
    }
}
