//! Recorded test results and their aggregation.
//!
//! Both the table and JSON renderings of `inspect tests` are views over
//! the same [`ResultSummary`], so the two can never disagree on counts or
//! durations.

use serde::{Deserialize, Serialize};

use launchable_core::{format_test_path, CaseStatus, TestPath};

/// One recorded result as returned by `GET test_sessions/{id}/events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_path: TestPath,
    #[serde(default)]
    pub status: CaseStatus,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl TestResult {
    /// `type=name#type=name` form for display.
    pub fn test_path_string(&self) -> String {
        format_test_path(&self.test_path)
    }
}

/// Count and total duration for one status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSummary {
    pub report_count: usize,
    pub duration_min: f64,
}

/// The shared aggregate both renderings are computed from.
#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    pub total: StatusSummary,
    pub success: StatusSummary,
    pub failure: StatusSummary,
    pub skip: StatusSummary,
}

/// A set of recorded results with aggregation helpers.
#[derive(Debug, Clone)]
pub struct TestResults {
    results: Vec<TestResult>,
}

impl TestResults {
    pub fn new(results: Vec<TestResult>) -> Self {
        TestResults { results }
    }

    /// Build from the raw response array. Records without a `testPath`
    /// carry nothing to join on and are silently excluded.
    pub fn from_raw(raw: Vec<serde_json::Value>) -> Self {
        let results = raw
            .into_iter()
            .filter(|record| record.get("testPath").is_some())
            .filter_map(|record| match serde_json::from_value::<TestResult>(record) {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("skipping unreadable result record: {}", e);
                    None
                }
            })
            .collect();
        TestResults { results }
    }

    pub fn list(&self) -> &[TestResult] {
        &self.results
    }

    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    pub fn total_duration_sec(&self) -> f64 {
        self.results.iter().map(|r| r.duration).sum()
    }

    pub fn total_duration_min(&self) -> f64 {
        self.total_duration_sec() / 60.0
    }

    pub fn filter_by_status(&self, status: CaseStatus) -> TestResults {
        TestResults {
            results: self
                .results
                .iter()
                .filter(|r| r.status == status)
                .cloned()
                .collect(),
        }
    }

    fn status_summary(&self, status: CaseStatus) -> StatusSummary {
        let filtered = self.filter_by_status(status);
        StatusSummary {
            report_count: filtered.total_count(),
            duration_min: filtered.total_duration_min(),
        }
    }

    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            total: StatusSummary {
                report_count: self.total_count(),
                duration_min: self.total_duration_min(),
            },
            success: self.status_summary(CaseStatus::Success),
            failure: self.status_summary(CaseStatus::Failure),
            skip: self.status_summary(CaseStatus::Skipped),
        }
    }
}
