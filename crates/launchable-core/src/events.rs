//! Wire representation of one executed test case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::testpath::TestPath;

/// Normalized test outcome. Parsed reports only ever produce the first
/// three; `Other` absorbs statuses the service reports that this tool
/// does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Success,
    Failure,
    Skipped,
    #[serde(other)]
    Other,
}

impl Default for CaseStatus {
    /// A record without a recognizable status counts as neither passed,
    /// failed, nor skipped in the aggregates.
    fn default() -> Self {
        CaseStatus::Other
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CaseStatus::Success => "SUCCESS",
            CaseStatus::Failure => "FAILURE",
            CaseStatus::Skipped => "SKIPPED",
            CaseStatus::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// One parsed test execution, immutable once built from a report entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseEvent {
    pub test_path: TestPath,
    pub status: CaseStatus,
    /// Wall-clock duration in seconds.
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}
