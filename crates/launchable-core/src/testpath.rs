//! Canonical test identifiers.
//!
//! A test path is an ordered list of `(type, name)` components, outermost
//! first, that identifies a test case the same way on every machine that
//! runs it. It is the join key between locally parsed results and the
//! history the service keeps.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::junit::{JunitCase, JunitSuite};

/// One level of a test path, e.g. `file=foo.spec.js` or `class=FooTest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPathComponent {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl TestPathComponent {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        TestPathComponent {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Ordered components, outermost (suite/file) to innermost (test case).
pub type TestPath = Vec<TestPathComponent>;

/// Render a test path as `type=name#type=name#...`.
pub fn format_test_path(path: &[TestPathComponent]) -> String {
    path.iter()
        .map(|c| format!("{}={}", c.kind, c.name))
        .collect::<Vec<_>>()
        .join("#")
}

/// Derives a test path from a parsed case and its surrounding context.
///
/// The ingester never looks inside the path it is handed, so a runner with
/// richer metadata (class/method hierarchies, parameterized names) can
/// swap in its own builder without touching the ingestion pipeline.
pub trait PathBuilder: Send {
    fn build(&self, case: &JunitCase, suite: &JunitSuite, report: &Path) -> TestPath;
}

/// The stock builder: a single `file=<path>` component.
///
/// Prefers the `file` attribute recorded in the report, falling back to the
/// report file itself. With a base directory configured, the name is
/// relativized so paths match across checkouts and CI runners.
pub struct DefaultPathBuilder {
    base: Option<PathBuf>,
}

impl DefaultPathBuilder {
    pub fn new(base: Option<PathBuf>) -> Self {
        DefaultPathBuilder { base }
    }

    fn portable_name(&self, file: &Path) -> String {
        let relative = match &self.base {
            Some(base) => file.strip_prefix(base).unwrap_or(file),
            None => file,
        };
        relative.to_string_lossy().into_owned()
    }
}

impl PathBuilder for DefaultPathBuilder {
    fn build(&self, case: &JunitCase, _suite: &JunitSuite, report: &Path) -> TestPath {
        let file = case.file.as_deref().unwrap_or(report);
        vec![TestPathComponent::new("file", self.portable_name(file))]
    }
}
