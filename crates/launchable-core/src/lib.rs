//! # launchable-core
//!
//! Session identity, test-path modeling, and JUnit report ingestion for
//! the Launchable CLI. Everything here is local: the HTTP side lives in
//! `launchable-client`.

pub mod error;
pub mod events;
pub mod junit;
pub mod reports;
pub mod session;
pub mod testpath;

pub use error::SessionError;
pub use events::{CaseStatus, TestCaseEvent};
pub use reports::{EventIter, TestReports};
pub use session::{
    format_session_file, format_session_name, parse_session_name, SessionStore, SESSION_DIR_ENV,
    SESSION_FILE_NAME,
};
pub use testpath::{format_test_path, DefaultPathBuilder, PathBuilder, TestPath, TestPathComponent};
