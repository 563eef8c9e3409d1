use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use launchable_client::LaunchableClient;
use launchable_core::{
    format_session_name, parse_session_name, DefaultPathBuilder, SessionError, SessionStore,
    TestReports,
};

/// Session files older than this are deleted when a new build starts.
const SESSION_FILE_RETENTION_DAYS: i64 = 14;

#[derive(Subcommand, Debug)]
pub enum RecordAction {
    /// Record a build, cleaning up stale session files first
    Build {
        /// Build name, stable across this build's lifetime
        #[arg(long)]
        name: String,
    },

    /// Register a new test session for a recorded build
    Session {
        /// Build name the session belongs to
        #[arg(long)]
        build: String,
    },

    /// Parse JUnit XML reports and upload their test-case events
    Tests {
        /// Build name whose recorded session to upload into
        #[arg(long, conflicts_with = "session")]
        build: Option<String>,

        /// Full test session name (builds/<build>/test_sessions/<id>)
        #[arg(long)]
        session: Option<String>,

        /// Base directory to make test file names portable across machines
        #[arg(long)]
        base: Option<PathBuf>,

        /// Warn instead of failing when the upload errors (for pipelines
        /// that must not break on reporting problems)
        #[arg(long)]
        continue_on_error: bool,

        /// Report files, directories to scan for **/*.xml, or glob patterns
        #[arg(required = true)]
        reports: Vec<String>,
    },
}

pub fn handle_record_command(action: RecordAction) -> Result<i32> {
    match action {
        RecordAction::Build { name } => {
            let store = SessionStore::from_env();
            store.clean_session_files(SESSION_FILE_RETENTION_DAYS)?;
            store.write_build(&name)?;
            tracing::info!(build = %name, "recorded build");
            Ok(0)
        }
        RecordAction::Session { build } => {
            let store = SessionStore::from_env();
            let client = LaunchableClient::from_env()?;

            let session_id = client
                .create_test_session(&build)
                .context("failed to register a test session")?;
            store.write_session(&build, &session_id)?;

            // Stdout so scripts can capture the session name.
            println!("{}", format_session_name(&build, &session_id));
            Ok(0)
        }
        RecordAction::Tests {
            build,
            session,
            base,
            continue_on_error,
            reports,
        } => {
            // Argument-shape errors come before any token or network
            // concerns.
            if build.is_none() && session.is_none() {
                anyhow::bail!("either --build or --session has to be specified");
            }
            let store = SessionStore::from_env();
            let client = LaunchableClient::from_env()?;
            record_tests(
                &store,
                &client,
                build.as_deref(),
                session.as_deref(),
                base,
                continue_on_error,
                &reports,
            )
        }
    }
}

fn record_tests(
    store: &SessionStore,
    client: &LaunchableClient,
    build: Option<&str>,
    session: Option<&str>,
    base: Option<PathBuf>,
    continue_on_error: bool,
    report_args: &[String],
) -> Result<i32> {
    let session_name = resolve_session_name(store, client, build, session)?;

    let mut reports = TestReports::new(Box::new(DefaultPathBuilder::new(base)));
    queue_reports(&mut reports, report_args)?;
    tracing::debug!(count = reports.len(), "queued report files");

    let mut events = reports.into_events().peekable();
    match events.peek() {
        None => {
            tracing::info!("no test cases found in the given reports; nothing to upload");
            return Ok(0);
        }
        Some(Err(_)) => {
            if let Some(Err(e)) = events.next() {
                return Err(e);
            }
        }
        Some(Ok(_)) => {}
    }

    match client.upload_events(&session_name, events) {
        Ok(()) => {
            tracing::info!(session = %session_name, "recorded test results");
            Ok(0)
        }
        Err(e) if continue_on_error => {
            eprintln!(
                "{}",
                format!("Warning: failed to record test results: {}", e).yellow()
            );
            Ok(0)
        }
        Err(e) => Err(e).context("failed to record test results"),
    }
}

/// Turn each CLI report argument into queued report files: an existing
/// file is taken as-is, a directory is scanned recursively for XML
/// reports, anything else is treated as a glob pattern. A pattern with no
/// matches queues nothing.
fn queue_reports(reports: &mut TestReports, args: &[String]) -> Result<()> {
    for arg in args {
        let path = Path::new(arg);
        if path.is_file() {
            reports.report(path);
        } else if path.is_dir() {
            reports.scan(path, "**/*.xml")?;
        } else {
            reports.scan(Path::new(""), arg)?;
        }
    }
    Ok(())
}

/// Resolve the session to record into.
///
/// `--session` wins when given (validated for shape). With `--build`, the
/// session file supplies the id; a missing or unreadable file falls back
/// to registering a fresh session, but a file that names a different
/// build is a hard error, since that is the conflict the file exists to
/// catch.
fn resolve_session_name(
    store: &SessionStore,
    client: &LaunchableClient,
    build: Option<&str>,
    session: Option<&str>,
) -> Result<String> {
    match (build, session) {
        (_, Some(name)) => {
            parse_session_name(name)?;
            Ok(name.to_string())
        }
        (Some(build), None) => {
            let session_id = match store.read_session(build) {
                Ok(Some(id)) => id,
                Ok(None) => register_session(store, client, build)?,
                Err(SessionError::Malformed { .. }) => {
                    tracing::warn!("session file is stale; registering a new test session");
                    register_session(store, client, build)?
                }
                Err(e) => return Err(e.into()),
            };
            Ok(format_session_name(build, &session_id))
        }
        (None, None) => anyhow::bail!("either --build or --session has to be specified"),
    }
}

fn register_session(
    store: &SessionStore,
    client: &LaunchableClient,
    build: &str,
) -> Result<String> {
    let session_id = client
        .create_test_session(build)
        .context("failed to register a test session")?;
    store.write_session(build, &session_id)?;
    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn empty_reports() -> TestReports {
        TestReports::new(Box::new(DefaultPathBuilder::new(None)))
    }

    /// A listener that would accept a request if one ever arrived, plus a
    /// client pointed at it. `accept` stays non-blocking so a test can
    /// assert that no connection was made.
    fn idle_server() -> (TcpListener, LaunchableClient) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let client = LaunchableClient::new(&base, "v1:acme/rocket:key").unwrap();
        (listener, client)
    }

    fn assert_no_request(listener: &TcpListener) {
        match listener.accept() {
            Ok(_) => panic!("a request was sent"),
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
        }
    }

    #[test]
    fn test_missing_build_and_session_is_a_usage_error() {
        let err = handle_record_command(RecordAction::Tests {
            build: None,
            session: None,
            base: None,
            continue_on_error: false,
            reports: vec!["report.xml".to_string()],
        })
        .unwrap_err();
        assert!(err.to_string().contains("--build or --session"));
    }

    #[test]
    fn test_run_with_no_test_cases_sends_no_request() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("empty.xml");
        fs::write(&report, r#"<testsuite name="s" tests="0"/>"#).unwrap();

        let (listener, client) = idle_server();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let code = record_tests(
            &store,
            &client,
            None,
            Some("builds/b1/test_sessions/16"),
            None,
            false,
            &[report.to_string_lossy().into_owned()],
        )
        .unwrap();

        assert_eq!(code, 0);
        assert_no_request(&listener);
    }

    #[test]
    fn test_malformed_report_fails_before_any_request() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("broken.xml");
        fs::write(&report, "<testsuite><unclosed").unwrap();

        let (listener, client) = idle_server();
        let store = SessionStore::with_dir(dir.path().to_path_buf());

        let err = record_tests(
            &store,
            &client,
            None,
            Some("builds/b1/test_sessions/16"),
            None,
            false,
            &[report.to_string_lossy().into_owned()],
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("broken.xml"));
        assert_no_request(&listener);
    }

    #[test]
    fn test_queue_reports_takes_files_directly() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.xml");
        fs::write(&file, "<testsuite/>").unwrap();

        let mut reports = empty_reports();
        queue_reports(&mut reports, &[file.to_string_lossy().into_owned()]).unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_queue_reports_scans_directories_recursively() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.xml"), "<testsuite/>").unwrap();
        fs::write(dir.path().join("sub/b.xml"), "<testsuite/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a report").unwrap();

        let mut reports = empty_reports();
        queue_reports(&mut reports, &[dir.path().to_string_lossy().into_owned()]).unwrap();
        assert_eq!(reports.len(), 2);
    }

    #[test]
    fn test_queue_reports_nonmatching_pattern_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let pattern = dir
            .path()
            .join("missing/**/*.xml")
            .to_string_lossy()
            .into_owned();

        let mut reports = empty_reports();
        queue_reports(&mut reports, &[pattern]).unwrap();
        assert!(reports.is_empty());
    }
}
