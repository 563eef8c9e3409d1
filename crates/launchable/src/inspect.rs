use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use launchable_client::{ClientError, LaunchableClient, StatusSummary, TestResults};
use launchable_core::{CaseStatus, SessionStore};

#[derive(Subcommand, Debug)]
pub enum InspectAction {
    /// Show the test results recorded for a session
    Tests {
        /// Test session id (defaults to the one in the session file)
        #[arg(long)]
        test_session_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_inspect_command(action: InspectAction) -> Result<i32> {
    match action {
        InspectAction::Tests {
            test_session_id,
            json,
        } => {
            let store = SessionStore::from_env();
            let client = LaunchableClient::from_env()?;
            inspect_tests(&store, &client, test_session_id, json)
        }
    }
}

fn inspect_tests(
    store: &SessionStore,
    client: &LaunchableClient,
    test_session_id: Option<String>,
    json: bool,
) -> Result<i32> {
    let session_id = match test_session_id {
        Some(id) => id,
        None => match store.read_current() {
            Ok(Some((_, id))) => id,
            _ => anyhow::bail!(
                "a test session id is required.\n\
                 Pass --test-session-id or run after `launchable record tests`"
            ),
        },
    };

    let results = match client.fetch_test_results(&session_id) {
        Ok(results) => results,
        Err(ClientError::SessionNotFound(_)) => {
            eprintln!(
                "{}",
                format!(
                    "Test session {} not found. Check the test session id and try again.",
                    session_id
                )
                .yellow()
            );
            return Ok(1);
        }
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", "Warning: failed to inspect tests".yellow());
            return Ok(1);
        }
    };

    if json {
        print_json(&results)?;
    } else {
        print_table(&results);
    }
    Ok(0)
}

fn print_json(results: &TestResults) -> Result<()> {
    let out = serde_json::json!({
        "summary": results.summary(),
        "results": results
            .list()
            .iter()
            .map(|r| serde_json::json!({
                "test_path": r.test_path_string(),
                "duration_sec": r.duration,
                "status": r.status.to_string(),
                "created_at": r.created_at,
            }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_table(results: &TestResults) {
    println!(
        "{:<60} {:>14} {:<10} {:<25}",
        "TEST PATH".dimmed(),
        "DURATION (SEC)".dimmed(),
        "STATUS".dimmed(),
        "UPLOADED AT".dimmed(),
    );

    for result in results.list() {
        let status = result.status.to_string();
        let status_colored = match result.status {
            CaseStatus::Success => status.bright_green().to_string(),
            CaseStatus::Failure => status.bright_red().to_string(),
            CaseStatus::Skipped => status.bright_yellow().to_string(),
            CaseStatus::Other => status.dimmed().to_string(),
        };
        println!(
            "{:<60} {:>14.2} {:<10} {:<25}",
            result.test_path_string(),
            result.duration,
            status_colored,
            result.created_at.as_deref().unwrap_or("-"),
        );
    }

    let summary = results.summary();
    println!();
    println!(
        "{:<10} {:>14} {:>22}",
        "SUMMARY".dimmed(),
        "REPORT COUNT".dimmed(),
        "TOTAL DURATION (MIN)".dimmed(),
    );
    print_summary_row("Total", &summary.total);
    print_summary_row("Success", &summary.success);
    print_summary_row("Failure", &summary.failure);
    print_summary_row("Skip", &summary.skip);
}

fn print_summary_row(label: &str, bucket: &StatusSummary) {
    println!(
        "{:<10} {:>14} {:>22.2}",
        label, bucket.report_count, bucket.duration_min
    );
}
