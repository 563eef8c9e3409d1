use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod inspect;
mod record;

#[derive(Parser, Debug)]
#[command(
    name = "launchable",
    about = "Record test results and build metadata to a test-intelligence service",
    version
)]
struct Cli {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record builds, test sessions, and test results
    Record {
        #[command(subcommand)]
        action: record::RecordAction,
    },

    /// Inspect previously recorded results
    Inspect {
        #[command(subcommand)]
        action: inspect::InspectAction,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red(), e);
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Record { action } => record::handle_record_command(action),
        Commands::Inspect { action } => inspect::handle_inspect_command(action),
    }
}

/// Initialize tracing. Diagnostics go to stderr so stdout stays clean for
/// scripting (`record session` prints the session name there).
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
