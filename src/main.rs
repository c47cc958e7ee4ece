// Entrypoint for the CLI application.
// - Keeps `main` small: set up logging, parse arguments, hand over to `ui::run`.
// - Any error is printed on stderr and turned into exit code 1.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zenodo_upload::{cli::Cli, ui};

fn main() -> ExitCode {
    // Logs go to stderr so they never mix with the file listing on stdout.
    // Quiet by default; `RUST_LOG=zenodo_upload=debug` shows every attempt.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match ui::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Run failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
