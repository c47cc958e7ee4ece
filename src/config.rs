// Run configuration derived from the command line.

use crate::cli::Cli;
use crate::upload::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const ZENODO_BASE_URL: &str = "https://zenodo.org/api";
pub const ZENODO_SANDBOX_URL: &str = "https://sandbox.zenodo.org/api";

/// Which Zenodo deployment a run talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiEnvironment {
    Production,
    Sandbox,
}

impl ApiEnvironment {
    /// Dry runs select the sandbox, real runs production.
    pub fn for_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ApiEnvironment::Sandbox
        } else {
            ApiEnvironment::Production
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            ApiEnvironment::Production => ZENODO_BASE_URL,
            ApiEnvironment::Sandbox => ZENODO_SANDBOX_URL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub environment: ApiEnvironment,
    pub base_url: String,
    pub record_id: String,
    pub directory: PathBuf,
    pub dry_run: bool,
    pub retry: RetryPolicy,
    /// Per-request timeout; `None` leaves requests unbounded.
    pub timeout: Option<Duration>,
}

impl UploadConfig {
    /// Resolve the options in `cli`. An explicit API URL wins over the
    /// environment picked by the dry-run toggle.
    pub fn from_cli(cli: &Cli, directory: PathBuf) -> Self {
        let environment = ApiEnvironment::for_dry_run(cli.dry_run);
        let base_url = cli
            .api_url
            .clone()
            .unwrap_or_else(|| environment.base_url().to_string());
        UploadConfig {
            environment,
            base_url,
            record_id: cli.record_id.clone(),
            directory,
            dry_run: cli.dry_run,
            retry: RetryPolicy::new(cli.max_retries),
            timeout: cli.timeout.map(Duration::from_secs),
        }
    }
}
