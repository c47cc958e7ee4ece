// Command-line options. Parsing only; `ui::run` acts on them.

use clap::Parser;
use std::path::PathBuf;

/// Upload files to Zenodo with retrying and progress bar functionalities.
#[derive(Parser, Debug, Clone)]
#[command(name = "zenodo-upload", version, about)]
pub struct Cli {
    /// Zenodo access token (prompted for when not given)
    #[arg(
        long,
        short = 'p',
        env = "ZENODO_ACCESS_TOKEN",
        hide_env_values = true
    )]
    pub access_token: Option<String>,

    /// Perform a dry run without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Zenodo record ID to upload files to
    #[arg(long = "record-id", visible_aliases = ["deposit-id", "to"], required = true)]
    pub record_id: String,

    /// Retry attempts per file after the first failure
    #[arg(long, env = "ZENODO_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds (no timeout when omitted)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Override the API base URL chosen by --dry-run
    #[arg(long, env = "ZENODO_API_URL")]
    pub api_url: Option<String>,

    /// Directory to upload (defaults to the current directory)
    pub directory: Option<PathBuf>,
}
