// UI layer: everything the operator sees. Reads the token (prompting
// with `dialoguer` when needed), prints the file listing and drives the
// upload with `indicatif` progress bars.

use crate::api::ApiClient;
use crate::cli::Cli;
use crate::config::UploadConfig;
use crate::progress::ProgressObserver;
use crate::scan::{resolve_root, scan_directory};
use crate::upload::{ProgressReporter, Uploader};
use anyhow::{Context, Result};
use dialoguer::Password;
use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::path::Path;

/// Run the command described by `cli`. Returns once the dry-run listing is
/// printed or every file is uploaded; any failure is returned to `main`.
pub fn run(cli: Cli) -> Result<()> {
    let token = match &cli.access_token {
        Some(t) => t.clone(),
        None => prompt_token()?,
    };

    let directory = match &cli.directory {
        Some(d) => d.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let root = resolve_root(&directory)?;
    let config = UploadConfig::from_cli(&cli, root.clone());

    if config.dry_run {
        println!("Dry run without actually uploading...");
    } else {
        println!("Uploading files to Zenodo...");
    }
    tracing::info!(
        environment = ?config.environment,
        base_url = %config.base_url,
        record_id = %config.record_id,
        "Configuration resolved"
    );

    let client = ApiClient::from_config(&config, &token)?;

    let files = scan_directory(&root)?;
    if files.is_empty() {
        println!("No files found in the specified directory.");
        return Ok(());
    }

    println!("Found {} files to upload:", files.len());
    for path in &files {
        println!("  - {}", relative(path, &root).display());
    }

    if config.dry_run {
        println!("Dry run completed. No files were actually uploaded.");
        return Ok(());
    }

    let uploader = Uploader::new(&client, config.retry).with_reporter(TerminalReporter::new());
    let report = uploader.upload_files_to_record(&config.record_id, &files)?;
    println!(
        "Uploaded {} files ({}) to {}",
        report.uploaded.len(),
        HumanBytes(report.total_bytes()),
        report.bucket_url
    );
    println!("Upload completed successfully!");
    Ok(())
}

/// Ask for the token without echoing it.
fn prompt_token() -> Result<String> {
    let token: String = Password::new()
        .with_prompt("Zenodo access token")
        .interact()
        .context("Failed to read access token")?;
    Ok(token)
}

fn relative<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

/// Two-level progress: one bar counting files, one byte bar per attempt
/// that is cleared when the attempt ends.
pub struct TerminalReporter {
    multi: MultiProgress,
    files_bar: RefCell<Option<ProgressBar>>,
    file_bar: RefCell<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new() -> Self {
        TerminalReporter {
            multi: MultiProgress::new(),
            files_bar: RefCell::new(None),
            file_bar: RefCell::new(None),
        }
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for TerminalReporter {
    fn batch_started(&self, total_files: usize) {
        let bar = self.multi.add(ProgressBar::new(total_files as u64));
        bar.set_style(Self::style(
            "{msg} {wide_bar} {pos}/{len} files [{elapsed_precise}]",
        ));
        bar.set_message("Uploading files");
        *self.files_bar.borrow_mut() = Some(bar);
    }

    fn attempt_started(
        &self,
        file_name: &str,
        size: u64,
        attempt: u32,
        max_attempts: u32,
    ) -> Box<dyn ProgressObserver> {
        let bar = self.multi.add(ProgressBar::new(size));
        bar.set_style(Self::style(
            "{msg} {bar:40.cyan/blue} {bytes}/{total_bytes} {bytes_per_sec} ({eta})",
        ));
        bar.set_message(format!("{} [{}/{}]", file_name, attempt + 1, max_attempts));
        *self.file_bar.borrow_mut() = Some(bar.clone());
        Box::new(bar)
    }

    fn attempt_finished(&self, _file_name: &str) {
        if let Some(bar) = self.file_bar.borrow_mut().take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn file_finished(&self, _file_name: &str) {
        if let Some(bar) = self.files_bar.borrow().as_ref() {
            bar.inc(1);
        }
    }

    fn file_failed(&self, file_name: &str, attempts: u32) {
        self.multi.suspend(|| {
            eprintln!("Failed to upload {file_name} after {attempts} attempts");
        });
    }

    fn batch_finished(&self) {
        if let Some(bar) = self.files_bar.borrow_mut().take() {
            bar.finish();
        }
    }

    fn batch_aborted(&self) {
        if let Some(bar) = self.file_bar.borrow_mut().take() {
            bar.finish_and_clear();
        }
        if let Some(bar) = self.files_bar.borrow_mut().take() {
            bar.abandon();
        }
    }
}
