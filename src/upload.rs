// Retrying upload engine.
//
// Files are uploaded strictly one after another. Each file gets a bounded
// retry loop: any failed attempt (transport error, non-2xx status or a
// local read error) is followed by an exponential backoff sleep until the
// retry budget is spent, at which point the whole batch stops.

use crate::api::{file_name, ApiClient, Transport};
use crate::error::UploadError;
use crate::progress::{NullObserver, ProgressObserver};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Wait before the first retry; doubled for each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Attempts per file including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff after failed attempt `attempt` (0-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Blocks the caller between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Hooks for rendering progress. `attempt_started` hands out a fresh
/// observer for the bytes of that attempt.
pub trait ProgressReporter {
    fn batch_started(&self, _total_files: usize) {}

    fn attempt_started(
        &self,
        file_name: &str,
        size: u64,
        attempt: u32,
        max_attempts: u32,
    ) -> Box<dyn ProgressObserver>;

    fn attempt_finished(&self, _file_name: &str) {}

    fn file_finished(&self, _file_name: &str) {}

    fn file_failed(&self, _file_name: &str, _attempts: u32) {}

    fn batch_finished(&self) {}

    /// The batch stopped early, whatever the cause.
    fn batch_aborted(&self) {}
}

/// Reporter that renders nothing.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn attempt_started(&self, _: &str, _: u64, _: u32, _: u32) -> Box<dyn ProgressObserver> {
        Box::new(NullObserver)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Attempting,
    BackoffWait,
    Success,
    Exhausted,
}

/// Per-file bookkeeping, owned by the engine for the duration of one upload.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub path: PathBuf,
    pub size: u64,
    pub attempt: u32,
    pub state: UploadState,
}

impl UploadTask {
    /// The size is read up front; a file that cannot be stat'ed fails the
    /// batch without any retry.
    pub fn new(path: &Path) -> Result<Self, UploadError> {
        let size = std::fs::metadata(path)?.len();
        Ok(UploadTask {
            path: path.to_path_buf(),
            size,
            attempt: 0,
            state: UploadState::Idle,
        })
    }

    /// Number of requests issued for this file so far.
    pub fn attempts(&self) -> u32 {
        match self.state {
            UploadState::Idle => 0,
            _ => self.attempt + 1,
        }
    }
}

/// Outcome of a fully successful batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub bucket_url: String,
    pub uploaded: Vec<UploadTask>,
}

impl BatchReport {
    pub fn total_bytes(&self) -> u64 {
        self.uploaded.iter().map(|t| t.size).sum()
    }
}

pub struct Uploader<'a, T: Transport> {
    client: &'a ApiClient<T>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper + 'a>,
    reporter: Box<dyn ProgressReporter + 'a>,
}

impl<'a, T: Transport> Uploader<'a, T> {
    pub fn new(client: &'a ApiClient<T>, policy: RetryPolicy) -> Self {
        Uploader {
            client,
            policy,
            sleeper: Box::new(ThreadSleeper),
            reporter: Box::new(NoProgress),
        }
    }

    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'a) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'a) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resolve the record's bucket once, then upload every file into it.
    pub fn upload_files_to_record(
        &self,
        record_id: &str,
        files: &[PathBuf],
    ) -> Result<BatchReport, UploadError> {
        let bucket_url = self.client.resolve_bucket(record_id)?;
        self.upload_files(&bucket_url, files)
    }

    /// Upload `files` in order into `bucket_url`. The first file that
    /// exhausts its retries ends the batch; later files are not touched.
    pub fn upload_files(
        &self,
        bucket_url: &str,
        files: &[PathBuf],
    ) -> Result<BatchReport, UploadError> {
        self.reporter.batch_started(files.len());
        let mut uploaded = Vec::with_capacity(files.len());
        for path in files {
            match self.upload(bucket_url, path) {
                Ok(task) => uploaded.push(task),
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Aborting batch");
                    self.reporter.batch_aborted();
                    return Err(e);
                }
            }
        }
        self.reporter.batch_finished();
        tracing::info!(files = uploaded.len(), "Batch uploaded");
        Ok(BatchReport {
            bucket_url: bucket_url.to_string(),
            uploaded,
        })
    }

    /// Upload one file, retrying with exponential backoff.
    pub fn upload(&self, bucket_url: &str, path: &Path) -> Result<UploadTask, UploadError> {
        let mut task = UploadTask::new(path)?;
        let name = file_name(path);
        let max_attempts = self.policy.max_attempts();

        loop {
            task.state = UploadState::Attempting;
            tracing::debug!(file = %name, attempt = task.attempt + 1, max_attempts, "Uploading");
            let observer =
                self.reporter
                    .attempt_started(&name, task.size, task.attempt, max_attempts);
            let result = self.client.put_file(bucket_url, path, observer);
            self.reporter.attempt_finished(&name);

            match result {
                Ok(()) => {
                    task.state = UploadState::Success;
                    tracing::info!(file = %name, bytes = task.size, attempts = task.attempts(), "Uploaded");
                    self.reporter.file_finished(&name);
                    return Ok(task);
                }
                Err(err) if task.attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(task.attempt);
                    tracing::warn!(
                        file = %name,
                        attempt = task.attempt + 1,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Upload attempt failed, backing off"
                    );
                    task.state = UploadState::BackoffWait;
                    self.sleeper.sleep(delay);
                    task.attempt += 1;
                }
                Err(err) => {
                    task.state = UploadState::Exhausted;
                    self.reporter.file_failed(&name, task.attempts());
                    return Err(UploadError::ExhaustedRetries {
                        file: task.path,
                        attempts: task.attempt + 1,
                        source: err,
                    });
                }
            }
        }
    }
}
