// Error types for discovery, record lookup and file uploads.

use std::path::PathBuf;
use thiserror::Error;

/// A single failed upload attempt. Every variant is treated as transient
/// by the retry loop.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// Connection, TLS or protocol failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Opening or reading the local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to the command surface. None of these are retried.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Directory not found: {}", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching the record metadata failed or the bucket link was missing.
    #[error("Failed to look up record {record_id}: {message}")]
    RecordLookup { record_id: String, message: String },

    /// The retry budget for a file was spent; the batch stops here.
    #[error("Failed to upload {} after {attempts} attempts: {source}", file.display())]
    ExhaustedRetries {
        file: PathBuf,
        attempts: u32,
        #[source]
        source: AttemptError,
    },
}

impl UploadError {
    pub fn record_lookup(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        UploadError::RecordLookup {
            record_id: record_id.into(),
            message: message.into(),
        }
    }
}
