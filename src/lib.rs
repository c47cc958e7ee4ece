// Library root
// -----------
// This crate exposes the library surface used by the `zenodo-upload`
// binary. `main.rs` only sets up logging, parses arguments and hands
// control to `ui::run`.
//
// Module responsibilities:
// - `api`: HTTP interactions with the Zenodo API (record lookup, file PUT)
//   behind a small `Transport` trait.
// - `upload`: the retrying upload engine and the batch driver.
// - `progress`: the progress-observing reader streamed as request body.
// - `scan`: recursive discovery of the files to upload.
// - `cli` / `config`: operator options and environment selection.
// - `ui`: terminal output, credential prompt and progress bars.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod progress;
pub mod scan;
pub mod ui;
pub mod upload;

pub use error::{AttemptError, UploadError};
