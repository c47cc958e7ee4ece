// Directory scanner: lists every regular file below a root directory.
// Order follows the directory walk and is only meant for display.

use crate::error::UploadError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check that `root` is an existing directory and return its absolute form.
pub fn resolve_root(root: &Path) -> Result<PathBuf, UploadError> {
    if !root.is_dir() {
        return Err(UploadError::DirectoryNotFound {
            path: root.to_path_buf(),
        });
    }
    Ok(root.canonicalize()?)
}

/// Recursively collect the absolute paths of all regular files under `root`.
///
/// `root` must exist and be a directory; it is canonicalised first so the
/// returned paths are absolute. Unreadable entries abort the scan.
pub fn scan_directory(root: &Path) -> Result<Vec<PathBuf>, UploadError> {
    let root = resolve_root(root)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(&root) {
        let entry = entry.map_err(|e| UploadError::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    tracing::debug!(root = %root.display(), count = files.len(), "Directory scanned");
    Ok(files)
}
