//! Discovery module: Find .sift root by walking up the directory tree

use std::path::{Path, PathBuf};

use crate::{Result, SIFT_DIR, SiftError};

/// Find the .sift root directory by walking up from the given path.
///
/// Returns the path to the directory containing .sift (not the .sift folder itself).
pub fn find_sift_root(start: &Path) -> Result<PathBuf> {
    let mut current = start.canonicalize()?;

    loop {
        if current.join(SIFT_DIR).is_dir() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(SiftError::NotInRepo),
        }
    }
}

/// Get the .sift directory path for a given root.
pub fn sift_dir(root: &Path) -> PathBuf {
    root.join(SIFT_DIR)
}

/// Get the config file path.
pub fn config_path(root: &Path) -> PathBuf {
    sift_dir(root).join("config.json")
}

/// Get the index cache path.
pub fn cache_path(root: &Path) -> PathBuf {
    sift_dir(root).join("index.json")
}

/// Get the audit log path.
pub fn log_path(root: &Path) -> PathBuf {
    sift_dir(root).join("embeddings_log.txt")
}

/// Get the directory the embedding model is downloaded into.
pub fn models_dir(root: &Path) -> PathBuf {
    sift_dir(root).join("models")
}
