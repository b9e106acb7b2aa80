//! Append-only record of newly embedded paths

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use chrono::Local;

/// Writes one block per indexing batch to a plain text log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a timestamped block listing `paths`.
    pub fn append(&self, paths: &[String]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut block = format!("\n--- Embeddings computed at {} ---\n", timestamp);
        for path in paths {
            block.push_str(path);
            block.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())
    }

    /// Append on a detached thread. Failures are logged and otherwise ignored.
    pub fn append_async(&self, paths: Vec<String>) -> Option<JoinHandle<()>> {
        let log = self.clone();
        let spawned = std::thread::Builder::new()
            .name("sift-audit".into())
            .spawn(move || match log.append(&paths) {
                Ok(()) => tracing::info!("Logged {} paths to {}", paths.len(), log.path.display()),
                Err(e) => tracing::warn!("Error writing audit log: {}", e),
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Could not start audit log writer: {}", e);
                None
            }
        }
    }
}
