//! Durable index cache stored in .sift/index.json
//!
//! The file holds a one-line JSON header followed by the JSON body:
//!
//! ```text
//! {"version":1,"model":"all-MiniLM-L6-v2","count":2,"checksum":"<blake3 of body>"}
//! {"names":[...],"paths":[...],"embeddings":[[...],[...]]}
//! ```
//!
//! Anything that does not check out is a cache miss, never a fatal error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{CACHE_VERSION, Config, IndexSnapshot, Result, SiftError, discover};

#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    version: u32,
    model: String,
    count: usize,
    checksum: String,
}

/// Loads and saves [`IndexSnapshot`]s for one embedding model.
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
    model: String,
}

impl IndexCache {
    pub fn new(path: PathBuf, model: impl Into<String>) -> Self {
        Self {
            path,
            model: model.into(),
        }
    }

    /// The cache of a sift repository.
    pub fn for_root(root: &Path, config: &Config) -> Self {
        Self::new(discover::cache_path(root), config.model.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted snapshot; a missing or unusable file yields `None`.
    pub fn load(&self) -> Option<IndexSnapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Ignoring cache at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Like [`IndexCache::load`] but reports why a present file was rejected.
    pub fn try_load(&self) -> Result<Option<IndexSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        tracing::info!("Found cache file {}. Loading...", self.path.display());
        let content = std::fs::read_to_string(&self.path)?;
        let (header, body) = content
            .split_once('\n')
            .ok_or_else(|| corrupt("missing header line"))?;

        let header: CacheHeader =
            serde_json::from_str(header).map_err(|e| corrupt(format!("bad header: {}", e)))?;
        if header.version != CACHE_VERSION {
            return Err(corrupt(format!(
                "unsupported version {} (expected {})",
                header.version, CACHE_VERSION
            )));
        }
        if header.model != self.model {
            return Err(corrupt(format!(
                "built with model {} but {} is configured",
                header.model, self.model
            )));
        }
        if checksum(body) != header.checksum {
            return Err(corrupt("checksum mismatch"));
        }

        let snapshot: IndexSnapshot =
            serde_json::from_str(body).map_err(|e| corrupt(format!("bad body: {}", e)))?;
        if snapshot.len() != header.count {
            return Err(corrupt(format!(
                "header promises {} entries, body has {}",
                header.count,
                snapshot.len()
            )));
        }

        tracing::info!("Loaded {} entries from cache", snapshot.len());
        Ok(Some(snapshot))
    }

    /// Atomically replace the persisted snapshot.
    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        self.write(snapshot)
            .map_err(|e| SiftError::CachePersist(format!("{}: {}", self.path.display(), e)))?;
        tracing::info!("Cache saved ({} entries)", snapshot.len());
        Ok(())
    }

    fn write(&self, snapshot: &IndexSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_string(snapshot)?;
        let header = serde_json::to_string(&CacheHeader {
            version: CACHE_VERSION,
            model: self.model.clone(),
            count: snapshot.len(),
            checksum: checksum(&body),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, format!("{}\n{}", header, body))?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Drop entries failing `keep` and persist the result if anything went.
    ///
    /// Save failures are logged; the filtered snapshot is returned either way.
    pub fn filter<F>(&self, snapshot: &IndexSnapshot, keep: F) -> (IndexSnapshot, usize)
    where
        F: FnMut(&str) -> bool,
    {
        let (filtered, removed) = snapshot.retain(keep);
        if removed > 0 {
            tracing::info!("Filtering {} excluded entries from cache...", removed);
            if let Err(e) = self.save(&filtered) {
                tracing::error!("{}", e);
            }
        }
        (filtered, removed)
    }
}

fn checksum(body: &str) -> String {
    blake3::hash(body.as_bytes()).to_hex().to_string()
}

fn corrupt(reason: impl Into<String>) -> SiftError {
    SiftError::CacheCorruption(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch() -> tempfile::TempDir {
        tempfile::Builder::new().prefix("sift-cache").tempdir().unwrap()
    }

    fn sample() -> IndexSnapshot {
        IndexSnapshot::new(
            vec!["/r/report.pdf".into(), "/r/notes".into()],
            vec!["report.pdf".into(), "notes".into()],
            vec![vec![0.25, -0.5, 0.125], vec![0.1, 0.2, 0.3]],
        )
        .unwrap()
    }

    #[test]
    fn missing_file_is_a_miss() {
        let temp = scratch();
        let cache = IndexCache::new(temp.path().join("index.json"), "m");
        assert!(cache.load().is_none());
        assert!(cache.try_load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_reproduces_snapshot() {
        let temp = scratch();
        let cache = IndexCache::new(temp.path().join("nested").join("index.json"), "m");
        let original = sample();

        cache.save(&original).unwrap();
        let loaded = cache.load().unwrap();

        assert_eq!(loaded.paths(), original.paths());
        assert_eq!(loaded.names(), original.names());
        for (a, b) in loaded.embeddings().iter().zip(original.embeddings()) {
            for (x, y) in a.iter().zip(b) {
                assert!((x - y).abs() < 1e-6);
            }
        }
        assert!(!temp.path().join("nested").join("index.json.tmp").exists());
    }

    #[test]
    fn garbage_is_a_miss() {
        let temp = scratch();
        let path = temp.path().join("index.json");
        std::fs::write(&path, "not a cache").unwrap();

        let cache = IndexCache::new(path, "m");
        assert!(cache.load().is_none());
        assert!(matches!(cache.try_load(), Err(SiftError::CacheCorruption(_))));
    }

    #[test]
    fn tampered_body_is_a_miss() {
        let temp = scratch();
        let path = temp.path().join("index.json");
        let cache = IndexCache::new(path.clone(), "m");
        cache.save(&sample()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("report.pdf", "rep0rt.pdf")).unwrap();

        assert!(cache.load().is_none());
    }

    #[test]
    fn other_model_is_a_miss() {
        let temp = scratch();
        let path = temp.path().join("index.json");
        IndexCache::new(path.clone(), "model-a").save(&sample()).unwrap();

        assert!(IndexCache::new(path.clone(), "model-b").load().is_none());
        assert!(IndexCache::new(path, "model-a").load().is_some());
    }

    #[test]
    fn save_failure_is_cache_persist_error() {
        let temp = scratch();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let cache = IndexCache::new(blocker.join("index.json"), "m");
        assert!(matches!(cache.save(&sample()), Err(SiftError::CachePersist(_))));
    }

    #[test]
    fn filter_rewrites_cache_without_removed_entries() {
        let temp = scratch();
        let cache = IndexCache::new(temp.path().join("index.json"), "m");
        let snapshot = sample();
        cache.save(&snapshot).unwrap();

        let (filtered, removed) = cache.filter(&snapshot, |p| !p.ends_with(".pdf"));
        assert_eq!(removed, 1);
        assert_eq!(filtered.paths(), &["/r/notes"]);

        let reloaded = cache.load().unwrap();
        assert_eq!(reloaded, filtered);
    }

    #[test]
    fn filter_without_removals_leaves_file_alone() {
        let temp = scratch();
        let path = temp.path().join("index.json");
        let cache = IndexCache::new(path.clone(), "m");

        let (filtered, removed) = cache.filter(&sample(), |_| true);
        assert_eq!(removed, 0);
        assert_eq!(filtered.len(), 2);
        assert!(!path.exists());
    }
}
