//! Index coordination: load the cache, serve it, then embed what is new
//!
//! A run goes through these steps on background threads:
//!
//! 1. load the embedding model (failure is terminal and shown in the status)
//! 2. load the cached snapshot, drop entries the current policy rejects, and
//!    install it so queries work immediately
//! 3. scan the search root
//! 4. embed only paths missing from the installed snapshot
//! 5. append them, install the merged snapshot in one swap, persist it, and
//!    record the new paths in the audit log
//!
//! Only additions are detected. A path deleted from disk stays indexed until
//! the load-time filter drops it, which by default checks policy rather than
//! existence (see [`Config::prune_missing`]).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::thread::JoinHandle;

use crate::audit::AuditLog;
use crate::cache::IndexCache;
use crate::classifier::{self, PathClassifier};
use crate::crawl::Crawler;
use crate::embed::{Embedder, ModelLoader};
use crate::search::{self, SearchHit, Searcher};
use crate::{Config, EMBED_BATCH_SIZE, EngineStatus, IndexSnapshot, Result, SiftError, discover};

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A cached snapshot was installed.
    CacheLoaded { entries: usize, filtered: usize },
    /// The scan finished.
    Scanned { found: usize, new: usize },
    /// Generating embeddings for new paths.
    Embedding { current: usize, total: usize },
    /// The merged snapshot was written to disk.
    Saved { entries: usize },
}

/// Type alias for progress callback.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Stats from one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Entries served from the cache after filtering
    pub cached: usize,
    /// Cached entries dropped by the load-time filter
    pub filtered: usize,
    /// Relevant paths found by the scan
    pub scanned: usize,
    /// Paths embedded in this run
    pub embedded: usize,
    /// Whether a merged snapshot was persisted
    pub saved: bool,
}

/// What the init thread hands back to [`Engine::wait`].
struct RunOutcome {
    report: RunReport,
    audit: Option<JoinHandle<()>>,
}

/// State the worker writes and readers observe.
///
/// The worker is the only writer. Each write replaces a whole value, so a
/// reader sees either the previous snapshot or the next one, never a mix.
struct Shared {
    status: RwLock<EngineStatus>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
    embedder: OnceLock<Arc<dyn Embedder>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: RwLock::new(EngineStatus::Initializing),
            snapshot: RwLock::new(None),
            embedder: OnceLock::new(),
        }
    }

    fn status(&self) -> EngineStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_status(&self, status: EngineStatus) {
        tracing::debug!("Status: {}", status);
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }

    fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, snapshot: Arc<IndexSnapshot>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    fn is_ready(&self) -> bool {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Read-only view of a running engine. Cheap to clone; never blocks on indexing.
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
    top_k: usize,
}

impl EngineHandle {
    pub fn status(&self) -> EngineStatus {
        self.shared.status()
    }

    /// The status as shown to users.
    pub fn get_status(&self) -> String {
        self.status().to_string()
    }

    /// The currently installed snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.shared.snapshot()
    }

    /// True once queries are answered from a real index.
    pub fn is_ready(&self) -> bool {
        self.shared.embedder.get().is_some() && self.shared.is_ready()
    }

    /// A searcher pinned to the snapshot installed right now.
    pub fn searcher(&self) -> Result<Searcher> {
        let embedder = self
            .shared
            .embedder
            .get()
            .cloned()
            .ok_or(SiftError::NotReady)?;
        let snapshot = self.shared.snapshot().ok_or(SiftError::NotReady)?;
        Ok(Searcher::new(embedder, snapshot))
    }

    /// Search with the configured result count.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.search_top(query, self.top_k)
    }

    /// Search for the `top_k` best matches; before the index is usable this
    /// returns a single "not ready" hit instead of an error.
    pub fn search_top(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        match self.searcher() {
            Ok(searcher) => searcher.search(query, top_k),
            Err(SiftError::NotReady) => Ok(search::not_ready()),
            Err(e) => Err(e),
        }
    }
}

/// Configures and starts an [`Engine`].
pub struct EngineBuilder {
    config: Config,
    search_root: PathBuf,
    cache: IndexCache,
    audit: AuditLog,
    classifier: Arc<dyn PathClassifier>,
    progress: Option<ProgressCallback>,
}

impl EngineBuilder {
    /// Defaults for the sift repository at `root`.
    ///
    /// Fails if the configuration is invalid or names an unknown classifier.
    pub fn new(config: &Config, root: &Path) -> Result<Self> {
        config.validate()?;
        let classifier = classifier::from_config(config)?;

        Ok(Self {
            config: config.clone(),
            search_root: config.search_root(root),
            cache: IndexCache::for_root(root, config),
            audit: AuditLog::new(discover::log_path(root)),
            classifier,
            progress: None,
        })
    }

    /// Use a different relevance strategy.
    pub fn classifier(mut self, classifier: Arc<dyn PathClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Set a callback to receive progress updates.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Spawn the background work and return immediately.
    pub fn start(self, loader: ModelLoader) -> Result<Engine> {
        let shared = Arc::new(Shared::new());
        let handle = EngineHandle {
            shared: Arc::clone(&shared),
            top_k: self.config.top_k,
        };

        let pipeline = Pipeline {
            crawler: Crawler::new(&self.config, Arc::clone(&self.classifier)),
            search_root: self.search_root,
            cache: self.cache,
            audit: self.audit,
            classifier: self.classifier,
            prune_missing: self.config.prune_missing,
            progress: self.progress,
        };

        let worker = std::thread::Builder::new()
            .name("sift-init".into())
            .spawn(move || {
                let result = pipeline.run(Arc::clone(&shared), loader);
                if let Err(e) = &result {
                    tracing::error!("Indexing failed: {}", e);
                    shared.set_status(EngineStatus::Error(e.to_string()));
                }
                result
            })
            .map_err(|e| SiftError::Worker(e.to_string()))?;

        Ok(Engine {
            handle,
            worker: Some(worker),
        })
    }
}

/// Owns the index state and the background work that updates it.
pub struct Engine {
    handle: EngineHandle,
    worker: Option<JoinHandle<Result<RunOutcome>>>,
}

impl Engine {
    /// Start an engine for the sift repository at `root`.
    pub fn start(config: &Config, root: &Path, loader: ModelLoader) -> Result<Self> {
        EngineBuilder::new(config, root)?.start(loader)
    }

    pub fn builder(config: &Config, root: &Path) -> Result<EngineBuilder> {
        EngineBuilder::new(config, root)
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.handle.status()
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.handle.search(query)
    }

    /// True once the background work has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Block until the background work ends and return its report.
    ///
    /// This includes the audit log write for the paths embedded in this run.
    pub fn wait(&mut self) -> Result<RunReport> {
        let worker = self
            .worker
            .take()
            .ok_or_else(|| SiftError::Worker("engine already joined".to_string()))?;

        match worker.join() {
            Ok(Ok(outcome)) => {
                if let Some(audit) = outcome.audit {
                    if audit.join().is_err() {
                        tracing::warn!("Audit log writer panicked");
                    }
                }
                Ok(outcome.report)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let message = "initialization thread panicked".to_string();
                self.handle
                    .shared
                    .set_status(EngineStatus::Error(message.clone()));
                Err(SiftError::Worker(message))
            }
        }
    }
}

/// Everything the background work needs, moved onto its threads.
struct Pipeline {
    search_root: PathBuf,
    cache: IndexCache,
    audit: AuditLog,
    classifier: Arc<dyn PathClassifier>,
    crawler: Crawler,
    prune_missing: bool,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    fn emit(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress {
            callback(event);
        }
    }

    /// Initialization task: model, then cache. Hands the rest of the run to
    /// the update task and waits for it.
    fn run(self, shared: Arc<Shared>, loader: ModelLoader) -> Result<RunOutcome> {
        let mut report = RunReport::default();

        tracing::info!("Loading model...");
        shared.set_status(EngineStatus::DownloadingModel);
        let embedder = loader()?;
        let _ = shared.embedder.set(Arc::clone(&embedder));

        self.load_cache(&shared, embedder.as_ref(), &mut report);

        let update = std::thread::Builder::new()
            .name("sift-update".into())
            .spawn(move || {
                self.update(&shared, embedder.as_ref(), &mut report)
                    .map(|audit| RunOutcome { report, audit })
            })
            .map_err(|e| SiftError::Worker(e.to_string()))?;

        update
            .join()
            .map_err(|_| SiftError::Worker("update thread panicked".to_string()))?
    }

    fn load_cache(&self, shared: &Shared, embedder: &dyn Embedder, report: &mut RunReport) {
        shared.set_status(EngineStatus::LoadingFromCache);
        let Some(cached) = self.cache.load() else {
            return;
        };

        if let (Some(expected), Some(found)) = (embedder.dimension(), cached.dimension()) {
            if expected != found {
                tracing::warn!(
                    "Ignoring cache: {}-dimensional embeddings, model produces {}",
                    found,
                    expected
                );
                return;
            }
        }

        let prune_missing = self.prune_missing;
        let (snapshot, removed) = self.cache.filter(&cached, |path| {
            let path = Path::new(path);
            self.classifier.is_relevant(path) && (!prune_missing || path.exists())
        });

        tracing::info!("Loaded index from cache ({} entries).", snapshot.len());
        report.cached = snapshot.len();
        report.filtered = removed;
        shared.install(Arc::new(snapshot));
        shared.set_status(EngineStatus::Ready);
        self.emit(ProgressEvent::CacheLoaded {
            entries: report.cached,
            filtered: removed,
        });
    }

    /// Update task: scan, diff, embed the delta, merge, persist, log.
    ///
    /// Returns the audit log writer, if one was started.
    fn update(
        &self,
        shared: &Shared,
        embedder: &dyn Embedder,
        report: &mut RunReport,
    ) -> Result<Option<JoinHandle<()>>> {
        tracing::info!("Starting background index update...");
        let ready = shared.is_ready();
        shared.set_status(if ready {
            EngineStatus::ReadyScanning
        } else {
            EngineStatus::Scanning
        });

        let scan = self.crawler.scan(&self.search_root)?;
        report.scanned = scan.len();

        let existing = shared.snapshot();
        let (new_paths, new_names) = {
            let known: HashSet<&str> = existing
                .as_deref()
                .map(IndexSnapshot::path_set)
                .unwrap_or_default();
            let mut seen = HashSet::new();
            let mut new_paths = Vec::new();
            let mut new_names = Vec::new();
            for (path, name) in scan.paths.iter().zip(scan.names) {
                let path = path.to_string_lossy().into_owned();
                if known.contains(path.as_str()) || !seen.insert(path.clone()) {
                    continue;
                }
                new_paths.push(path);
                new_names.push(name);
            }
            (new_paths, new_names)
        };

        self.emit(ProgressEvent::Scanned {
            found: report.scanned,
            new: new_paths.len(),
        });

        if new_paths.is_empty() {
            tracing::info!("No new files found.");
            if existing.is_none() {
                shared.install(Arc::new(IndexSnapshot::empty()));
            }
            shared.set_status(EngineStatus::Ready);
            return Ok(None);
        }

        let total = new_paths.len();
        tracing::info!("Found {} new files.", total);
        shared.set_status(if ready {
            EngineStatus::ReadyEmbedding(total)
        } else {
            EngineStatus::Indexing(total)
        });

        let embeddings = self.embed_names(embedder, &new_names)?;
        report.embedded = total;

        let delta = IndexSnapshot::new(new_paths.clone(), new_names, embeddings)?;
        let merged = Arc::new(existing.unwrap_or_default().extend(delta)?);
        shared.install(Arc::clone(&merged));
        tracing::info!("Background update complete ({} entries).", merged.len());

        report.saved = self.persist(shared, &merged);
        shared.set_status(EngineStatus::Ready);

        Ok(self.audit.append_async(new_paths))
    }

    fn embed_names(&self, embedder: &dyn Embedder, names: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(names.len());
        for batch in names.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = embedder.embed_batch(&texts)?;
            if vectors.len() != texts.len() {
                return Err(SiftError::Embedding(format!(
                    "model returned {} embeddings for {} names",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            self.emit(ProgressEvent::Embedding {
                current: embeddings.len(),
                total: names.len(),
            });
        }
        Ok(embeddings)
    }

    /// Save the merged snapshot; failures are logged and the in-memory
    /// snapshot stays authoritative until the next successful save.
    fn persist(&self, shared: &Shared, snapshot: &IndexSnapshot) -> bool {
        shared.set_status(EngineStatus::SavingCache);
        match self.cache.save(snapshot) {
            Ok(()) => {
                self.emit(ProgressEvent::Saved {
                    entries: snapshot.len(),
                });
                true
            }
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_replaces_whole_snapshot() {
        let shared = Shared::new();
        assert!(!shared.is_ready());

        let first = Arc::new(IndexSnapshot::empty());
        shared.install(Arc::clone(&first));
        let held = shared.snapshot().unwrap();

        let second = Arc::new(
            IndexSnapshot::new(vec!["/a".into()], vec!["a".into()], vec![vec![1.0]]).unwrap(),
        );
        shared.install(second);

        // a reader keeps the snapshot it grabbed
        assert!(held.is_empty());
        assert_eq!(shared.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn handle_without_embedder_is_not_ready() {
        let handle = EngineHandle {
            shared: Arc::new(Shared::new()),
            top_k: 5,
        };
        handle.shared.install(Arc::new(IndexSnapshot::empty()));

        assert!(!handle.is_ready());
        assert!(matches!(handle.searcher(), Err(SiftError::NotReady)));
        assert_eq!(handle.search("x").unwrap(), search::not_ready());
        assert_eq!(handle.get_status(), "Initializing...");
    }
}
