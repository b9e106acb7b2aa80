//! Search functionality

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::IndexCache;
use crate::embed::{Embedder, FastEmbedder};
use crate::{COSINE_EPSILON, Config, IndexSnapshot, Result, SiftError, classifier, discover};

/// A ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub name: String,
    pub path: String,
    /// Raw cosine similarity in [-1, 1]
    pub score: f32,
}

/// The single result returned while no index is available.
pub fn not_ready() -> Vec<SearchHit> {
    vec![SearchHit {
        name: "System Initializing...".to_string(),
        path: "Please wait for model to load.".to_string(),
        score: 0.0,
    }]
}

/// Cosine similarity with a guard against zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot / (norm_a * norm_b + COSINE_EPSILON)
}

/// Rank every entry of `snapshot` against `query`, best first.
///
/// Equal scores keep index order.
pub fn rank(query: &[f32], snapshot: &IndexSnapshot, top_k: usize) -> Vec<SearchHit> {
    let mut scored: Vec<(usize, f32)> = snapshot
        .embeddings()
        .iter()
        .map(|embedding| cosine_similarity(query, embedding))
        .enumerate()
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored
        .into_iter()
        .take(top_k)
        .map(|(i, score)| SearchHit {
            name: snapshot.names()[i].clone(),
            path: snapshot.paths()[i].clone(),
            score,
        })
        .collect()
}

/// Searcher for querying one snapshot.
pub struct Searcher {
    embedder: Arc<dyn Embedder>,
    snapshot: Arc<IndexSnapshot>,
}

impl Searcher {
    pub fn new(embedder: Arc<dyn Embedder>, snapshot: Arc<IndexSnapshot>) -> Self {
        Self { embedder, snapshot }
    }

    /// Open the cached index of a sift repository without scanning.
    ///
    /// The cache is filtered with the current policy, like the engine does
    /// at startup. Without a usable cache there is nothing to search and
    /// this returns [`SiftError::NotReady`]; the model is not loaded then.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let cache = IndexCache::for_root(root, &config);
        if !cache.path().exists() {
            return Err(SiftError::NotReady);
        }

        let embedder = FastEmbedder::new(&config, discover::models_dir(root))?;
        Self::from_cache(&config, &cache, Arc::new(embedder))
    }

    /// Load, check and filter `cache` for querying with `embedder`.
    pub fn from_cache(
        config: &Config,
        cache: &IndexCache,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let cached = cache.load().ok_or(SiftError::NotReady)?;

        if let (Some(expected), Some(found)) = (embedder.dimension(), cached.dimension()) {
            if expected != found {
                tracing::warn!(
                    "Ignoring cache: {}-dimensional embeddings, model produces {}",
                    found,
                    expected
                );
                return Err(SiftError::NotReady);
            }
        }

        let classifier = classifier::from_config(config)?;
        let (snapshot, _) = cache.filter(&cached, |p| classifier.is_relevant(Path::new(p)));
        Ok(Self::new(embedder, Arc::new(snapshot)))
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Embed the query once and return the `top_k` closest entries.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embedder.embed(query)?;
        Ok(rank(&query_embedding, &self.snapshot, top_k))
    }
}
