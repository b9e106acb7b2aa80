//! sift-core: Semantic search over file and folder names
//!
//! This library crawls a directory tree, decides which paths are worth
//! indexing, embeds their names, and answers natural-language queries by
//! cosine similarity. An index cached from a previous run is served
//! immediately while new paths are embedded in the background.

pub mod audit;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod consts;
pub mod crawl;
pub mod discover;
pub mod embed;
pub mod engine;
pub mod search;
pub mod snapshot;
pub mod status;

pub use classifier::{ClassifierRegistry, HeuristicClassifier, PathClassifier};
pub use config::Config;
pub use consts::*;
pub use discover::find_sift_root;
pub use embed::{Embedder, FastEmbedder};
pub use engine::{Engine, EngineHandle, RunReport};
pub use search::{SearchHit, Searcher};
pub use snapshot::IndexSnapshot;
pub use status::EngineStatus;

#[derive(Debug, thiserror::Error)]
pub enum SiftError {
    #[error("Not in a sift repository (no .sift folder found)")]
    NotInRepo,

    #[error("Already initialized: {0}")]
    AlreadyInitialized(std::path::PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Corrupt cache: {0}")]
    CacheCorruption(String),

    #[error("Failed to persist cache: {0}")]
    CachePersist(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Index is not ready yet")]
    NotReady,

    #[error("Background worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SiftError>;
