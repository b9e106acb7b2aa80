/// The name of the sift folder (like .git)
pub const SIFT_DIR: &str = ".sift";

/// Default embedding model
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default classifier strategy
pub const DEFAULT_CLASSIFIER: &str = "heuristic";

/// Default relevance threshold for the heuristic classifier
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Default number of search results
pub const DEFAULT_TOP_K: usize = 5;

/// Number of names embedded per model call while indexing
pub const EMBED_BATCH_SIZE: usize = 256;

/// Guards the cosine denominator against zero vectors
pub const COSINE_EPSILON: f32 = 1e-9;

/// On-disk cache format version
pub const CACHE_VERSION: u32 = 1;
