//! Embedding generation using fastembed

use std::path::PathBuf;
use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::{Config, Result, SiftError};

/// Turns short texts into fixed-dimension vectors.
///
/// Implementations must be deterministic for a given model so that cached
/// vectors stay comparable with freshly embedded queries.
pub trait Embedder: Send + Sync {
    /// Generate embeddings for a batch of texts, one row per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| SiftError::Embedding("No embedding generated".to_string()))
    }

    /// Output dimension, when known up front.
    fn dimension(&self) -> Option<usize> {
        None
    }
}

/// Loads the embedding runtime. Runs once, off the caller's thread.
pub type ModelLoader = Box<dyn FnOnce() -> Result<Arc<dyn Embedder>> + Send>;

/// Wrapper around fastembed for generating embeddings.
pub struct FastEmbedder {
    model: TextEmbedding,
    dimension: usize,
}

/// Supported model names, their fastembed identifiers and dimensions.
fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let resolved = match name {
        "all-MiniLM-L6-v2" => (EmbeddingModel::AllMiniLML6V2, 384),
        "all-MiniLM-L12-v2" => (EmbeddingModel::AllMiniLML12V2, 384),
        "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        other => {
            return Err(SiftError::ModelLoad(format!(
                "Unknown model: {}. Supported: all-MiniLM-L6-v2, all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                other
            )));
        }
    };
    Ok(resolved)
}

impl FastEmbedder {
    /// Create a new embedder with the model specified in config, downloading
    /// it into `cache_dir` on first use.
    pub fn new(config: &Config, cache_dir: PathBuf) -> Result<Self> {
        let (model_type, dimension) = resolve_model(&config.model)?;

        tracing::info!("Loading model {}...", config.model);
        let options = InitOptions::new(model_type)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(config.show_download_progress);
        let model =
            TextEmbedding::try_new(options).map_err(|e| SiftError::ModelLoad(e.to_string()))?;

        Ok(Self { model, dimension })
    }

    /// A deferred [`FastEmbedder::new`] for the engine's init thread.
    pub fn loader(config: &Config, cache_dir: PathBuf) -> ModelLoader {
        let config = config.clone();
        Box::new(move || {
            let embedder: Arc<dyn Embedder> = Arc::new(Self::new(&config, cache_dir)?);
            Ok(embedder)
        })
    }
}

impl Embedder for FastEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.model
            .embed(texts.to_vec(), None)
            .map_err(|e| SiftError::Embedding(e.to_string()))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Embedder for Fixed {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    struct Silent;

    impl Embedder for Silent {
        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn embed_takes_first_row() {
        assert_eq!(Fixed.embed("abc").unwrap(), vec![3.0, 1.0]);
        assert_eq!(Fixed.dimension(), None);
    }

    #[test]
    fn embed_without_output_is_an_error() {
        assert!(matches!(Silent.embed("abc"), Err(SiftError::Embedding(_))));
    }

    #[test]
    fn unknown_model_is_a_load_error() {
        assert!(matches!(
            resolve_model("word2vec"),
            Err(SiftError::ModelLoad(_))
        ));
        assert_eq!(resolve_model("all-MiniLM-L6-v2").unwrap().1, 384);
    }
}
