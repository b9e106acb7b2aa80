//! Path relevance classification
//!
//! Decides whether a path is worth indexing by looking only at its string
//! form. File contents are never read, so classification stays cheap enough
//! to run on every entry of a large tree.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use regex::{RegexSet, RegexSetBuilder};

use crate::{Config, Result, SiftError};

/// Names that look generated rather than chosen by a person.
const GENERATED_NAME_PATTERNS: &[&str] = &[
    // Hashes
    r"^[a-f0-9]{32,}$",
    // UUIDs
    r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    // Pure numbers
    r"^\d+$",
    // Leading underscores
    r"^_+",
];

/// Paths nested deeper than this lose score.
const MAX_COMFORTABLE_DEPTH: usize = 8;

const BASE_SCORE: f32 = 0.5;
const POSITIVE_EXTENSION_BONUS: f32 = 0.2;
const POSITIVE_NAME_BONUS: f32 = 0.15;
const POSITIVE_FOLDER_BONUS: f32 = 0.1;
const HIDDEN_PENALTY: f32 = 0.3;
const DEPTH_PENALTY: f32 = 0.1;
const GENERATED_NAME_PENALTY: f32 = 0.3;
const NAME_LENGTH_PENALTY: f32 = 0.1;

/// A strategy deciding whether a path should be indexed.
pub trait PathClassifier: Send + Sync {
    /// Must depend on nothing but the path string and the classifier's own configuration.
    fn is_relevant(&self, path: &Path) -> bool;
}

impl<F> PathClassifier for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn is_relevant(&self, path: &Path) -> bool {
        self(path)
    }
}

/// Constructor registered under a strategy name.
pub type ClassifierCtor = fn(&Config) -> Result<Box<dyn PathClassifier>>;

/// Maps strategy names to constructors.
///
/// Unknown names fail when the classifier is created, never later.
pub struct ClassifierRegistry {
    strategies: BTreeMap<String, ClassifierCtor>,
}

impl ClassifierRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// A registry holding the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("heuristic", heuristic);
        registry
    }

    /// Register (or replace) a strategy.
    pub fn register(&mut self, name: &str, ctor: ClassifierCtor) {
        self.strategies.insert(name.to_string(), ctor);
    }

    /// Names of all registered strategies, sorted.
    pub fn available(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    /// Build the strategy registered under `name`.
    pub fn create(&self, name: &str, config: &Config) -> Result<Arc<dyn PathClassifier>> {
        let ctor = self.strategies.get(name).ok_or_else(|| {
            SiftError::Config(format!(
                "Unknown classifier type: {}. Available: {}",
                name,
                self.available().join(", ")
            ))
        })?;
        Ok(Arc::from(ctor(config)?))
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn heuristic(config: &Config) -> Result<Box<dyn PathClassifier>> {
    Ok(Box::new(HeuristicClassifier::new(config)?))
}

/// Build the classifier named by `config.classifier` from the built-in strategies.
pub fn from_config(config: &Config) -> Result<Arc<dyn PathClassifier>> {
    ClassifierRegistry::with_defaults().create(&config.classifier, config)
}

/// Hard exclusion rules shared by the classifier and the crawler.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    roots: Vec<String>,
    patterns: Vec<String>,
    extensions: HashSet<String>,
}

impl ExclusionRules {
    pub fn new(config: &Config) -> Self {
        Self {
            roots: config
                .excluded_paths
                .iter()
                .map(|p| normalize(&p.to_string_lossy()))
                .collect(),
            patterns: config
                .excluded_patterns
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            extensions: normalize_extensions(&config.excluded_extensions),
        }
    }

    /// True when `path` is one of the excluded roots or lies beneath one.
    pub fn is_under_excluded_root(&self, path: &Path) -> bool {
        let path = normalize(&path.to_string_lossy());
        self.roots.iter().any(|root| {
            path == *root
                || path
                    .strip_prefix(root.as_str())
                    .is_some_and(|rest| rest.starts_with('/') || root.ends_with('/'))
        })
    }

    /// True when any hard exclusion applies to `path`.
    pub fn excludes(&self, path: &Path) -> bool {
        if self.is_under_excluded_root(path) {
            return true;
        }

        let path = path.to_string_lossy();
        let parts = components(&path);
        if parts.iter().any(|part| part.starts_with('.')) {
            return true;
        }

        let lowered: Vec<String> = parts.iter().map(|part| part.to_lowercase()).collect();
        if lowered
            .iter()
            .any(|part| self.patterns.iter().any(|pattern| part.contains(pattern.as_str())))
        {
            return true;
        }

        let (_, ext) = split_extension(lowered.last().map(String::as_str).unwrap_or(""));
        !ext.is_empty() && self.extensions.contains(ext)
    }
}

/// Scores paths by naming and structure, then compares against a threshold.
pub struct HeuristicClassifier {
    rules: ExclusionRules,
    threshold: f32,
    positive_extensions: HashSet<String>,
    positive_names: HashSet<String>,
    positive_folders: HashSet<String>,
    generated_names: RegexSet,
}

impl HeuristicClassifier {
    pub fn new(config: &Config) -> Result<Self> {
        let generated_names = RegexSetBuilder::new(GENERATED_NAME_PATTERNS)
            .case_insensitive(true)
            .build()
            .map_err(|e| SiftError::Config(format!("Invalid name pattern: {}", e)))?;

        Ok(Self {
            rules: ExclusionRules::new(config),
            threshold: config.relevance_threshold,
            positive_extensions: normalize_extensions(&config.positive_extensions),
            positive_names: lowercase_set(&config.positive_names),
            positive_folders: lowercase_set(&config.positive_folders),
            generated_names,
        })
    }

    /// Relevance score in [0, 1], ignoring hard exclusions.
    pub fn score(&self, path: &Path) -> f32 {
        let path = path.to_string_lossy();
        let parts = components(&path);
        let filename = parts.last().copied().unwrap_or("");
        let lowered = filename.to_lowercase();
        let (stem, ext) = split_extension(&lowered);

        let mut score = BASE_SCORE;

        if self.positive_extensions.contains(ext) {
            score += POSITIVE_EXTENSION_BONUS;
        }

        if self.positive_names.contains(stem) {
            score += POSITIVE_NAME_BONUS;
        }

        if parts
            .iter()
            .any(|part| self.positive_folders.contains(&part.to_lowercase()))
        {
            score += POSITIVE_FOLDER_BONUS;
        }

        if filename.starts_with('.') {
            score -= HIDDEN_PENALTY;
        }

        if parts.len() > MAX_COMFORTABLE_DEPTH {
            score -= DEPTH_PENALTY;
        }

        if self.generated_names.is_match(stem) {
            score -= GENERATED_NAME_PENALTY;
        }

        let stem_len = stem.chars().count();
        if !(2..=100).contains(&stem_len) {
            score -= NAME_LENGTH_PENALTY;
        }

        score.clamp(0.0, 1.0)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn rules(&self) -> &ExclusionRules {
        &self.rules
    }
}

impl PathClassifier for HeuristicClassifier {
    fn is_relevant(&self, path: &Path) -> bool {
        if self.rules.excludes(path) {
            return false;
        }
        self.score(path) >= self.threshold
    }
}

/// Split on both separator styles, dropping empty and `.`/`..` components.
fn components(path: &str) -> Vec<&str> {
    path.split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect()
}

/// Lower-case, forward slashes, no trailing slash (except for a bare root).
fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/").to_lowercase();
    match path.trim_end_matches('/') {
        "" if path.starts_with('/') => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// `("report", "pdf")` for `report.pdf`; leading dots never start an extension.
fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(dot) => (&name[..leading + dot], &name[leading + dot + 1..]),
        None => (name, ""),
    }
}

fn normalize_extensions(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_lowercase())
        .collect()
}

fn lowercase_set(items: &[String]) -> HashSet<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}
