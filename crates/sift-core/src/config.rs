//! Configuration handling for .sift/config.json

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_CLASSIFIER, DEFAULT_MODEL, DEFAULT_THRESHOLD, DEFAULT_TOP_K, Result, SiftError,
    discover,
};

/// Path components containing any of these (case-insensitive) are never indexed.
const EXCLUDED_PATTERNS: &[&str] = &[
    // Python environments & packages
    "venv", ".venv", "env", ".env", "__pycache__", "site-packages", "dist-packages", ".eggs",
    "egg-info",
    // JavaScript/Node
    "node_modules", ".npm", ".yarn", "bower_components",
    // Version control
    ".git", ".svn", ".hg", ".bzr",
    // IDEs & editors
    ".idea", ".vscode", ".vs", ".eclipse", ".settings",
    // Build & distribution
    "build", "dist", "__MACOSX", ".gradle", "target", "out", "bin", "obj",
    // Cache & temp
    ".cache", ".tmp", "temp", "tmp", ".pytest_cache", ".mypy_cache", ".tox",
    // System
    "$RECYCLE.BIN", "System Volume Information", "Thumbs.db", ".DS_Store", "desktop.ini",
];

const EXCLUDED_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "pyd", "so", "dll", "o", "obj", "exe", "bin", "class", "jar", "war", "res",
    "voucher", "dat", "lnk", "azw", "mbpV2", "phl",
];

const POSITIVE_EXTENSIONS: &[&str] = &[
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md", "rst", "csv",
    // Data & config
    "json", "xml", "yaml", "yml",
    // Code
    "py", "js", "ts", "html", "css", "java", "cpp", "c", "h", "go", "rs", "rb", "php", "sql",
    "sh", "bat", "ps1",
    // Media
    "jpg", "jpeg", "png", "gif", "svg", "mp4", "mp3",
    // Archives
    "zip", "rar", "7z", "tar", "gz",
];

const POSITIVE_NAMES: &[&str] = &[
    "readme", "license", "changelog", "config", "settings", "todo", "notes", "docs",
    "documentation", "guide", "main", "index", "app", "application", "project",
];

const POSITIVE_FOLDERS: &[&str] = &[
    "documents", "desktop", "downloads", "projects", "work", "pictures", "photos", "images",
    "videos", "music", "src", "source", "lib", "scripts", "tools",
];

/// Configuration stored in .sift/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (fastembed model ID)
    #[serde(default = "default_model")]
    pub model: String,

    /// Directory to index (default: the directory containing .sift)
    #[serde(default)]
    pub search_root: Option<PathBuf>,

    /// Absolute paths whose whole subtree is never indexed
    #[serde(default)]
    pub excluded_paths: Vec<PathBuf>,

    /// Substrings that exclude any path component containing them
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// File extensions that are never indexed
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,

    /// Classifier strategy name
    #[serde(default = "default_classifier")]
    pub classifier: String,

    /// Minimum heuristic score for a path to be indexed
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f32,

    /// Extensions that raise a path's score
    #[serde(default = "default_positive_extensions")]
    pub positive_extensions: Vec<String>,

    /// File stems that raise a path's score
    #[serde(default = "default_positive_names")]
    pub positive_names: Vec<String>,

    /// Folder names that raise the score of everything beneath them
    #[serde(default = "default_positive_folders")]
    pub positive_folders: Vec<String>,

    /// Number of results returned by a search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Drop cached entries whose path no longer exists when the cache is loaded
    #[serde(default)]
    pub prune_missing: bool,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_classifier() -> String {
    DEFAULT_CLASSIFIER.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_true() -> bool {
    true
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_excluded_patterns() -> Vec<String> {
    to_strings(EXCLUDED_PATTERNS)
}

fn default_excluded_extensions() -> Vec<String> {
    to_strings(EXCLUDED_EXTENSIONS)
}

fn default_positive_extensions() -> Vec<String> {
    to_strings(POSITIVE_EXTENSIONS)
}

fn default_positive_names() -> Vec<String> {
    to_strings(POSITIVE_NAMES)
}

fn default_positive_folders() -> Vec<String> {
    to_strings(POSITIVE_FOLDERS)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            search_root: None,
            excluded_paths: Vec::new(),
            excluded_patterns: default_excluded_patterns(),
            excluded_extensions: default_excluded_extensions(),
            classifier: default_classifier(),
            relevance_threshold: default_threshold(),
            positive_extensions: default_positive_extensions(),
            positive_names: default_positive_names(),
            positive_folders: default_positive_folders(),
            top_k: default_top_k(),
            prune_missing: false,
            show_download_progress: true,
        }
    }
}

impl Config {
    /// Load config from the .sift directory.
    pub fn load(root: &Path) -> Result<Self> {
        let path = discover::config_path(root);
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to the .sift directory.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = discover::config_path(root);
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(SiftError::Config(format!(
                "relevance_threshold must be within [0, 1], got {}",
                self.relevance_threshold
            )));
        }
        if self.top_k == 0 {
            return Err(SiftError::Config("top_k must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The directory that gets crawled, resolved against the repository root.
    pub fn search_root(&self, root: &Path) -> PathBuf {
        match &self.search_root {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => root.join(path),
            None => root.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.classifier, "heuristic");
        assert_eq!(config.top_k, 5);
        assert!(!config.prune_missing);
        assert!(config.excluded_patterns.iter().any(|p| p == "node_modules"));
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config: Config =
            serde_json::from_str(r#"{"top_k": 12, "excluded_patterns": ["secret"]}"#).unwrap();
        assert_eq!(config.top_k, 12);
        assert_eq!(config.excluded_patterns, vec!["secret".to_string()]);
        assert!(!config.positive_folders.is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.relevance_threshold = 1.5;
        assert!(matches!(config.validate(), Err(SiftError::Config(_))));

        let mut config = Config::default();
        config.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_search_root_resolves_against_repo_root() {
        let mut config = Config::default();
        let root = Path::new("/home/alice");
        assert_eq!(config.search_root(root), root);

        config.search_root = Some(PathBuf::from("Documents"));
        assert_eq!(config.search_root(root), Path::new("/home/alice/Documents"));
    }

    #[test]
    fn save_then_load() {
        let temp = tempfile::Builder::new().prefix("sift-config").tempdir().unwrap();
        std::fs::create_dir_all(discover::sift_dir(temp.path())).unwrap();

        let mut config = Config::default();
        config.relevance_threshold = 0.7;
        config.save(temp.path()).unwrap();

        let loaded = Config::load(temp.path()).unwrap();
        assert_eq!(loaded.relevance_threshold, 0.7);
    }
}
