//! Filesystem crawler: walk the search root and collect indexable paths

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;

use crate::classifier::{ExclusionRules, PathClassifier};
use crate::{Config, Result, SiftError};

/// Paths found by one scan, with the basenames that get embedded.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    pub paths: Vec<PathBuf>,
    pub names: Vec<String>,
    /// Entries or subtrees that could not be read and were skipped.
    pub skipped: usize,
}

impl ScanResult {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Walks a directory tree, keeping what the classifier accepts.
///
/// Rejected directories are pruned, not descended. Folders that pass are
/// reported alongside files so they can be searched too.
pub struct Crawler {
    classifier: Arc<dyn PathClassifier>,
    rules: ExclusionRules,
}

impl Crawler {
    pub fn new(config: &Config, classifier: Arc<dyn PathClassifier>) -> Self {
        Self {
            classifier,
            rules: ExclusionRules::new(config),
        }
    }

    /// Collect every relevant path under `root` (the root itself excluded).
    pub fn scan(&self, root: &Path) -> Result<ScanResult> {
        if !root.is_dir() {
            return Err(SiftError::Scan(format!(
                "search root is not a directory: {}",
                root.display()
            )));
        }

        let mut result = ScanResult::default();
        if self.rules.is_under_excluded_root(root) {
            tracing::info!("Search root {} is excluded, nothing to scan", root.display());
            return Ok(result);
        }

        let classifier = Arc::clone(&self.classifier);
        let rules = self.rules.clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(false) // Policy belongs to the classifier
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                !hidden
                    && !rules.is_under_excluded_root(entry.path())
                    && classifier.is_relevant(entry.path())
            })
            .build();

        for entry in walker {
            match entry {
                Ok(entry) if entry.depth() == 0 => {}
                Ok(entry) => {
                    result
                        .names
                        .push(entry.file_name().to_string_lossy().into_owned());
                    result.paths.push(entry.into_path());
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    result.skipped += 1;
                }
            }
        }

        tracing::debug!(
            "Scanned {}: {} relevant, {} skipped",
            root.display(),
            result.len(),
            result.skipped
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::HeuristicClassifier;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::fs;

    fn touch(path: PathBuf) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn config_for(root: &Path) -> Config {
        Config {
            excluded_paths: vec![root.join("private")],
            excluded_patterns: vec!["node_modules".into(), "__pycache__".into()],
            excluded_extensions: vec!["exe".into()],
            ..Config::default()
        }
    }

    fn crawler(config: &Config) -> Crawler {
        Crawler::new(config, Arc::new(HeuristicClassifier::new(config).unwrap()))
    }

    fn tree() -> tempfile::TempDir {
        let temp = tempfile::Builder::new().prefix("sift-crawl").tempdir().unwrap();
        let root = temp.path();
        touch(root.join("Documents/report.pdf"));
        touch(root.join("Documents/12345.txt"));
        touch(root.join("node_modules/pkg/index.js"));
        touch(root.join(".git/config"));
        touch(root.join("private/secret.md"));
        touch(root.join("projects/src/main.rs"));
        touch(root.join("_build/keep.txt"));
        touch(root.join("setup.exe"));
        touch(root.join("readme.md"));
        temp
    }

    #[test]
    fn scan_applies_policy_and_prunes() {
        let temp = tree();
        let config = config_for(temp.path());
        let result = crawler(&config).scan(temp.path()).unwrap();

        let names: BTreeSet<&str> = result.names.iter().map(String::as_str).collect();
        let expected: BTreeSet<&str> =
            ["Documents", "report.pdf", "projects", "src", "main.rs", "readme.md"]
                .into_iter()
                .collect();
        assert_eq!(names, expected);
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn paths_and_names_stay_aligned() {
        let temp = tree();
        let config = config_for(temp.path());
        let result = crawler(&config).scan(temp.path()).unwrap();

        assert_eq!(result.paths.len(), result.names.len());
        for (path, name) in result.paths.iter().zip(&result.names) {
            assert!(path.is_absolute());
            assert_eq!(path.file_name().unwrap().to_string_lossy(), name.as_str());
        }
        assert!(result.paths.contains(&temp.path().join("projects/src/main.rs")));
    }

    #[test]
    fn rejected_directory_is_not_descended() {
        let temp = tree();
        let config = config_for(temp.path());
        let result = crawler(&config).scan(temp.path()).unwrap();

        // keep.txt would pass on its own, but its parent _build does not
        assert!(!result.names.iter().any(|n| n == "keep.txt"));
    }

    #[test]
    fn excluded_root_yields_nothing() {
        let temp = tree();
        let mut config = config_for(temp.path());
        config.excluded_paths.push(temp.path().to_path_buf());

        let result = crawler(&config).scan(temp.path()).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn missing_root_is_a_scan_error() {
        let temp = tree();
        let config = config_for(temp.path());
        let result = crawler(&config).scan(&temp.path().join("nope"));
        assert!(matches!(result, Err(SiftError::Scan(_))));
    }

    #[test]
    fn repeated_scans_agree() {
        let temp = tree();
        let config = config_for(temp.path());
        let crawler = crawler(&config);

        let first = crawler.scan(temp.path()).unwrap();
        let second = crawler.scan(temp.path()).unwrap();
        assert_eq!(first.paths, second.paths);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_skipped_and_counted() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tree();
        let locked = temp.path().join("projects/locked");
        touch(locked.join("inner.md"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // permissions do not apply to root
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let config = config_for(temp.path());
        let result = crawler(&config).scan(temp.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let result = result.unwrap();

        assert!(result.skipped >= 1);
        assert!(!result.names.iter().any(|n| n == "inner.md"));
        for sibling in ["main.rs", "report.pdf", "readme.md"] {
            assert!(result.names.iter().any(|n| n == sibling), "missing {sibling}");
        }
    }
}
