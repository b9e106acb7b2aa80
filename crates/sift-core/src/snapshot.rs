//! In-memory index snapshot: parallel paths, names and embeddings

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Result, SiftError};

/// The complete set of indexed entries at one point in time.
///
/// Entries are stored column-wise. Row `i` of `paths`, `names` and
/// `embeddings` describe the same entry. A snapshot is never mutated in
/// place once built; merging or filtering produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct IndexSnapshot {
    names: Vec<String>,
    paths: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    names: Vec<String>,
    paths: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl TryFrom<RawSnapshot> for IndexSnapshot {
    type Error = SiftError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        Self::new(raw.paths, raw.names, raw.embeddings)
    }
}

impl IndexSnapshot {
    /// Build a snapshot, checking that the columns line up.
    ///
    /// Fails when the columns differ in length, a path repeats, or the
    /// embeddings do not all share one dimension.
    pub fn new(paths: Vec<String>, names: Vec<String>, embeddings: Vec<Vec<f32>>) -> Result<Self> {
        if paths.len() != names.len() || paths.len() != embeddings.len() {
            return Err(SiftError::CacheCorruption(format!(
                "misaligned columns: {} paths, {} names, {} embeddings",
                paths.len(),
                names.len(),
                embeddings.len()
            )));
        }

        let mut seen = HashSet::with_capacity(paths.len());
        if let Some(dup) = paths.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(SiftError::CacheCorruption(format!("duplicate path: {}", dup)));
        }

        if let Some(first) = embeddings.first() {
            let dim = first.len();
            if let Some(row) = embeddings.iter().position(|e| e.len() != dim) {
                return Err(SiftError::CacheCorruption(format!(
                    "embedding {} has dimension {}, expected {}",
                    row,
                    embeddings[row].len(),
                    dim
                )));
            }
        }

        Ok(Self {
            names,
            paths,
            embeddings,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Embedding dimension, or `None` for an empty snapshot.
    pub fn dimension(&self) -> Option<usize> {
        self.embeddings.first().map(Vec::len)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn path_set(&self) -> HashSet<&str> {
        self.paths.iter().map(String::as_str).collect()
    }

    /// Iterate rows as `(path, name, embedding)`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &[f32])> {
        self.paths
            .iter()
            .zip(&self.names)
            .zip(&self.embeddings)
            .map(|((path, name), embedding)| (path.as_str(), name.as_str(), embedding.as_slice()))
    }

    /// Append `delta` after the existing rows.
    ///
    /// Existing rows keep their position and their embeddings; the result
    /// must still satisfy every invariant of [`IndexSnapshot::new`].
    pub fn extend(&self, delta: IndexSnapshot) -> Result<Self> {
        if let (Some(ours), Some(theirs)) = (self.dimension(), delta.dimension()) {
            if ours != theirs {
                return Err(SiftError::Embedding(format!(
                    "cannot merge {}-dimensional embeddings into a {}-dimensional index",
                    theirs, ours
                )));
            }
        }

        let mut paths = self.paths.clone();
        let mut names = self.names.clone();
        let mut embeddings = self.embeddings.clone();
        paths.extend(delta.paths);
        names.extend(delta.names);
        embeddings.extend(delta.embeddings);

        Self::new(paths, names, embeddings)
    }

    /// Keep the rows whose path satisfies `keep`; returns the new snapshot
    /// and how many rows were dropped.
    pub fn retain<F>(&self, mut keep: F) -> (Self, usize)
    where
        F: FnMut(&str) -> bool,
    {
        let mut retained = Self::empty();
        for (path, name, embedding) in self.entries() {
            if keep(path) {
                retained.paths.push(path.to_string());
                retained.names.push(name.to_string());
                retained.embeddings.push(embedding.to_vec());
            }
        }
        let removed = self.len() - retained.len();
        (retained, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(rows: &[(&str, [f32; 2])]) -> IndexSnapshot {
        IndexSnapshot::new(
            rows.iter().map(|(p, _)| format!("/r/{p}")).collect(),
            rows.iter().map(|(p, _)| p.to_string()).collect(),
            rows.iter().map(|(_, e)| e.to_vec()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_misaligned_columns() {
        let result = IndexSnapshot::new(vec!["/a".into()], vec![], vec![vec![1.0]]);
        assert!(matches!(result, Err(SiftError::CacheCorruption(_))));
    }

    #[test]
    fn new_rejects_duplicate_paths() {
        let result = IndexSnapshot::new(
            vec!["/a".into(), "/a".into()],
            vec!["a".into(), "a".into()],
            vec![vec![1.0], vec![2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn new_rejects_ragged_embeddings() {
        let result = IndexSnapshot::new(
            vec!["/a".into(), "/b".into()],
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 0.0], vec![2.0]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn extend_appends_after_existing_rows() {
        let base = snapshot(&[("a", [1.0, 0.0]), ("b", [0.0, 1.0])]);
        let delta = snapshot(&[("c", [1.0, 1.0])]);

        let merged = base.extend(delta).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.names(), &["a", "b", "c"]);
        assert_eq!(merged.embeddings()[0], vec![1.0, 0.0]);
        assert_eq!(merged.embeddings()[2], vec![1.0, 1.0]);
        // the source snapshot is untouched
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn extend_into_empty_adopts_delta() {
        let delta = snapshot(&[("c", [1.0, 1.0])]);
        let merged = IndexSnapshot::empty().extend(delta.clone()).unwrap();
        assert_eq!(merged, delta);
    }

    #[test]
    fn extend_rejects_overlapping_paths_and_dimension_changes() {
        let base = snapshot(&[("a", [1.0, 0.0])]);
        assert!(base.extend(snapshot(&[("a", [0.0, 1.0])])).is_err());

        let wide = IndexSnapshot::new(vec!["/w".into()], vec!["w".into()], vec![vec![1.0; 3]])
            .unwrap();
        assert!(matches!(base.extend(wide), Err(SiftError::Embedding(_))));
    }

    #[test]
    fn retain_keeps_rows_aligned() {
        let base = snapshot(&[("a", [1.0, 0.0]), ("b", [0.0, 1.0]), ("c", [1.0, 1.0])]);
        let (kept, removed) = base.retain(|path| !path.ends_with("/b"));

        assert_eq!(removed, 1);
        assert_eq!(kept.paths(), &["/r/a", "/r/c"]);
        assert_eq!(kept.names(), &["a", "c"]);
        assert_eq!(kept.embeddings(), &[vec![1.0, 0.0], vec![1.0, 1.0]]);
    }

    #[test]
    fn deserialize_enforces_invariants() {
        let bad = r#"{"names": ["a"], "paths": ["/a", "/b"], "embeddings": [[1.0]]}"#;
        assert!(serde_json::from_str::<IndexSnapshot>(bad).is_err());

        let good = r#"{"names": ["a"], "paths": ["/a"], "embeddings": [[1.0]]}"#;
        let snap: IndexSnapshot = serde_json::from_str(good).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.dimension(), Some(1));
    }
}
