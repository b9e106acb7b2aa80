//! Engine status reported to callers

use std::fmt;

/// Where the engine is in its startup and indexing cycle.
///
/// Only the coordinator moves between states; everyone else reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Initializing,
    DownloadingModel,
    LoadingFromCache,
    /// Queries are answered from the installed snapshot.
    Ready,
    /// No snapshot yet; walking the tree.
    Scanning,
    /// No snapshot yet; embedding this many paths.
    Indexing(usize),
    /// A snapshot is installed; walking the tree for new paths.
    ReadyScanning,
    /// A snapshot is installed; embedding this many new paths.
    ReadyEmbedding(usize),
    SavingCache,
    Error(String),
}

impl EngineStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing..."),
            Self::DownloadingModel => write!(f, "Downloading Model..."),
            Self::LoadingFromCache => write!(f, "Loading from Cache..."),
            Self::Ready => write!(f, "Ready"),
            Self::Scanning => write!(f, "Indexing Files..."),
            Self::Indexing(n) => write!(f, "Embedding {} files...", n),
            Self::ReadyScanning => write!(f, "Ready (Scanning for new files...)"),
            Self::ReadyEmbedding(n) => write!(f, "Ready (Embedding {} new files...)", n),
            Self::SavingCache => write!(f, "Saving Cache..."),
            Self::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings() {
        assert_eq!(EngineStatus::Ready.to_string(), "Ready");
        assert_eq!(
            EngineStatus::ReadyEmbedding(3).to_string(),
            "Ready (Embedding 3 new files...)"
        );
        assert_eq!(
            EngineStatus::Error("no model".into()).to_string(),
            "Error: no model"
        );
        assert!(EngineStatus::Error(String::new()).is_error());
    }
}
