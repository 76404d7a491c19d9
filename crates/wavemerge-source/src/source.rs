//! Traits at the I/O boundary of a merge

use wavemerge_core::{MergedDataset, OverrideRule, WaveBundle};

/// Errors that can occur while reading waves or writing results
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("Wave not found: {0}")]
    WaveNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid wave file {path}: {message}")]
    InvalidWave { path: String, message: String },

    #[error("Invalid override table: {0}")]
    InvalidOverrides(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Write failed: {0}")]
    WriteError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),
}

impl SourceError {
    /// Map an I/O error on `path` to the closest variant
    pub fn from_io(path: &std::path::Path, err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::WaveNotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.display().to_string()),
            _ => Self::IoError(format!("{}: {}", path.display(), err)),
        }
    }
}

/// Something that can hand over raw waves
#[async_trait::async_trait]
pub trait WaveSource: Send + Sync {
    /// Source name for logs (e.g. "JsonDirectory")
    fn name(&self) -> &'static str;

    /// Identifiers of every wave this source can deliver, in load order
    async fn list_waves(&self) -> Result<Vec<String>, SourceError>;

    /// Fetch one wave by identifier
    async fn fetch_wave(&self, id: &str) -> Result<WaveBundle, SourceError>;

    /// Check that the source is reachable before a run
    async fn test_connection(&self) -> Result<(), SourceError>;

    /// Fetch every listed wave, preserving load order
    ///
    /// Load order is not rank order; the engine ranks waves itself.
    async fn fetch_all(&self) -> Result<Vec<WaveBundle>, SourceError> {
        let ids = self.list_waves().await?;
        let mut waves = Vec::with_capacity(ids.len());
        for id in ids {
            waves.push(self.fetch_wave(&id).await?);
        }
        tracing::debug!(source = self.name(), waves = waves.len(), "fetched waves");
        Ok(waves)
    }
}

/// Something that can hand over the curator's override rule table
#[async_trait::async_trait]
pub trait OverrideRuleSource: Send + Sync {
    /// Fetch every (variable, directive) row; an absent table is empty
    async fn fetch_rules(&self) -> Result<Vec<OverrideRule>, SourceError>;
}

/// Destination for the finalized dataset and its metadata bundle
#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    async fn write(&self, dataset: &MergedDataset) -> Result<(), SourceError>;
}
