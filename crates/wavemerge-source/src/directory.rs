//! JSON directory source and sink
//!
//! A wave directory holds one `*.json` file per wave plus an optional
//! `overrides.json` rule table:
//!
//! ```text
//! waves/
//! ├── 2019.json        {"id": "2019", "table": {...}, "metadata": {...}}
//! ├── 2021.json
//! └── overrides.json   [{"variable": "q7", "directive": "force include"}]
//! ```
//!
//! A wave file without an `id` takes its file stem.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use wavemerge_core::{MergedDataset, MetadataBundle, MetadataEntry, OverrideRule, RecordTable, WaveBundle};
use crate::source::{OutputSink, OverrideRuleSource, SourceError, WaveSource};

pub const OVERRIDES_FILE: &str = "overrides.json";
pub const MERGED_DATA_FILE: &str = "merged_data.json";
pub const MERGED_METADATA_FILE: &str = "merged_metadata.json";

#[derive(Deserialize)]
struct WaveFile {
    #[serde(default)]
    id: Option<String>,
    table: RecordTable,
    #[serde(default)]
    metadata: MetadataBundle,
}

/// Reads waves from a directory of JSON files
#[derive(Debug, Clone)]
pub struct JsonDirectorySource {
    root: PathBuf,
    overrides_path: Option<PathBuf>,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            overrides_path: None,
        }
    }

    /// Read the rule table from `path` instead of `<root>/overrides.json`
    pub fn with_overrides_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.overrides_path = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn overrides_file(&self) -> PathBuf {
        self.overrides_path
            .clone()
            .unwrap_or_else(|| self.root.join(OVERRIDES_FILE))
    }

    fn is_wave_file(path: &Path) -> bool {
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        is_json && ![OVERRIDES_FILE, MERGED_DATA_FILE, MERGED_METADATA_FILE].contains(&name)
    }

    fn wave_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }
}

#[async_trait::async_trait]
impl WaveSource for JsonDirectorySource {
    fn name(&self) -> &'static str {
        "JsonDirectory"
    }

    /// File stems of the wave files, sorted by file name
    async fn list_waves(&self) -> Result<Vec<String>, SourceError> {
        let mut ids = Vec::new();
        let entries = WalkDir::new(&self.root).min_depth(1).max_depth(1).sort_by_file_name();

        for entry in entries {
            let entry = entry.map_err(|e| SourceError::IoError(format!("{}: {}", self.root.display(), e)))?;
            if !entry.file_type().is_file() || !Self::is_wave_file(entry.path()) {
                continue;
            }

            let stem = entry
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| SourceError::InvalidWave {
                    path: entry.path().display().to_string(),
                    message: "file name is not valid UTF-8".to_string(),
                })?;
            ids.push(stem.to_string());
        }

        tracing::debug!(root = %self.root.display(), waves = ids.len(), "listed wave files");
        Ok(ids)
    }

    async fn fetch_wave(&self, id: &str) -> Result<WaveBundle, SourceError> {
        let path = self.wave_path(id);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::from_io(&path, &e))?;

        let file: WaveFile = serde_json::from_str(&content).map_err(|e| SourceError::InvalidWave {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(WaveBundle::new(
            file.id.unwrap_or_else(|| id.to_string()),
            file.table,
            file.metadata,
        ))
    }

    async fn test_connection(&self) -> Result<(), SourceError> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| SourceError::from_io(&self.root, &e))?;

        if metadata.is_dir() {
            Ok(())
        } else {
            Err(SourceError::ConnectionError(format!(
                "{} is not a directory",
                self.root.display()
            )))
        }
    }
}

#[async_trait::async_trait]
impl OverrideRuleSource for JsonDirectorySource {
    async fn fetch_rules(&self) -> Result<Vec<OverrideRule>, SourceError> {
        let path = self.overrides_file();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no override table, using none");
                return Ok(Vec::new());
            }
            Err(e) => return Err(SourceError::from_io(&path, &e)),
        };

        serde_json::from_str(&content)
            .map_err(|e| SourceError::InvalidOverrides(format!("{}: {}", path.display(), e)))
    }
}

/// Writes the merged dataset as two JSON files in one directory
#[derive(Debug, Clone)]
pub struct JsonDirectorySink {
    root: PathBuf,
}

impl JsonDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn data_path(&self) -> PathBuf {
        self.root.join(MERGED_DATA_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(MERGED_METADATA_FILE)
    }

    /// Read back a previously written metadata bundle
    pub async fn read_metadata(&self) -> Result<Vec<MetadataEntry>, SourceError> {
        let path = self.metadata_path();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::from_io(&path, &e))?;
        serde_json::from_str(&content).map_err(|e| SourceError::InvalidWave {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Read back a previously written record table
    pub async fn read_data(&self) -> Result<RecordTable, SourceError> {
        let path = self.data_path();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::from_io(&path, &e))?;
        serde_json::from_str(&content).map_err(|e| SourceError::InvalidWave {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn write_json<T: serde::Serialize + Sync>(&self, path: &Path, value: &T) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(value).map_err(|e| SourceError::WriteError(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| SourceError::WriteError(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait::async_trait]
impl OutputSink for JsonDirectorySink {
    async fn write(&self, dataset: &MergedDataset) -> Result<(), SourceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SourceError::WriteError(format!("{}: {}", self.root.display(), e)))?;

        self.write_json(&self.data_path(), &dataset.table).await?;
        self.write_json(&self.metadata_path(), &dataset.metadata_bundle()).await?;

        tracing::info!(
            output = %self.root.display(),
            rows = dataset.row_count(),
            variables = dataset.variables.len(),
            "wrote merged dataset"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wave_file_filter_skips_reserved_names() {
        assert!(JsonDirectorySource::is_wave_file(Path::new("w/2019.json")));
        assert!(!JsonDirectorySource::is_wave_file(Path::new("w/overrides.json")));
        assert!(!JsonDirectorySource::is_wave_file(Path::new("w/merged_metadata.json")));
        assert!(!JsonDirectorySource::is_wave_file(Path::new("w/notes.txt")));
    }

    #[test]
    fn overrides_path_defaults_to_root() {
        let source = JsonDirectorySource::new("waves");
        assert_eq!(source.overrides_file(), PathBuf::from("waves").join(OVERRIDES_FILE));

        let source = source.with_overrides_path("rules.json");
        assert_eq!(source.overrides_file(), PathBuf::from("rules.json"));
    }
}
