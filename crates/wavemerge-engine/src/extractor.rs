//! Metadata extraction
//!
//! Turns the reader's per-facet maps into one `VariableMetadataRecord` per
//! declared variable. A wave that cannot be read cleanly aborts the run:
//! skipping it would silently under-represent the variable union.

use std::collections::HashSet;
use wavemerge_core::{MetadataBundle, RecordTable, VariableMetadataRecord, Wave, WaveBundle};

/// Display width assumed when the reader declares none
pub const DEFAULT_DISPLAY_WIDTH: u32 = 8;

/// Errors raised while extracting a wave
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("Wave '{wave}': row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        wave: String,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Wave '{wave}': variable '{variable}' is declared more than once")]
    DuplicateVariable { wave: String, variable: String },

    #[error("Wave '{wave}': metadata refers to undeclared variable '{variable}'")]
    UndeclaredMetadata { wave: String, variable: String },

    #[error("Wave '{wave}': declared variable '{variable}' has no column in the record table")]
    MissingColumn { wave: String, variable: String },

    #[error("Wave '{wave}': record table column '{column}' is not declared in the metadata")]
    UndeclaredColumn { wave: String, column: String },
}

/// A wave after extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedWave {
    pub wave: Wave,

    /// One record per declared variable, in declared order
    pub records: Vec<VariableMetadataRecord>,

    /// The wave's record table, unchanged
    pub table: RecordTable,
}

impl ExtractedWave {
    /// Declared variable names in declared order
    pub fn variable_names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.variable.clone()).collect()
    }

    /// Record for a variable, if this wave declares it
    pub fn record(&self, variable: &str) -> Option<&VariableMetadataRecord> {
        self.records.iter().find(|r| r.variable == variable)
    }
}

/// Parses raw wave metadata into records
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract one wave; the bundle is not modified
    pub fn extract(wave: &Wave, bundle: &WaveBundle) -> Result<ExtractedWave, ExtractionError> {
        let metadata = &bundle.metadata;
        let table = &bundle.table;

        Self::validate(wave, metadata, table)?;

        let records = metadata
            .column_names
            .iter()
            .map(|name| Self::record_for(wave, metadata, name))
            .collect();

        Ok(ExtractedWave {
            wave: wave.clone(),
            records,
            table: table.clone(),
        })
    }

    fn validate(wave: &Wave, metadata: &MetadataBundle, table: &RecordTable) -> Result<(), ExtractionError> {
        let mut declared = HashSet::new();
        for name in &metadata.column_names {
            if !declared.insert(name.as_str()) {
                return Err(ExtractionError::DuplicateVariable {
                    wave: wave.id.clone(),
                    variable: name.clone(),
                });
            }
        }

        if let Some(variable) = metadata.keyed_variables().find(|v| !declared.contains(v.as_str())) {
            return Err(ExtractionError::UndeclaredMetadata {
                wave: wave.id.clone(),
                variable: variable.clone(),
            });
        }

        if let Some(variable) = metadata.column_names.iter().find(|v| !table.has_column(v)) {
            return Err(ExtractionError::MissingColumn {
                wave: wave.id.clone(),
                variable: variable.clone(),
            });
        }

        if let Some(column) = table.columns.iter().find(|c| !declared.contains(c.as_str())) {
            return Err(ExtractionError::UndeclaredColumn {
                wave: wave.id.clone(),
                column: column.clone(),
            });
        }

        if let Some((row, actual)) = table.ragged_row() {
            return Err(ExtractionError::RaggedRow {
                wave: wave.id.clone(),
                row,
                expected: table.columns.len(),
                actual,
            });
        }

        Ok(())
    }

    fn record_for(wave: &Wave, metadata: &MetadataBundle, name: &str) -> VariableMetadataRecord {
        VariableMetadataRecord {
            wave: wave.clone(),
            variable: name.to_string(),
            label: metadata.column_labels.get(name).cloned(),
            value_labels: metadata.value_labels.get(name).cloned(),
            measure: metadata.measure.get(name).copied().unwrap_or_default(),
            display_width: metadata
                .display_width
                .get(name)
                .copied()
                .unwrap_or(DEFAULT_DISPLAY_WIDTH),
            missing: metadata.missing_ranges.get(name).cloned().unwrap_or_default(),
            storage: metadata.storage_type.get(name).copied().unwrap_or_default(),
        }
    }
}
