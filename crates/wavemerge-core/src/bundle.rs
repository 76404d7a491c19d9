//! Shapes exchanged with the wave reader and the override rule table
//!
//! These mirror what a statistical-file reader hands over: a record table
//! plus per-facet maps keyed by variable name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::metadata::{MeasureLevel, MissingSpec, StorageType, ValueLabels};
use crate::table::RecordTable;

/// Metadata container for one wave, keyed by variable name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataBundle {
    /// Declared variables in file order
    pub column_names: Vec<String>,

    #[serde(default)]
    pub column_labels: BTreeMap<String, String>,

    #[serde(default)]
    pub value_labels: BTreeMap<String, ValueLabels>,

    #[serde(default)]
    pub measure: BTreeMap<String, MeasureLevel>,

    #[serde(default)]
    pub display_width: BTreeMap<String, u32>,

    #[serde(default)]
    pub missing_ranges: BTreeMap<String, Vec<MissingSpec>>,

    #[serde(default)]
    pub storage_type: BTreeMap<String, StorageType>,
}

impl MetadataBundle {
    /// Create a bundle that declares the given variables and nothing else
    pub fn with_columns(column_names: Vec<String>) -> Self {
        Self {
            column_names,
            ..Self::default()
        }
    }

    /// Every variable name used as a key in any facet map
    pub fn keyed_variables(&self) -> impl Iterator<Item = &String> {
        self.column_labels
            .keys()
            .chain(self.value_labels.keys())
            .chain(self.measure.keys())
            .chain(self.display_width.keys())
            .chain(self.missing_ranges.keys())
            .chain(self.storage_type.keys())
    }
}

/// One raw wave as delivered by a wave source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveBundle {
    /// Wave identifier
    pub id: String,

    /// Record table
    pub table: RecordTable,

    /// Metadata container
    pub metadata: MetadataBundle,
}

impl WaveBundle {
    pub fn new(id: impl Into<String>, table: RecordTable, metadata: MetadataBundle) -> Self {
        Self {
            id: id.into(),
            table,
            metadata,
        }
    }
}

/// One row of the external override rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    /// Variable name
    pub variable: String,

    /// Free-form directive text as typed by the curator
    pub directive: String,
}

impl OverrideRule {
    pub fn new(variable: impl Into<String>, directive: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            directive: directive.into(),
        }
    }
}
