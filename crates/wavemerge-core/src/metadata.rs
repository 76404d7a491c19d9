//! Per-wave variable metadata and the facet vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::table::CellValue;

/// Coded value -> value label text
///
/// Codes are kept in their textual form so that `1` and `1.0` written by
/// different readers still compare as written.
pub type ValueLabels = BTreeMap<String, String>;

/// One survey capture in the merge sequence
///
/// The parent wave always holds rank 0; the rest follow in load order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Wave {
    /// Processing rank (0 = parent)
    pub rank: usize,

    /// Wave identifier, also used as the provenance tag
    pub id: String,
}

impl Wave {
    pub fn new(id: impl Into<String>, rank: usize) -> Self {
        Self { rank, id: id.into() }
    }

    /// Whether this is the parent (reference) wave
    pub fn is_parent(&self) -> bool {
        self.rank == 0
    }
}

impl std::fmt::Display for Wave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.id, self.rank)
    }
}

/// Measurement level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeasureLevel {
    /// Unordered categories
    #[serde(alias = "nominal")]
    Categorical,

    /// Ordered categories
    Ordinal,

    /// Continuous
    Scale,

    /// Not declared by the source file
    #[default]
    Unknown,
}

impl std::fmt::Display for MeasureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Categorical => write!(f, "categorical"),
            Self::Ordinal => write!(f, "ordinal"),
            Self::Scale => write!(f, "scale"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Declared storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Numeric,

    /// Fixed-width string
    String { width: u32 },
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric => write!(f, "NUMERIC"),
            Self::String { width } => write!(f, "A{}", width),
        }
    }
}

/// One user-missing declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MissingSpec {
    /// Inclusive numeric range
    Range { low: f64, high: f64 },

    /// Single discrete value
    Discrete { value: CellValue },
}

impl std::fmt::Display for MissingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range { low, high } => write!(f, "{}..{}", low, high),
            Self::Discrete { value } => write!(f, "{}", value),
        }
    }
}

/// A category of variable metadata compared across waves
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Label,
    ValueLabels,
    MissingRanges,
    DisplayWidth,
    Measure,
    StorageType,
}

impl Facet {
    /// Every facet, in comparison order
    pub const ALL: [Facet; 6] = [
        Facet::Label,
        Facet::ValueLabels,
        Facet::MissingRanges,
        Facet::DisplayWidth,
        Facet::Measure,
        Facet::StorageType,
    ];

    /// Disagreement in a critical facet excludes the variable by default
    pub fn is_critical(&self) -> bool {
        matches!(self, Facet::ValueLabels)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::ValueLabels => "value_labels",
            Self::MissingRanges => "missing_ranges",
            Self::DisplayWidth => "display_width",
            Self::Measure => "measure",
            Self::StorageType => "storage_type",
        }
    }
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of a single facet taken from one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValue {
    Label(Option<String>),
    ValueLabels(Option<ValueLabels>),
    MissingRanges(Vec<MissingSpec>),
    DisplayWidth(u32),
    Measure(MeasureLevel),
    StorageType(StorageType),
}

impl std::fmt::Display for FacetValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label(Some(label)) => write!(f, "{:?}", label),
            Self::Label(None) | Self::ValueLabels(None) => write!(f, "<none>"),
            Self::ValueLabels(Some(labels)) => {
                let pairs: Vec<String> = labels
                    .iter()
                    .map(|(code, text)| format!("{}={:?}", code, text))
                    .collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
            Self::MissingRanges(specs) => {
                let parts: Vec<String> = specs.iter().map(|s| s.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Self::DisplayWidth(width) => write!(f, "{}", width),
            Self::Measure(measure) => write!(f, "{}", measure),
            Self::StorageType(storage) => write!(f, "{}", storage),
        }
    }
}

/// Metadata for one variable as declared by one wave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMetadataRecord {
    /// Wave that declared the variable
    pub wave: Wave,

    /// Variable name
    pub variable: String,

    /// Variable label
    pub label: Option<String>,

    /// Value labels
    pub value_labels: Option<ValueLabels>,

    /// Measurement level
    pub measure: MeasureLevel,

    /// Display width
    pub display_width: u32,

    /// User-missing declarations in declared order
    pub missing: Vec<MissingSpec>,

    /// Storage type
    pub storage: StorageType,
}

impl VariableMetadataRecord {
    /// Create a record with no label and default facets
    pub fn new(wave: Wave, variable: impl Into<String>) -> Self {
        Self {
            wave,
            variable: variable.into(),
            label: None,
            value_labels: None,
            measure: MeasureLevel::Unknown,
            display_width: 8,
            missing: Vec::new(),
            storage: StorageType::Numeric,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_value_labels(mut self, value_labels: ValueLabels) -> Self {
        self.value_labels = Some(value_labels);
        self
    }

    pub fn with_measure(mut self, measure: MeasureLevel) -> Self {
        self.measure = measure;
        self
    }

    pub fn with_display_width(mut self, width: u32) -> Self {
        self.display_width = width;
        self
    }

    pub fn with_missing(mut self, missing: Vec<MissingSpec>) -> Self {
        self.missing = missing;
        self
    }

    pub fn with_storage(mut self, storage: StorageType) -> Self {
        self.storage = storage;
        self
    }

    /// Project one facet out of the record
    pub fn facet(&self, facet: Facet) -> FacetValue {
        match facet {
            Facet::Label => FacetValue::Label(self.label.clone()),
            Facet::ValueLabels => FacetValue::ValueLabels(self.value_labels.clone()),
            Facet::MissingRanges => FacetValue::MissingRanges(self.missing.clone()),
            Facet::DisplayWidth => FacetValue::DisplayWidth(self.display_width),
            Facet::Measure => FacetValue::Measure(self.measure),
            Facet::StorageType => FacetValue::StorageType(self.storage),
        }
    }
}
