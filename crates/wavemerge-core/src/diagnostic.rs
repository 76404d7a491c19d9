//! Diagnostic codes and merge warnings
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};
use crate::metadata::Facet;

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Cross-wave metadata disagreement (1xxx)
    /// Value-label mappings differ between waves (critical)
    ValueLabelsConflict,

    /// Variable label text differs between waves
    LabelDrift,

    /// Display width differs between waves
    DisplayWidthDrift,

    /// Measurement level differs between waves
    MeasureDrift,

    /// Missing-value ranges differ between waves
    MissingRangesDrift,

    /// Declared storage type differs between waves
    StorageTypeDrift,

    // Inclusion policy (2xxx)
    /// Variable was excluded from the merged dataset
    VariableExcluded,

    /// Variable is force-included despite a value-label conflict
    ForceIncludedInconsistent,

    // Override directives (3xxx)
    /// Override directive names a variable no wave declares
    OverrideUnknownVariable,

    /// Manual override list entry was superseded by the rule table
    OverrideManualSuperseded,

    // Wave selection (4xxx)
    /// Wave selection dropped waves; records which set frequency counts used
    WaveSelectionFrequencyBasis,

    // Integrity (5xxx)
    /// Finalized label differs from the first aggregated instance
    IntegrityLabelMismatch,

    /// Physical column order differs from the finalized label list
    IntegrityColumnOrderMismatch,

    /// Finalized variable has no column in the assembled dataset
    IntegrityMissingColumn,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValueLabelsConflict => "VALUE_LABELS_CONFLICT",
            Self::LabelDrift => "LABEL_DRIFT",
            Self::DisplayWidthDrift => "DISPLAY_WIDTH_DRIFT",
            Self::MeasureDrift => "MEASURE_DRIFT",
            Self::MissingRangesDrift => "MISSING_RANGES_DRIFT",
            Self::StorageTypeDrift => "STORAGE_TYPE_DRIFT",
            Self::VariableExcluded => "VARIABLE_EXCLUDED",
            Self::ForceIncludedInconsistent => "FORCE_INCLUDED_INCONSISTENT",
            Self::OverrideUnknownVariable => "OVERRIDE_UNKNOWN_VARIABLE",
            Self::OverrideManualSuperseded => "OVERRIDE_MANUAL_SUPERSEDED",
            Self::WaveSelectionFrequencyBasis => "WAVE_SELECTION_FREQUENCY_BASIS",
            Self::IntegrityLabelMismatch => "INTEGRITY_LABEL_MISMATCH",
            Self::IntegrityColumnOrderMismatch => "INTEGRITY_COLUMN_ORDER_MISMATCH",
            Self::IntegrityMissingColumn => "INTEGRITY_MISSING_COLUMN",
        }
    }

    /// Code used when a facet disagrees across waves
    pub fn for_facet(facet: Facet) -> Self {
        match facet {
            Facet::Label => Self::LabelDrift,
            Facet::ValueLabels => Self::ValueLabelsConflict,
            Facet::MissingRanges => Self::MissingRangesDrift,
            Facet::DisplayWidth => Self::DisplayWidthDrift,
            Facet::Measure => Self::MeasureDrift,
            Facet::StorageType => Self::StorageTypeDrift,
        }
    }

    /// Severity the engine assigns before any configured override
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::ValueLabelsConflict
            | Self::ForceIncludedInconsistent
            | Self::IntegrityColumnOrderMismatch
            | Self::IntegrityMissingColumn => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory - recorded for the operator, no action required
    Info,

    /// Warning - must be reviewed but does not stop the merge
    Warn,

    /// Error - blocking issue
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Variable the diagnostic is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,

    /// Metadata facet involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<Facet>,

    /// Waves involved (identifiers, wave-rank order)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waves: Vec<String>,

    /// Expected value (for comparison diagnostics)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// Actual value (for comparison diagnostics)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            variable: None,
            facet: None,
            waves: Vec::new(),
            expected: None,
            actual: None,
        }
    }

    /// Set the variable
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// Set the facet
    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facet = Some(facet);
        self
    }

    /// Set the waves involved
    pub fn with_waves(mut self, waves: Vec<String>) -> Self {
        self.waves = waves;
        self
    }

    /// Set expected/actual values
    pub fn with_comparison(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}
