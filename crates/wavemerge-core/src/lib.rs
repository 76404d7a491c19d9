//! WaveMerge Core
//!
//! Core domain model with stable, versioned types.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod metadata;
pub mod table;
pub mod bundle;
pub mod profile;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use metadata::{Wave, Facet, FacetValue, MeasureLevel, MissingSpec, StorageType, ValueLabels, VariableMetadataRecord};
pub use table::{CellValue, RecordTable};
pub use bundle::{WaveBundle, MetadataBundle, OverrideRule};
pub use profile::{VariableProfile, FacetStatus, InclusionDecision, InclusionReason, MetadataEntry, MergedDataset};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{MergeConfig, ConfigError, FrequencyBasis, FrequencyPolicy, OverrideConfig, SeverityThreshold, WaveSelection};
