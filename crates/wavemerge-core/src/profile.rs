//! Cross-wave variable profiles and the merged dataset

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use crate::diagnostic::DiagnosticCode;
use crate::metadata::{Facet, FacetValue, MeasureLevel, MissingSpec, StorageType, ValueLabels, VariableMetadataRecord, Wave};
use crate::table::RecordTable;

/// Agreement of one facet across waves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetStatus {
    Consistent,
    Inconsistent,
}

/// Why a variable was included or excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InclusionReason {
    BelowFrequencyThreshold,
    InconsistentMetadata,
    ForceExcluded,
    ForceIncluded,
    DefaultInclude,
}

impl InclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelowFrequencyThreshold => "below-frequency-threshold",
            Self::InconsistentMetadata => "inconsistent-metadata",
            Self::ForceExcluded => "force-excluded",
            Self::ForceIncluded => "force-included",
            Self::DefaultInclude => "default-include",
        }
    }
}

impl std::fmt::Display for InclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final include/exclude decision for a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionDecision {
    pub included: bool,

    pub reason: InclusionReason,

    /// Force-included although the frequency/consistency rules would exclude it
    #[serde(default)]
    pub reinstated: bool,
}

impl InclusionDecision {
    pub fn include(reason: InclusionReason) -> Self {
        Self { included: true, reason, reinstated: false }
    }

    pub fn exclude(reason: InclusionReason) -> Self {
        Self { included: false, reason, reinstated: false }
    }
}

/// Finalized metadata for one retained variable
///
/// This is also the entry shape handed to the output sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub variable: String,
    pub label: Option<String>,
    pub value_labels: Option<ValueLabels>,
    pub measure: MeasureLevel,
    pub display_width: u32,
    pub missing: Vec<MissingSpec>,
    pub storage: StorageType,

    /// Wave the values were taken from
    pub source_wave: String,
}

impl MetadataEntry {
    pub fn from_record(record: &VariableMetadataRecord) -> Self {
        Self {
            variable: record.variable.clone(),
            label: record.label.clone(),
            value_labels: record.value_labels.clone(),
            measure: record.measure,
            display_width: record.display_width,
            missing: record.missing.clone(),
            storage: record.storage,
            source_wave: record.wave.id.clone(),
        }
    }
}

/// Everything known about one variable across all waves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableProfile {
    /// Variable name
    pub name: String,

    /// Per-wave records in wave-rank order; never empty
    pub instances: Vec<VariableMetadataRecord>,

    /// Number of waves declaring the variable
    pub occurrences: usize,

    /// Consistency per facet
    pub facet_status: BTreeMap<Facet, FacetStatus>,

    /// Set by the inclusion policy
    pub decision: Option<InclusionDecision>,

    /// Finalized metadata for included variables
    pub finalized: Option<MetadataEntry>,

    /// Diagnostic codes attached to this variable
    #[serde(default)]
    pub flags: Vec<DiagnosticCode>,
}

impl VariableProfile {
    /// Create a profile from records already in wave-rank order
    pub fn new(name: impl Into<String>, instances: Vec<VariableMetadataRecord>) -> Self {
        let occurrences = instances.len();
        Self {
            name: name.into(),
            instances,
            occurrences,
            facet_status: BTreeMap::new(),
            decision: None,
            finalized: None,
            flags: Vec::new(),
        }
    }

    /// The authoritative instance: lowest wave rank
    pub fn authoritative(&self) -> Option<&VariableMetadataRecord> {
        self.instances.first()
    }

    /// One facet's values from every declaring wave, in wave-rank order
    pub fn facet_values(&self, facet: Facet) -> Vec<(&Wave, FacetValue)> {
        self.instances
            .iter()
            .map(|record| (&record.wave, record.facet(facet)))
            .collect()
    }

    /// Whether a facet was found inconsistent
    pub fn is_inconsistent(&self, facet: Facet) -> bool {
        self.facet_status.get(&facet) == Some(&FacetStatus::Inconsistent)
    }

    pub fn is_included(&self) -> bool {
        self.decision.map(|d| d.included).unwrap_or(false)
    }

    pub fn reason(&self) -> Option<InclusionReason> {
        self.decision.map(|d| d.reason)
    }

    /// Attach a diagnostic code once
    pub fn flag(&mut self, code: DiagnosticCode) {
        if !self.flags.contains(&code) {
            self.flags.push(code);
        }
    }

    pub fn is_flagged(&self, code: DiagnosticCode) -> bool {
        self.flags.contains(&code)
    }
}

/// The single merged dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDataset {
    /// Included variables in final order
    pub variables: Vec<String>,

    /// Name of the trailing provenance column
    pub provenance_column: String,

    /// Rows; columns are `variables` followed by the provenance column
    pub table: RecordTable,

    /// Finalized profiles, aligned with `variables`
    pub profiles: Vec<VariableProfile>,
}

impl MergedDataset {
    /// Ordered metadata for the output sink
    pub fn metadata_bundle(&self) -> Vec<MetadataEntry> {
        self.profiles
            .iter()
            .filter_map(|profile| {
                profile
                    .finalized
                    .clone()
                    .or_else(|| profile.authoritative().map(MetadataEntry::from_record))
            })
            .collect()
    }

    /// Ordered (variable, label) pairs
    pub fn labels(&self) -> Vec<(&str, Option<&str>)> {
        self.profiles
            .iter()
            .map(|p| {
                let label = p
                    .finalized
                    .as_ref()
                    .and_then(|entry| entry.label.as_deref());
                (p.name.as_str(), label)
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Hex SHA-256 of the canonical JSON form
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
