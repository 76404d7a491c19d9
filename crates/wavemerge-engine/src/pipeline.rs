//! The merge pipeline
//!
//! Runs the stages strictly in order: overrides, wave ordering/selection,
//! extraction, universe, aggregation, inconsistency detection, inclusion
//! policy, assembly, integrity. Structural errors abort before any output is
//! produced; quality findings are collected and returned with the result.

use serde::Serialize;
use std::collections::HashSet;
use wavemerge_core::{
    ConfigError, Diagnostic, DiagnosticCode, FrequencyBasis, MergeConfig, MergedDataset, OverrideRule,
    Report, Severity, VariableProfile, Wave, WaveBundle,
};
use crate::aggregator::MetadataAggregator;
use crate::assembler::DatasetAssembler;
use crate::extractor::{ExtractedWave, ExtractionError, MetadataExtractor};
use crate::inconsistency::InconsistencyDetector;
use crate::integrity::IntegrityChecker;
use crate::overrides::{OverrideConflictError, OverrideDirective, OverrideResolver, ResolvedOverrides};
use crate::policy::InclusionPolicy;
use crate::universe::VariableUniverse;
use crate::waves::{order_waves, select_waves};

/// Fatal configuration problems, raised before any merge work
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("No waves to merge")]
    NoWaves,

    #[error("No parent wave configured")]
    ParentNotConfigured,

    #[error("Parent wave '{0}' is not among the loaded waves")]
    MissingParentWave(String),

    #[error("Wave '{0}' was loaded more than once")]
    DuplicateWave(String),

    #[error("Parent wave '{0}' is excluded by wave selection")]
    ParentNotSelected(String),

    #[error(transparent)]
    OverrideConflict(#[from] OverrideConflictError),

    #[error("Manual override lists both retain and remove: {}", .0.join(", "))]
    ManualListConflict(Vec<String>),

    #[error("Provenance column '{0}' collides with a variable name")]
    ProvenanceCollision(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Pipeline error
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),
}

/// Everything a successful run produces
///
/// Contains no clock-dependent data: identical inputs give identical
/// outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    /// Assembled waves, rank order
    pub waves: Vec<Wave>,

    /// Loaded waves left out by wave selection
    pub dropped_waves: Vec<Wave>,

    /// Variable universe in first-seen order
    pub universe: Vec<String>,

    /// Every profile in universe order, decided
    pub profiles: Vec<VariableProfile>,

    pub dataset: MergedDataset,

    /// Advisories and warnings in pipeline order
    pub diagnostics: Vec<Diagnostic>,
}

impl MergeOutcome {
    /// Included variables in final column order
    pub fn included(&self) -> &[String] {
        &self.dataset.variables
    }

    /// Excluded profiles in universe order
    pub fn excluded(&self) -> Vec<&VariableProfile> {
        self.profiles.iter().filter(|p| !p.is_included()).collect()
    }

    pub fn profile(&self, name: &str) -> Option<&VariableProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Diagnostics at warn severity or above
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity >= Severity::Warn)
    }

    /// Force-included variables carrying conflicting value labels
    pub fn force_included_inconsistent(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .filter(|p| p.is_flagged(DiagnosticCode::ForceIncludedInconsistent))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Build the versioned report for this run
    pub fn to_report(&self) -> Result<Report, serde_json::Error> {
        let digest = self.dataset.digest()?;
        let report = Report::from_diagnostics(self.diagnostics.clone())
            .with_counts(
                self.waves.len(),
                self.universe.len(),
                self.dataset.variables.len(),
                self.dataset.row_count(),
            )
            .with_metadata(serde_json::json!({
                "parent_wave": self.waves.first().map(|w| w.id.clone()),
                "waves": self.waves.iter().map(|w| w.id.clone()).collect::<Vec<_>>(),
                "dropped_waves": self.dropped_waves.iter().map(|w| w.id.clone()).collect::<Vec<_>>(),
                "columns": self.dataset.table.columns.clone(),
                "dataset_digest": digest,
            }));
        Ok(report)
    }
}

/// Runs a merge with a fixed configuration
#[derive(Debug, Clone)]
pub struct MergePipeline {
    config: MergeConfig,
}

impl MergePipeline {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    fn parent_wave(&self) -> Result<&str, ConfigurationError> {
        self.config
            .parent_wave
            .as_deref()
            .ok_or(ConfigurationError::ParentNotConfigured)
    }

    /// Merge the given waves under the given override rule rows
    pub fn run(&self, bundles: Vec<WaveBundle>, rules: &[OverrideRule]) -> Result<MergeOutcome, MergeError> {
        let config = &self.config;
        let severity = &config.severity;
        let provenance = config.provenance_column.as_str();
        let parent = self.parent_wave()?;

        let resolver = OverrideResolver::new(&config.overrides).map_err(ConfigurationError::from)?;
        let resolved = resolver.resolve(rules, &config.overrides)?;

        let ordered = order_waves(bundles, parent)?;
        let selection = select_waves(ordered, &config.waves)?;

        let extracted = extract_all(&selection.selected)?;
        tracing::info!(waves = extracted.len(), parent, "extracted wave metadata");

        let mut diagnostics = Vec::new();
        let lists: Vec<Vec<String>> = extracted.iter().map(|w| w.variable_names()).collect();
        let mut universe = VariableUniverse::build(&lists);

        if !selection.dropped.is_empty() {
            if config.frequency.basis == FrequencyBasis::AllLoaded {
                let dropped = extract_all(&selection.dropped)?;
                let mut all: Vec<&ExtractedWave> = extracted.iter().chain(dropped.iter()).collect();
                all.sort_by_key(|w| w.wave.rank);
                let all_lists: Vec<Vec<String>> = all.iter().map(|w| w.variable_names()).collect();
                universe = universe.recount(&all_lists);
            }

            let code = DiagnosticCode::WaveSelectionFrequencyBasis;
            let dropped_ids: Vec<String> = selection.dropped.iter().map(|(w, _)| w.id.clone()).collect();
            diagnostics.push(
                Diagnostic::new(
                    code,
                    severity.severity_for(code),
                    format!(
                        "Wave selection left out {} loaded wave(s); occurrence counts use the '{}' wave set",
                        dropped_ids.len(),
                        config.frequency.basis
                    ),
                )
                .with_waves(dropped_ids),
            );
        }

        if universe.contains(provenance) {
            return Err(ConfigurationError::ProvenanceCollision(provenance.to_string()).into());
        }

        diagnostics.extend(override_diagnostics(config, &resolved, &universe));

        let mut profiles = MetadataAggregator::aggregate(&extracted, &universe);

        let inconsistency = InconsistencyDetector::new(severity).detect(&mut profiles);
        diagnostics.extend(inconsistency.diagnostics.iter().cloned());

        let policy = InclusionPolicy::new(config.frequency.min_occurrences, severity)
            .apply(&mut profiles, &resolved.set, &inconsistency);
        diagnostics.extend(policy.diagnostics.iter().cloned());

        let included: HashSet<&str> = policy.finalized_order.iter().map(|s| s.as_str()).collect();
        let table = DatasetAssembler::new(provenance).assemble(&extracted, &included);

        let finalized: Vec<VariableProfile> = policy
            .finalized_order
            .iter()
            .filter_map(|name| profiles.iter().find(|p| &p.name == name).cloned())
            .collect();
        let (dataset, integrity) =
            IntegrityChecker::new(severity).finalize(table, finalized, provenance, &inconsistency);
        diagnostics.extend(integrity);

        for diagnostic in diagnostics.iter().filter(|d| d.severity >= Severity::Warn) {
            tracing::warn!(code = %diagnostic.code, variable = ?diagnostic.variable, "{}", diagnostic.message);
        }

        tracing::info!(
            columns = dataset.variables.len(),
            rows = dataset.row_count(),
            diagnostics = diagnostics.len(),
            "merge complete"
        );

        Ok(MergeOutcome {
            waves: extracted.iter().map(|w| w.wave.clone()).collect(),
            dropped_waves: selection.dropped.iter().map(|(w, _)| w.clone()).collect(),
            universe: universe.names().to_vec(),
            profiles,
            dataset,
            diagnostics,
        })
    }
}

/// Extract waves in the order given, stopping at the first failure
fn extract_all(waves: &[(Wave, WaveBundle)]) -> Result<Vec<ExtractedWave>, ExtractionError> {
    waves
        .iter()
        .map(|(wave, bundle)| MetadataExtractor::extract(wave, bundle))
        .collect()
}

fn override_diagnostics(
    config: &MergeConfig,
    resolved: &ResolvedOverrides,
    universe: &VariableUniverse,
) -> Vec<Diagnostic> {
    let severity = &config.severity;
    let mut diagnostics = Vec::new();

    for (name, directive) in &resolved.superseded {
        let code = DiagnosticCode::OverrideManualSuperseded;
        let list = match directive {
            OverrideDirective::ForceInclude => "always_retain",
            OverrideDirective::ForceExclude => "always_remove",
        };
        diagnostics.push(
            Diagnostic::new(
                code,
                severity.severity_for(code),
                format!("Manual '{}' entry for '{}' is overruled by the override rule table", list, name),
            )
            .with_variable(name.clone()),
        );
    }

    for name in resolved.set.variables() {
        if universe.contains(name) {
            continue;
        }

        let code = DiagnosticCode::OverrideUnknownVariable;
        let directive = resolved
            .set
            .directive_for(name)
            .map(|d| d.to_string())
            .unwrap_or_default();
        diagnostics.push(
            Diagnostic::new(
                code,
                severity.severity_for(code),
                format!("Override '{}' names '{}', which no merged wave declares", directive, name),
            )
            .with_variable(name),
        );
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavemerge_core::{CellValue, MetadataBundle, RecordTable};

    fn bundle(id: &str, columns: &[&str]) -> WaveBundle {
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let row: Vec<CellValue> = names.iter().map(|_| CellValue::Number(1.0)).collect();
        WaveBundle::new(
            id,
            RecordTable::from_rows(names.clone(), vec![row]),
            MetadataBundle::with_columns(names),
        )
    }

    fn pipeline(parent: &str) -> MergePipeline {
        MergePipeline::new(MergeConfig::default().with_parent_wave(parent))
    }

    #[test]
    fn requires_a_parent_wave() {
        let err = MergePipeline::new(MergeConfig::default())
            .run(vec![bundle("w0", &["a"])], &[])
            .unwrap_err();
        assert!(matches!(err, MergeError::Configuration(ConfigurationError::ParentNotConfigured)));
    }

    #[test]
    fn override_conflict_aborts_before_merge() {
        let rules = vec![OverrideRule::new("a", "include"), OverrideRule::new("a", "exclude")];
        let err = pipeline("w0").run(vec![bundle("w0", &["a"])], &rules).unwrap_err();

        assert!(matches!(
            err,
            MergeError::Configuration(ConfigurationError::OverrideConflict(_))
        ));
    }

    #[test]
    fn provenance_name_must_be_free() {
        let err = pipeline("w0")
            .run(vec![bundle("w0", &["wave"]), bundle("w1", &["wave"])], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::Configuration(ConfigurationError::ProvenanceCollision(_))
        ));
    }

    #[test]
    fn unknown_override_variable_is_reported() {
        let rules = vec![OverrideRule::new("ghost", "include")];
        let outcome = pipeline("w0")
            .run(vec![bundle("w0", &["a"]), bundle("w1", &["a"])], &rules)
            .unwrap();

        assert_eq!(outcome.included(), &["a".to_string()]);
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::OverrideUnknownVariable && d.variable.as_deref() == Some("ghost")));
    }

    #[test]
    fn report_carries_counts_and_digest() {
        let outcome = pipeline("w0")
            .run(vec![bundle("w0", &["a", "b"]), bundle("w1", &["a"])], &[])
            .unwrap();

        let report = outcome.to_report().unwrap();
        assert_eq!(report.summary.waves_merged, 2);
        assert_eq!(report.summary.variables_considered, 2);
        assert_eq!(report.summary.variables_included, 1);
        assert_eq!(report.summary.rows, 2);
        let metadata = report.metadata.unwrap();
        assert_eq!(metadata["dataset_digest"], serde_json::json!(outcome.dataset.digest().unwrap()));
        assert_eq!(metadata["columns"], serde_json::json!(["a", "wave"]));
    }
}
