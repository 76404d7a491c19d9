//! End-to-end merge scenarios

use pretty_assertions::assert_eq;
use wavemerge_core::{
    CellValue, DiagnosticCode, Facet, FrequencyBasis, InclusionReason, MergeConfig, MetadataBundle, MissingSpec,
    OverrideRule, RecordTable, Severity, StorageType, ValueLabels, WaveBundle, WaveSelection,
};
use wavemerge_engine::{ConfigurationError, ExtractionError, IntegrityChecker, MergeError, MergePipeline};

// =============================================================================
// Fixtures
// =============================================================================

fn value_labels(pairs: &[(&str, &str)]) -> ValueLabels {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Build a wave whose rows hold `base + row` in every column
fn wave(id: &str, columns: &[&str], rows: usize, base: f64) -> WaveBundle {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rows = (0..rows)
        .map(|r| names.iter().map(|_| CellValue::Number(base + r as f64)).collect())
        .collect();
    WaveBundle::new(id, RecordTable::from_rows(names.clone(), rows), MetadataBundle::with_columns(names))
}

/// W0 (parent) declares A, B, C; W1 declares B, C, D with different B value labels
fn scenario_waves() -> Vec<WaveBundle> {
    let mut w0 = wave("W0", &["A", "B", "C"], 2, 0.0);
    w0.metadata.column_labels.insert("A".into(), "Age".into());
    w0.metadata.column_labels.insert("C".into(), "Region".into());
    w0.metadata.value_labels.insert("B".into(), value_labels(&[("1", "Yes"), ("2", "No")]));
    w0.metadata.value_labels.insert("C".into(), value_labels(&[("1", "North"), ("2", "South")]));

    let mut w1 = wave("W1", &["B", "C", "D"], 1, 10.0);
    w1.metadata.column_labels.insert("C".into(), "Region".into());
    w1.metadata.value_labels.insert("B".into(), value_labels(&[("1", "No"), ("2", "Yes")]));
    w1.metadata.value_labels.insert("C".into(), value_labels(&[("1", "North"), ("2", "South")]));

    vec![w0, w1]
}

fn pipeline() -> MergePipeline {
    MergePipeline::new(MergeConfig::default().with_parent_wave("W0"))
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_default_decisions() {
    let outcome = pipeline().run(scenario_waves(), &[]).unwrap();

    assert_eq!(outcome.universe, vec!["A", "B", "C", "D"]);
    assert_eq!(outcome.included(), &["C".to_string()]);
    assert_eq!(outcome.dataset.table.columns, vec!["C", "wave"]);

    let reason = |name: &str| outcome.profile(name).and_then(|p| p.reason());
    assert_eq!(reason("A"), Some(InclusionReason::BelowFrequencyThreshold));
    assert_eq!(reason("B"), Some(InclusionReason::InconsistentMetadata));
    assert_eq!(reason("C"), Some(InclusionReason::DefaultInclude));
    assert_eq!(reason("D"), Some(InclusionReason::BelowFrequencyThreshold));

    assert!(outcome.profile("B").unwrap().is_inconsistent(Facet::ValueLabels));
    assert!(outcome.force_included_inconsistent().is_empty());

    // Rows: parent wave first, original order, then W1
    assert_eq!(
        outcome.dataset.table.rows,
        vec![
            vec![CellValue::Number(0.0), CellValue::Text("W0".into())],
            vec![CellValue::Number(1.0), CellValue::Text("W0".into())],
            vec![CellValue::Number(10.0), CellValue::Text("W1".into())],
        ]
    );
}

#[test]
fn test_force_include_reinstates_after_default_columns() {
    let rules = vec![OverrideRule::new("B", "Force Include")];
    let outcome = pipeline().run(scenario_waves(), &rules).unwrap();

    assert_eq!(outcome.dataset.table.columns, vec!["C", "B", "wave"]);
    assert_eq!(outcome.force_included_inconsistent(), vec!["B"]);

    let b = outcome.profile("B").unwrap();
    assert_eq!(b.reason(), Some(InclusionReason::ForceIncluded));
    assert!(b.decision.unwrap().reinstated);
    assert!(b.is_flagged(DiagnosticCode::ForceIncludedInconsistent));

    // Parent wave's value labels are the finalized ones
    let finalized = b.finalized.as_ref().unwrap();
    assert_eq!(finalized.source_wave, "W0");
    assert_eq!(finalized.value_labels, Some(value_labels(&[("1", "Yes"), ("2", "No")])));

    let warnings: Vec<_> = outcome.warnings().filter(|d| d.code == DiagnosticCode::ForceIncludedInconsistent).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].variable.as_deref(), Some("B"));
    assert_eq!(warnings[0].severity, Severity::Warn);

    // Zero order mismatches after finalization
    assert!(outcome
        .diagnostics
        .iter()
        .all(|d| d.code != DiagnosticCode::IntegrityColumnOrderMismatch));
}

#[test]
fn test_force_exclude_removes_consistent_variable() {
    let rules = vec![OverrideRule::new("C", "exclude")];
    let outcome = pipeline().run(scenario_waves(), &rules).unwrap();

    assert!(outcome.included().is_empty());
    assert_eq!(outcome.dataset.table.columns, vec!["wave"]);
    assert_eq!(outcome.profile("C").unwrap().reason(), Some(InclusionReason::ForceExcluded));
    assert_eq!(outcome.dataset.row_count(), 3);
}

#[test]
fn test_conflicting_directives_are_rejected() {
    let rules = vec![OverrideRule::new("B", "include"), OverrideRule::new("B", "exclude")];
    let err = pipeline().run(scenario_waves(), &rules).unwrap_err();

    match err {
        MergeError::Configuration(ConfigurationError::OverrideConflict(conflict)) => {
            assert_eq!(conflict.variables, vec!["B"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parent_wave_is_rank_zero_regardless_of_load_order() {
    let mut waves = scenario_waves();
    waves.reverse();

    let outcome = pipeline().run(waves, &[]).unwrap();

    assert_eq!(outcome.waves[0].id, "W0");
    assert_eq!(outcome.waves[0].rank, 0);
    assert_eq!(outcome.universe, vec!["A", "B", "C", "D"]);
}

#[test]
fn test_label_drift_does_not_exclude() {
    let mut waves = scenario_waves();
    waves[1].metadata.column_labels.insert("C".into(), "Region of residence".into());

    let outcome = pipeline().run(waves, &[]).unwrap();

    assert_eq!(outcome.included(), &["C".to_string()]);
    let drift: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::LabelDrift)
        .collect();
    assert_eq!(drift.len(), 1);
    assert_eq!(drift[0].severity, Severity::Info);
    assert_eq!(
        outcome.dataset.labels(),
        vec![("C", Some("Region"))],
        "parent wave label wins"
    );
}

#[test]
fn test_empty_override_table_uses_frequency_and_consistency_only() {
    let outcome = pipeline().run(scenario_waves(), &[]).unwrap();
    let reasons: Vec<_> = outcome.profiles.iter().filter_map(|p| p.reason()).collect();

    assert!(!reasons.contains(&InclusionReason::ForceIncluded));
    assert!(!reasons.contains(&InclusionReason::ForceExcluded));
}

#[test]
fn test_idempotent_runs() {
    let rules = vec![OverrideRule::new("B", "include")];

    let first = pipeline().run(scenario_waves(), &rules).unwrap();
    let second = pipeline().run(scenario_waves(), &rules).unwrap();

    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.dataset.digest().unwrap(), second.dataset.digest().unwrap());
}

#[test]
fn test_recheck_after_finalize_is_clean() {
    let rules = vec![OverrideRule::new("A", "retain"), OverrideRule::new("B", "include")];
    let config = MergeConfig::default().with_parent_wave("W0");
    let outcome = MergePipeline::new(config.clone()).run(scenario_waves(), &rules).unwrap();

    assert_eq!(outcome.dataset.table.columns, vec!["C", "A", "B", "wave"]);
    assert!(IntegrityChecker::new(&config.severity).check_order(&outcome.dataset).is_empty());
}

#[test]
fn test_wave_selection_frequency_basis() {
    let mut waves = scenario_waves();
    waves.push(wave("pilot", &["A"], 1, 99.0));

    // Assembled basis: A is only in W0 among selected waves
    let mut config = MergeConfig::default().with_parent_wave("W0");
    config.waves = WaveSelection { retain: vec!["W*".to_string()] };
    let outcome = MergePipeline::new(config.clone()).run(waves.clone(), &[]).unwrap();

    assert_eq!(outcome.dropped_waves.len(), 1);
    assert_eq!(outcome.profile("A").unwrap().reason(), Some(InclusionReason::BelowFrequencyThreshold));
    let basis: Vec<_> = outcome
        .diagnostics
        .iter()
        .filter(|d| d.code == DiagnosticCode::WaveSelectionFrequencyBasis)
        .collect();
    assert_eq!(basis.len(), 1);
    assert_eq!(basis[0].waves, vec!["pilot"]);
    assert!(basis[0].message.contains("assembled"));

    // All-loaded basis: A counts the pilot wave too, but pilot rows stay out
    config.frequency.basis = FrequencyBasis::AllLoaded;
    let outcome = MergePipeline::new(config).run(waves, &[]).unwrap();

    assert_eq!(outcome.profile("A").unwrap().occurrences, 2);
    assert_eq!(outcome.included(), &["A".to_string(), "C".to_string()]);
    assert_eq!(outcome.dataset.row_count(), 3);
}

#[test]
fn test_malformed_wave_is_fatal() {
    let mut waves = scenario_waves();
    waves[1].table.rows[0].pop();

    let err = pipeline().run(waves, &[]).unwrap_err();
    assert!(matches!(err, MergeError::Extraction(ExtractionError::RaggedRow { .. })));
}

#[test]
fn test_missing_parent_is_configuration_error() {
    let pipeline = MergePipeline::new(MergeConfig::default().with_parent_wave("W9"));
    let err = pipeline.run(scenario_waves(), &[]).unwrap_err();

    assert!(matches!(
        err,
        MergeError::Configuration(ConfigurationError::MissingParentWave(ref id)) if id == "W9"
    ));
}

#[test]
fn test_manual_lists_merge_with_rule_table() {
    let mut config = MergeConfig::default().with_parent_wave("W0");
    config.overrides.always_retain = vec!["D".to_string()];
    config.overrides.always_remove = vec!["C".to_string()];

    let rules = vec![OverrideRule::new("C", "include")];
    let outcome = MergePipeline::new(config).run(scenario_waves(), &rules).unwrap();

    assert_eq!(outcome.included(), &["C".to_string(), "D".to_string()]);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::OverrideManualSuperseded && d.variable.as_deref() == Some("C")));
}

#[test]
fn test_metadata_bundle_follows_column_order() {
    let rules = vec![OverrideRule::new("B", "include")];
    let outcome = pipeline().run(scenario_waves(), &rules).unwrap();

    let bundle = outcome.dataset.metadata_bundle();
    let names: Vec<&str> = bundle.iter().map(|e| e.variable.as_str()).collect();
    assert_eq!(names, vec!["C", "B"]);
    assert_eq!(bundle[0].label.as_deref(), Some("Region"));
}

#[test]
fn test_missing_range_and_storage_drift_are_informational() {
    let mut waves = scenario_waves();
    waves[0].metadata.missing_ranges.insert("C".into(), vec![MissingSpec::Range { low: 98.0, high: 99.0 }]);
    waves[1].metadata.missing_ranges.insert("C".into(), vec![MissingSpec::Discrete { value: CellValue::Number(99.0) }]);
    waves[1].metadata.storage_type.insert("C".into(), StorageType::String { width: 8 });

    let outcome = pipeline().run(waves, &[]).unwrap();

    let c = outcome.profile("C").unwrap();
    assert!(c.is_inconsistent(Facet::MissingRanges));
    assert!(c.is_inconsistent(Facet::StorageType));
    assert_eq!(c.reason(), Some(InclusionReason::DefaultInclude));
    assert_eq!(outcome.dataset.table.columns, vec!["C", "wave"]);

    for code in [DiagnosticCode::MissingRangesDrift, DiagnosticCode::StorageTypeDrift] {
        let found: Vec<_> = outcome.diagnostics.iter().filter(|d| d.code == code).collect();
        assert_eq!(found.len(), 1, "{}", code);
        assert_eq!(found[0].severity, Severity::Info);
        assert_eq!(found[0].variable.as_deref(), Some("C"));
        assert_eq!(found[0].waves, vec!["W1"]);
    }

    // Parent wave's declarations are the finalized ones
    let finalized = c.finalized.as_ref().unwrap();
    assert_eq!(finalized.storage, StorageType::Numeric);
    assert_eq!(finalized.missing, vec![MissingSpec::Range { low: 98.0, high: 99.0 }]);
}
