//! Integrity checks before emission
//!
//! Columns are reordered to the finalized label list, then the (variable,
//! label) pairs are walked once against the physical column order. Findings
//! are reported, never silently fixed.

use wavemerge_core::{
    Diagnostic, DiagnosticCode, Facet, MergedDataset, RecordTable, SeverityThreshold, VariableProfile,
};
use crate::inconsistency::InconsistencyReport;

pub struct IntegrityChecker<'a> {
    severity: &'a SeverityThreshold,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(severity: &'a SeverityThreshold) -> Self {
        Self { severity }
    }

    /// Reorder the assembled table to the finalize order and validate it
    ///
    /// `profiles` are the included profiles in finalize order.
    pub fn finalize(
        &self,
        table: RecordTable,
        profiles: Vec<VariableProfile>,
        provenance_column: &str,
        inconsistency: &InconsistencyReport,
    ) -> (MergedDataset, Vec<Diagnostic>) {
        let variables: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();
        let mut order = variables.clone();
        order.push(provenance_column.to_string());

        let (reordered, missing) = table.reorder(&order);
        let mut diagnostics: Vec<Diagnostic> = missing
            .iter()
            .map(|column| {
                let code = DiagnosticCode::IntegrityMissingColumn;
                Diagnostic::new(
                    code,
                    self.severity.severity_for(code),
                    format!("Finalized column '{}' is absent from the assembled dataset", column),
                )
                .with_variable(column.clone())
            })
            .collect();

        diagnostics.extend(self.check_labels(&profiles, inconsistency));

        let dataset = MergedDataset {
            variables,
            provenance_column: provenance_column.to_string(),
            table: reordered,
            profiles,
        };

        diagnostics.extend(self.check_order(&dataset));
        tracing::debug!(findings = diagnostics.len(), "integrity check finished");

        (dataset, diagnostics)
    }

    /// Advisory when a finalized label is not the first aggregated instance's
    ///
    /// Variables with label drift or value-label conflicts are skipped since
    /// their instances are already known to disagree.
    pub fn check_labels(&self, profiles: &[VariableProfile], inconsistency: &InconsistencyReport) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for profile in profiles {
            if profile.is_inconsistent(Facet::Label)
                || inconsistency.is_critical(&profile.name)
                || inconsistency.has_label_drift(&profile.name)
            {
                continue;
            }

            let finalized = profile.finalized.as_ref().and_then(|e| e.label.clone());
            let first = profile.authoritative().and_then(|r| r.label.clone());

            if finalized != first {
                let code = DiagnosticCode::IntegrityLabelMismatch;
                diagnostics.push(
                    Diagnostic::new(
                        code,
                        self.severity.severity_for(code),
                        format!(
                            "Finalized label of '{}' differs from its first aggregated instance",
                            profile.name
                        ),
                    )
                    .with_variable(profile.name.clone())
                    .with_facet(Facet::Label)
                    .with_comparison(
                        first.unwrap_or_else(|| "<none>".to_string()),
                        finalized.unwrap_or_else(|| "<none>".to_string()),
                    ),
                );
            }
        }

        diagnostics
    }

    /// Compare physical column order with the label list, position by position
    pub fn check_order(&self, dataset: &MergedDataset) -> Vec<Diagnostic> {
        let code = DiagnosticCode::IntegrityColumnOrderMismatch;
        let severity = self.severity.severity_for(code);

        let physical: Vec<&str> = dataset
            .table
            .columns
            .iter()
            .map(|c| c.as_str())
            .filter(|c| *c != dataset.provenance_column)
            .collect();
        let labelled: Vec<&str> = dataset.labels().into_iter().map(|(name, _)| name).collect();

        let mut diagnostics = Vec::new();
        for position in 0..physical.len().max(labelled.len()) {
            let expected = labelled.get(position).copied();
            let actual = physical.get(position).copied();
            if expected == actual {
                continue;
            }

            let variable = expected.or(actual).unwrap_or_default();
            diagnostics.push(
                Diagnostic::new(
                    code,
                    severity,
                    format!(
                        "Column {} is '{}' but the label list expects '{}'",
                        position,
                        actual.unwrap_or("<none>"),
                        expected.unwrap_or("<none>")
                    ),
                )
                .with_variable(variable)
                .with_comparison(expected.unwrap_or("<none>"), actual.unwrap_or("<none>")),
            );
        }

        if dataset.table.columns.last().map(|c| c.as_str()) != Some(dataset.provenance_column.as_str()) {
            diagnostics.push(
                Diagnostic::new(
                    code,
                    severity,
                    format!("Provenance column '{}' is not the last column", dataset.provenance_column),
                )
                .with_variable(dataset.provenance_column.clone()),
            );
        }

        diagnostics
    }
}
