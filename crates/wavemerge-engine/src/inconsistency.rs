//! Cross-wave inconsistency detection
//!
//! Every facet of every variable is compared for exact equality across the
//! waves that declare it. Value-label disagreement is critical; label text
//! drift on its own is informational and never excludes a variable.

use std::collections::BTreeSet;
use wavemerge_core::{
    Diagnostic, DiagnosticCode, Facet, FacetStatus, SeverityThreshold, VariableProfile,
};
use crate::overrides::OverrideSet;

/// Result of comparing all profiles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InconsistencyReport {
    /// Variables with conflicting value labels
    pub critical: BTreeSet<String>,

    /// Variables whose only label-level problem is label text drift
    pub label_drift: BTreeSet<String>,

    /// One diagnostic per inconsistent (variable, facet)
    pub diagnostics: Vec<Diagnostic>,
}

impl InconsistencyReport {
    pub fn is_critical(&self, variable: &str) -> bool {
        self.critical.contains(variable)
    }

    pub fn has_label_drift(&self, variable: &str) -> bool {
        self.label_drift.contains(variable)
    }

    /// Critically inconsistent variables that are force-included, sorted
    pub fn force_included<'a>(&'a self, overrides: &OverrideSet) -> Vec<&'a str> {
        self.critical
            .iter()
            .filter(|v| overrides.is_force_included(v))
            .map(|v| v.as_str())
            .collect()
    }
}

/// Compares grouped instances facet by facet
pub struct InconsistencyDetector<'a> {
    severity: &'a SeverityThreshold,
}

impl<'a> InconsistencyDetector<'a> {
    pub fn new(severity: &'a SeverityThreshold) -> Self {
        Self { severity }
    }

    /// Set every profile's facet status and collect the inconsistency sets
    pub fn detect(&self, profiles: &mut [VariableProfile]) -> InconsistencyReport {
        let mut report = InconsistencyReport::default();

        for profile in profiles.iter_mut() {
            for facet in Facet::ALL {
                let status = match self.compare(profile, facet) {
                    Some(diagnostic) => {
                        report.diagnostics.push(diagnostic);
                        FacetStatus::Inconsistent
                    }
                    None => FacetStatus::Consistent,
                };
                profile.facet_status.insert(facet, status);
            }

            if profile.is_inconsistent(Facet::ValueLabels) {
                report.critical.insert(profile.name.clone());
            } else if profile.is_inconsistent(Facet::Label) {
                report.label_drift.insert(profile.name.clone());
            }
        }

        tracing::info!(
            critical = report.critical.len(),
            label_drift = report.label_drift.len(),
            "compared metadata facets across waves"
        );

        report
    }

    /// Diagnostic for a facet that disagrees, `None` when all instances agree
    fn compare(&self, profile: &VariableProfile, facet: Facet) -> Option<Diagnostic> {
        let values = profile.facet_values(facet);
        let (anchor_wave, anchor) = values.first()?;

        let dissenting: Vec<_> = values
            .iter()
            .skip(1)
            .filter(|(_, value)| value != anchor)
            .collect();
        let (_, first_dissent) = dissenting.first()?;

        let code = DiagnosticCode::for_facet(facet);
        let waves: Vec<String> = dissenting.iter().map(|(w, _)| w.id.clone()).collect();
        let message = format!(
            "Variable '{}' has differing {} across waves: {} disagree with '{}'",
            profile.name,
            facet,
            waves.join(", "),
            anchor_wave.id
        );

        Some(
            Diagnostic::new(code, self.severity.severity_for(code), message)
                .with_variable(profile.name.clone())
                .with_facet(facet)
                .with_waves(waves)
                .with_comparison(anchor.to_string(), first_dissent.to_string()),
        )
    }
}
