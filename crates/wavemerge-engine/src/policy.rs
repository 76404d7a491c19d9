//! Inclusion policy
//!
//! Decision order per variable, first match wins:
//! 1. force-exclude directive -> excluded
//! 2. force-include directive -> included (warns when value labels conflict)
//! 3. occurrence count below threshold -> excluded
//! 4. value-label conflict -> excluded
//! 5. otherwise -> included
//!
//! Finalized metadata for an included variable is always its lowest-rank
//! instance.

use wavemerge_core::{
    Diagnostic, DiagnosticCode, InclusionDecision, InclusionReason, MetadataEntry,
    SeverityThreshold, VariableProfile,
};
use crate::inconsistency::InconsistencyReport;
use crate::overrides::{OverrideDirective, OverrideSet};

/// Output of applying the policy to every profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyOutcome {
    /// Included variables in finalize order
    pub finalized_order: Vec<String>,

    pub diagnostics: Vec<Diagnostic>,
}

pub struct InclusionPolicy<'a> {
    min_occurrences: usize,
    severity: &'a SeverityThreshold,
}

impl<'a> InclusionPolicy<'a> {
    pub fn new(min_occurrences: usize, severity: &'a SeverityThreshold) -> Self {
        Self {
            min_occurrences,
            severity,
        }
    }

    /// Decide a single variable
    pub fn decide(
        &self,
        profile: &VariableProfile,
        overrides: &OverrideSet,
        inconsistency: &InconsistencyReport,
    ) -> InclusionDecision {
        match overrides.directive_for(&profile.name) {
            Some(OverrideDirective::ForceExclude) => InclusionDecision::exclude(InclusionReason::ForceExcluded),
            Some(OverrideDirective::ForceInclude) => InclusionDecision {
                included: true,
                reason: InclusionReason::ForceIncluded,
                reinstated: !self.baseline(profile, inconsistency).included,
            },
            None => self.baseline(profile, inconsistency),
        }
    }

    /// Rules 3-5, ignoring directives
    fn baseline(&self, profile: &VariableProfile, inconsistency: &InconsistencyReport) -> InclusionDecision {
        if profile.occurrences < self.min_occurrences {
            InclusionDecision::exclude(InclusionReason::BelowFrequencyThreshold)
        } else if inconsistency.is_critical(&profile.name) {
            InclusionDecision::exclude(InclusionReason::InconsistentMetadata)
        } else {
            InclusionDecision::include(InclusionReason::DefaultInclude)
        }
    }

    /// Decide every profile, finalize metadata and compute the finalize order
    ///
    /// Variables included on their own merits keep universe order; reinstated
    /// variables follow them, also in universe order.
    pub fn apply(
        &self,
        profiles: &mut [VariableProfile],
        overrides: &OverrideSet,
        inconsistency: &InconsistencyReport,
    ) -> PolicyOutcome {
        let mut outcome = PolicyOutcome::default();
        let mut reinstated = Vec::new();

        for profile in profiles.iter_mut() {
            let decision = self.decide(profile, overrides, inconsistency);
            profile.decision = Some(decision);

            if !decision.included {
                profile.finalized = None;
                tracing::debug!(variable = %profile.name, reason = %decision.reason, "excluded variable");
                outcome.diagnostics.push(self.exclusion_diagnostic(profile, decision.reason));
                continue;
            }

            profile.finalized = profile.authoritative().map(MetadataEntry::from_record);

            if decision.reason == InclusionReason::ForceIncluded && inconsistency.is_critical(&profile.name) {
                let code = DiagnosticCode::ForceIncludedInconsistent;
                profile.flag(code);
                outcome.diagnostics.push(
                    Diagnostic::new(
                        code,
                        self.severity.severity_for(code),
                        format!(
                            "Variable '{}' is force-included although its value labels differ across waves",
                            profile.name
                        ),
                    )
                    .with_variable(profile.name.clone())
                    .with_facet(wavemerge_core::Facet::ValueLabels),
                );
            }

            if decision.reinstated {
                reinstated.push(profile.name.clone());
            } else {
                outcome.finalized_order.push(profile.name.clone());
            }
        }

        let flagged = inconsistency.force_included(overrides);
        if !flagged.is_empty() {
            tracing::warn!(
                variables = %flagged.join(", "),
                "force-included variables have conflicting value labels"
            );
        }

        outcome.finalized_order.extend(reinstated);

        tracing::info!(
            included = outcome.finalized_order.len(),
            excluded = profiles.len() - outcome.finalized_order.len(),
            "applied inclusion policy"
        );

        outcome
    }

    fn exclusion_diagnostic(&self, profile: &VariableProfile, reason: InclusionReason) -> Diagnostic {
        let detail = match reason {
            InclusionReason::BelowFrequencyThreshold => format!(
                "declared in {} wave(s), minimum is {}",
                profile.occurrences, self.min_occurrences
            ),
            InclusionReason::InconsistentMetadata => "value labels differ across waves".to_string(),
            InclusionReason::ForceExcluded => "force-excluded by override".to_string(),
            InclusionReason::ForceIncluded | InclusionReason::DefaultInclude => String::new(),
        };

        let code = DiagnosticCode::VariableExcluded;
        Diagnostic::new(
            code,
            self.severity.severity_for(code),
            format!("Variable '{}' excluded ({}): {}", profile.name, reason, detail),
        )
        .with_variable(profile.name.clone())
        .with_waves(profile.instances.iter().map(|r| r.wave.id.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavemerge_core::{VariableMetadataRecord, Wave};

    fn profile(name: &str, waves: usize) -> VariableProfile {
        let records = (0..waves)
            .map(|rank| {
                VariableMetadataRecord::new(Wave::new(format!("w{}", rank), rank), name)
                    .with_label(format!("{} from w{}", name, rank))
            })
            .collect();
        VariableProfile::new(name, records)
    }

    fn critical(names: &[&str]) -> InconsistencyReport {
        InconsistencyReport {
            critical: names.iter().map(|s| s.to_string()).collect(),
            ..InconsistencyReport::default()
        }
    }

    #[test]
    fn single_occurrence_is_excluded_unless_forced() {
        let severity = SeverityThreshold::default();
        let policy = InclusionPolicy::new(2, &severity);
        let lonely = profile("A", 1);

        let decision = policy.decide(&lonely, &OverrideSet::default(), &InconsistencyReport::default());
        assert_eq!(decision, InclusionDecision::exclude(InclusionReason::BelowFrequencyThreshold));

        let mut overrides = OverrideSet::default();
        overrides.force_include.insert("A".into());
        let decision = policy.decide(&lonely, &overrides, &InconsistencyReport::default());
        assert!(decision.included);
        assert!(decision.reinstated);
        assert_eq!(decision.reason, InclusionReason::ForceIncluded);
    }

    #[test]
    fn frequency_rule_precedes_inconsistency_rule() {
        let severity = SeverityThreshold::default();
        let policy = InclusionPolicy::new(2, &severity);

        let decision = policy.decide(&profile("B", 1), &OverrideSet::default(), &critical(&["B"]));
        assert_eq!(decision.reason, InclusionReason::BelowFrequencyThreshold);

        let decision = policy.decide(&profile("B", 2), &OverrideSet::default(), &critical(&["B"]));
        assert_eq!(decision.reason, InclusionReason::InconsistentMetadata);
    }

    #[test]
    fn force_exclude_wins() {
        let severity = SeverityThreshold::default();
        let policy = InclusionPolicy::new(2, &severity);
        let mut overrides = OverrideSet::default();
        overrides.force_include.insert("C".into());
        overrides.force_exclude.insert("C".into());

        let decision = policy.decide(&profile("C", 3), &overrides, &InconsistencyReport::default());
        assert_eq!(decision, InclusionDecision::exclude(InclusionReason::ForceExcluded));
    }

    #[test]
    fn apply_orders_reinstated_last_and_finalizes_from_parent() {
        let severity = SeverityThreshold::default();
        let policy = InclusionPolicy::new(2, &severity);
        let mut profiles = vec![profile("A", 1), profile("B", 2), profile("C", 2), profile("D", 1)];
        let mut overrides = OverrideSet::default();
        overrides.force_include.insert("B".into());

        let outcome = policy.apply(&mut profiles, &overrides, &critical(&["B"]));

        assert_eq!(outcome.finalized_order, vec!["C", "B"]);
        assert!(profiles[1].is_flagged(DiagnosticCode::ForceIncludedInconsistent));
        assert_eq!(
            profiles[2].finalized.as_ref().and_then(|e| e.label.as_deref()),
            Some("C from w0")
        );
        assert!(profiles[0].finalized.is_none());

        let warnings: Vec<_> = outcome
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::ForceIncludedInconsistent)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].variable.as_deref(), Some("B"));

        let excluded = outcome
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::VariableExcluded)
            .count();
        assert_eq!(excluded, 2);
    }

    #[test]
    fn force_included_consistent_variable_keeps_its_place() {
        let severity = SeverityThreshold::default();
        let policy = InclusionPolicy::new(2, &severity);
        let mut profiles = vec![profile("X", 2), profile("Y", 2)];
        let mut overrides = OverrideSet::default();
        overrides.force_include.insert("X".into());

        let outcome = policy.apply(&mut profiles, &overrides, &InconsistencyReport::default());

        assert_eq!(outcome.finalized_order, vec!["X", "Y"]);
        assert_eq!(profiles[0].reason(), Some(InclusionReason::ForceIncluded));
        assert!(!profiles[0].decision.unwrap().reinstated);
    }
}
