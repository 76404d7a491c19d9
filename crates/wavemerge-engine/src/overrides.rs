//! Override directive resolution
//!
//! Loads the external rule table and the manual always-retain/always-remove
//! lists into two disjoint sets. Ambiguity is surfaced as an error and never
//! decided automatically.

use regex::Regex;
use std::collections::BTreeSet;
use wavemerge_core::{ConfigError, OverrideConfig, OverrideRule};
use crate::pipeline::ConfigurationError;

/// A recognized override directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideDirective {
    ForceInclude,
    ForceExclude,
}

impl std::fmt::Display for OverrideDirective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForceInclude => write!(f, "force-include"),
            Self::ForceExclude => write!(f, "force-exclude"),
        }
    }
}

/// The rule table holds both directives for the same variables
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Override rule table lists {} under both include and exclude directives", .variables.join(", "))]
pub struct OverrideConflictError {
    /// Conflicting variables, sorted
    pub variables: Vec<String>,
}

/// Disjoint force-include / force-exclude sets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    pub force_include: BTreeSet<String>,
    pub force_exclude: BTreeSet<String>,
}

impl OverrideSet {
    /// Directive for a variable; exclusion wins if both are somehow present
    pub fn directive_for(&self, variable: &str) -> Option<OverrideDirective> {
        if self.force_exclude.contains(variable) {
            Some(OverrideDirective::ForceExclude)
        } else if self.force_include.contains(variable) {
            Some(OverrideDirective::ForceInclude)
        } else {
            None
        }
    }

    pub fn is_force_included(&self, variable: &str) -> bool {
        self.directive_for(variable) == Some(OverrideDirective::ForceInclude)
    }

    pub fn is_empty(&self) -> bool {
        self.force_include.is_empty() && self.force_exclude.is_empty()
    }

    /// Every variable named by a directive, sorted
    pub fn variables(&self) -> BTreeSet<&str> {
        self.force_include
            .iter()
            .chain(self.force_exclude.iter())
            .map(|s| s.as_str())
            .collect()
    }

    fn conflicts(&self) -> Vec<String> {
        self.force_include
            .intersection(&self.force_exclude)
            .cloned()
            .collect()
    }
}

/// Output of the resolver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOverrides {
    pub set: OverrideSet,

    /// Manual list entries overruled by the rule table
    pub superseded: Vec<(String, OverrideDirective)>,

    /// Rule rows whose directive text was not recognized
    pub ignored_rows: usize,
}

/// Classifies directive text and builds the override sets
#[derive(Debug, Clone)]
pub struct OverrideResolver {
    include: Regex,
    exclude: Regex,
}

impl OverrideResolver {
    pub fn new(config: &OverrideConfig) -> Result<Self, ConfigError> {
        let (include, exclude) = config.directive_matchers()?;
        Ok(Self { include, exclude })
    }

    /// Map directive text to a directive; text matching neither or both is unrecognized
    pub fn classify(&self, text: &str) -> Option<OverrideDirective> {
        match (self.include.is_match(text), self.exclude.is_match(text)) {
            (true, false) => Some(OverrideDirective::ForceInclude),
            (false, true) => Some(OverrideDirective::ForceExclude),
            _ => None,
        }
    }

    /// Build the override sets from the rule table alone
    ///
    /// Returns the sets and the number of ignored rows.
    pub fn resolve_rules(&self, rules: &[OverrideRule]) -> Result<(OverrideSet, usize), OverrideConflictError> {
        let mut set = OverrideSet::default();
        let mut ignored = 0;

        for rule in rules {
            let variable = rule.variable.trim();
            if variable.is_empty() {
                ignored += 1;
                continue;
            }

            match self.classify(&rule.directive) {
                Some(OverrideDirective::ForceInclude) => {
                    set.force_include.insert(variable.to_string());
                }
                Some(OverrideDirective::ForceExclude) => {
                    set.force_exclude.insert(variable.to_string());
                }
                None => {
                    tracing::debug!(variable, directive = %rule.directive, "ignoring unrecognized override directive");
                    ignored += 1;
                }
            }
        }

        let conflicts = set.conflicts();
        if !conflicts.is_empty() {
            return Err(OverrideConflictError { variables: conflicts });
        }

        Ok((set, ignored))
    }

    /// Build the override sets from the rule table plus the manual lists
    ///
    /// The rule table takes precedence: a manual entry contradicted by the
    /// table is dropped and reported in `superseded`.
    pub fn resolve(
        &self,
        rules: &[OverrideRule],
        manual: &OverrideConfig,
    ) -> Result<ResolvedOverrides, ConfigurationError> {
        let retain: BTreeSet<&str> = manual.always_retain.iter().map(|s| s.trim()).collect();
        let remove: BTreeSet<&str> = manual.always_remove.iter().map(|s| s.trim()).collect();

        let manual_conflicts: Vec<String> = retain
            .intersection(&remove)
            .map(|s| s.to_string())
            .collect();
        if !manual_conflicts.is_empty() {
            return Err(ConfigurationError::ManualListConflict(manual_conflicts));
        }

        let (mut set, ignored_rows) = self.resolve_rules(rules)?;
        let mut superseded = Vec::new();

        for name in retain {
            if set.force_exclude.contains(name) {
                superseded.push((name.to_string(), OverrideDirective::ForceInclude));
            } else {
                set.force_include.insert(name.to_string());
            }
        }

        for name in remove {
            if set.force_include.contains(name) {
                superseded.push((name.to_string(), OverrideDirective::ForceExclude));
            } else {
                set.force_exclude.insert(name.to_string());
            }
        }

        tracing::info!(
            force_include = set.force_include.len(),
            force_exclude = set.force_exclude.len(),
            ignored_rows,
            "resolved override directives"
        );

        Ok(ResolvedOverrides {
            set,
            superseded,
            ignored_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> OverrideResolver {
        OverrideResolver::new(&OverrideConfig::default()).unwrap()
    }

    #[test]
    fn builds_disjoint_sets() {
        let rules = vec![
            OverrideRule::new("q1", "Force Include"),
            OverrideRule::new("q2", "exclude"),
            OverrideRule::new("q1", "include"),
            OverrideRule::new("q3", "maybe later"),
        ];

        let (set, ignored) = resolver().resolve_rules(&rules).unwrap();
        assert_eq!(set.force_include.iter().collect::<Vec<_>>(), vec!["q1"]);
        assert_eq!(set.force_exclude.iter().collect::<Vec<_>>(), vec!["q2"]);
        assert_eq!(ignored, 1);
        assert_eq!(set.directive_for("q3"), None);
    }

    #[test]
    fn conflicting_rows_are_rejected() {
        let rules = vec![
            OverrideRule::new("q1", "include"),
            OverrideRule::new("q1", "exclude"),
            OverrideRule::new("q0", "remove"),
            OverrideRule::new("q0", "retain"),
        ];

        let err = resolver().resolve_rules(&rules).unwrap_err();
        assert_eq!(err.variables, vec!["q0", "q1"]);
        assert!(err.to_string().contains("q0, q1"));
    }

    #[test]
    fn empty_table_gives_empty_sets() {
        let resolved = resolver().resolve(&[], &OverrideConfig::default()).unwrap();
        assert!(resolved.set.is_empty());
        assert!(resolved.superseded.is_empty());
    }

    #[test]
    fn rule_table_wins_over_manual_lists() {
        let manual = OverrideConfig {
            always_retain: vec!["id".into(), "notes".into()],
            always_remove: vec!["tmp".into()],
            ..OverrideConfig::default()
        };
        let rules = vec![OverrideRule::new("notes", "exclude"), OverrideRule::new("tmp", "include")];

        let resolved = resolver().resolve(&rules, &manual).unwrap();

        assert!(resolved.set.is_force_included("id"));
        assert_eq!(resolved.set.directive_for("notes"), Some(OverrideDirective::ForceExclude));
        assert_eq!(resolved.set.directive_for("tmp"), Some(OverrideDirective::ForceInclude));
        assert_eq!(
            resolved.superseded,
            vec![
                ("notes".to_string(), OverrideDirective::ForceInclude),
                ("tmp".to_string(), OverrideDirective::ForceExclude),
            ]
        );
    }

    #[test]
    fn manual_lists_must_not_overlap() {
        let manual = OverrideConfig {
            always_retain: vec!["x".into()],
            always_remove: vec!["x".into()],
            ..OverrideConfig::default()
        };

        assert!(matches!(
            resolver().resolve(&[], &manual),
            Err(ConfigurationError::ManualListConflict(v)) if v == vec!["x".to_string()]
        ));
    }

    #[test]
    fn exclusion_wins_when_both_present() {
        let mut set = OverrideSet::default();
        set.force_include.insert("v".into());
        set.force_exclude.insert("v".into());
        assert_eq!(set.directive_for("v"), Some(OverrideDirective::ForceExclude));
    }
}
