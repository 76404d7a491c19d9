//! Configuration schema (wavemerge.toml)

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::diagnostic::{DiagnosticCode, Severity};

/// Default column holding the provenance tag
pub const DEFAULT_PROVENANCE_COLUMN: &str = "wave";

/// Which waves frequency counts are taken over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyBasis {
    /// Only waves that survive wave selection
    #[default]
    Assembled,

    /// Every loaded wave, selected or not
    AllLoaded,
}

impl std::fmt::Display for FrequencyBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Assembled => write!(f, "assembled"),
            Self::AllLoaded => write!(f, "all_loaded"),
        }
    }
}

/// Frequency-threshold policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPolicy {
    /// Variables seen in fewer waves than this are excluded
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: usize,

    #[serde(default)]
    pub basis: FrequencyBasis,
}

fn default_min_occurrences() -> usize {
    2
}

impl Default for FrequencyPolicy {
    fn default() -> Self {
        Self {
            min_occurrences: default_min_occurrences(),
            basis: FrequencyBasis::default(),
        }
    }
}

/// Wave selection rules
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveSelection {
    /// Keep only waves matching these patterns (glob, `*` wildcard); empty keeps all
    #[serde(default)]
    pub retain: Vec<String>,
}

impl WaveSelection {
    /// Check if a wave survives selection
    pub fn is_selected(&self, wave_id: &str) -> bool {
        self.retain.is_empty() || self.retain.iter().any(|pattern| glob_match(pattern, wave_id))
    }
}

/// Override directives configured by hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideConfig {
    /// Variables always retained unless the rule table says otherwise
    #[serde(default)]
    pub always_retain: Vec<String>,

    /// Variables always removed unless the rule table says otherwise
    #[serde(default)]
    pub always_remove: Vec<String>,

    /// Directive text recognized as force-include (case-insensitive regex)
    #[serde(default = "default_include_directive")]
    pub include_directive: String,

    /// Directive text recognized as force-exclude (case-insensitive regex)
    #[serde(default = "default_exclude_directive")]
    pub exclude_directive: String,
}

fn default_include_directive() -> String {
    r"^\s*(force[\s_-]*)?(include|retain|keep)\s*$".to_string()
}

fn default_exclude_directive() -> String {
    r"^\s*(force[\s_-]*)?(exclude|remove|drop)\s*$".to_string()
}

impl Default for OverrideConfig {
    fn default() -> Self {
        Self {
            always_retain: Vec::new(),
            always_remove: Vec::new(),
            include_directive: default_include_directive(),
            exclude_directive: default_exclude_directive(),
        }
    }
}

impl OverrideConfig {
    /// Compile the (include, exclude) directive matchers
    pub fn directive_matchers(&self) -> Result<(Regex, Regex), ConfigError> {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern(pattern.to_string(), e.to_string()))
        };

        Ok((build(&self.include_directive)?, build(&self.exclude_directive)?))
    }
}

/// Severity threshold overrides for specific diagnostic codes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeverityThreshold {
    /// Map of diagnostic code to severity override
    #[serde(default)]
    pub overrides: HashMap<String, Severity>,
}

impl SeverityThreshold {
    /// Get severity for a diagnostic code, or default
    pub fn get_severity(&self, code: DiagnosticCode, default: Severity) -> Severity {
        self.overrides
            .get(code.as_str())
            .copied()
            .unwrap_or(default)
    }

    /// Severity for a code, falling back to the code's built-in default
    pub fn severity_for(&self, code: DiagnosticCode) -> Severity {
        self.get_severity(code, code.default_severity())
    }

    /// Set severity override for a code
    pub fn set_override(&mut self, code: DiagnosticCode, severity: Severity) {
        self.overrides.insert(code.as_str().to_string(), severity);
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Identifier of the parent (reference) wave
    #[serde(default)]
    pub parent_wave: Option<String>,

    /// Name of the provenance column appended to every row
    #[serde(default = "default_provenance_column")]
    pub provenance_column: String,

    #[serde(default)]
    pub frequency: FrequencyPolicy,

    #[serde(default)]
    pub waves: WaveSelection,

    #[serde(default)]
    pub overrides: OverrideConfig,

    /// Severity thresholds
    #[serde(default)]
    pub severity: SeverityThreshold,
}

fn default_provenance_column() -> String {
    DEFAULT_PROVENANCE_COLUMN.to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            parent_wave: None,
            provenance_column: default_provenance_column(),
            frequency: FrequencyPolicy::default(),
            waves: WaveSelection::default(),
            overrides: OverrideConfig::default(),
            severity: SeverityThreshold::default(),
        }
    }
}

impl MergeConfig {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Set the parent wave
    pub fn with_parent_wave(mut self, parent: impl Into<String>) -> Self {
        self.parent_wave = Some(parent.into());
        self
    }
}

/// Glob matching where each `*` matches any run of characters
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = match parts.as_slice() {
        [exact] => return *exact == text,
        [first, .., last] => (*first, *last),
        [] => return text.is_empty(),
    };

    if text.len() < first.len() + last.len() || !text.starts_with(first) || !text.ends_with(last) {
        return false;
    }

    // Inner segments must appear in order between the prefix and suffix
    let mut rest = &text[first.len()..text.len() - last.len()];
    for segment in &parts[1..parts.len() - 1] {
        match rest.find(segment) {
            Some(pos) => rest = &rest[pos + segment.len()..],
            None => return false,
        }
    }

    true
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid directive pattern '{0}': {1}")]
    InvalidPattern(String, String),
}
