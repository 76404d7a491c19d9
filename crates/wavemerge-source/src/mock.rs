//! In-memory wave source and sink for testing
//!
//! ```rust,ignore
//! let source = MockWaveSource::new();
//! source.add_wave(bundle).await;
//! source.add_rule(OverrideRule::new("q7", "force include")).await;
//!
//! // Simulate a broken wave
//! source.add_error_for_wave("2021", SourceError::WaveNotFound("2021".into())).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use wavemerge_core::{MergedDataset, OverrideRule, WaveBundle};
use crate::source::{OutputSink, OverrideRuleSource, SourceError, WaveSource};

/// Wave source backed by memory
///
/// Waves are listed in insertion order. Clones share state.
#[derive(Clone)]
pub struct MockWaveSource {
    /// Waves in load order
    waves: Arc<RwLock<Vec<WaveBundle>>>,

    /// Errors to return for specific waves
    errors: Arc<RwLock<HashMap<String, SourceError>>>,

    rules: Arc<RwLock<Vec<OverrideRule>>>,

    fail_connection: bool,

    /// Simulated latency (milliseconds)
    latency_ms: u64,
}

impl MockWaveSource {
    pub fn new() -> Self {
        Self {
            waves: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            rules: Arc::new(RwLock::new(Vec::new())),
            fail_connection: false,
            latency_ms: 0,
        }
    }

    pub fn from_waves(waves: Vec<WaveBundle>) -> Self {
        Self {
            waves: Arc::new(RwLock::new(waves)),
            ..Self::new()
        }
    }

    /// Add a wave, replacing any wave with the same id
    pub async fn add_wave(&self, wave: WaveBundle) {
        let mut waves = self.waves.write().await;
        match waves.iter_mut().find(|w| w.id == wave.id) {
            Some(existing) => *existing = wave,
            None => waves.push(wave),
        }
    }

    /// Make fetching `id` fail with `error`
    pub async fn add_error_for_wave(&self, id: impl Into<String>, error: SourceError) {
        self.errors.write().await.insert(id.into(), error);
    }

    pub async fn add_rule(&self, rule: OverrideRule) {
        self.rules.write().await.push(rule);
    }

    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub async fn wave_count(&self) -> usize {
        self.waves.read().await.len()
    }

    pub async fn clear_errors(&self) {
        self.errors.write().await.clear();
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockWaveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WaveSource for MockWaveSource {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn list_waves(&self) -> Result<Vec<String>, SourceError> {
        self.simulate_latency().await;
        Ok(self.waves.read().await.iter().map(|w| w.id.clone()).collect())
    }

    async fn fetch_wave(&self, id: &str) -> Result<WaveBundle, SourceError> {
        self.simulate_latency().await;

        if let Some(error) = self.errors.read().await.get(id) {
            return Err(error.clone());
        }

        self.waves
            .read()
            .await
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| SourceError::WaveNotFound(id.to_string()))
    }

    async fn test_connection(&self) -> Result<(), SourceError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(SourceError::ConnectionError("Simulated connection failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl OverrideRuleSource for MockWaveSource {
    async fn fetch_rules(&self) -> Result<Vec<OverrideRule>, SourceError> {
        self.simulate_latency().await;
        Ok(self.rules.read().await.clone())
    }
}

/// Builder for a [`MockWaveSource`] with waves and rules up front
pub struct MockWaveSourceBuilder {
    waves: Vec<WaveBundle>,
    rules: Vec<OverrideRule>,
    errors: HashMap<String, SourceError>,
    fail_connection: bool,
    latency_ms: u64,
}

impl MockWaveSourceBuilder {
    pub fn new() -> Self {
        Self {
            waves: Vec::new(),
            rules: Vec::new(),
            errors: HashMap::new(),
            fail_connection: false,
            latency_ms: 0,
        }
    }

    pub fn with_wave(mut self, wave: WaveBundle) -> Self {
        self.waves.push(wave);
        self
    }

    pub fn with_rule(mut self, variable: &str, directive: &str) -> Self {
        self.rules.push(OverrideRule::new(variable, directive));
        self
    }

    pub fn with_error(mut self, id: &str, error: SourceError) -> Self {
        self.errors.insert(id.to_string(), error);
        self
    }

    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn build(self) -> MockWaveSource {
        MockWaveSource {
            waves: Arc::new(RwLock::new(self.waves)),
            errors: Arc::new(RwLock::new(self.errors)),
            rules: Arc::new(RwLock::new(self.rules)),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
        }
    }
}

impl Default for MockWaveSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that keeps every written dataset in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    written: Arc<RwLock<Vec<MergedDataset>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn last(&self) -> Option<MergedDataset> {
        self.written.read().await.last().cloned()
    }

    pub async fn write_count(&self) -> usize {
        self.written.read().await.len()
    }
}

#[async_trait::async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, dataset: &MergedDataset) -> Result<(), SourceError> {
        self.written.write().await.push(dataset.clone());
        Ok(())
    }
}
