//! Cross-wave metadata aggregation
//!
//! Regroups extracted records by variable. Records are always collected in
//! wave-rank order, so the parent wave's record is the first instance of any
//! variable it declares. A wave that does not declare a variable contributes
//! nothing for it.

use std::collections::HashMap;
use wavemerge_core::{VariableMetadataRecord, VariableProfile};
use crate::extractor::ExtractedWave;
use crate::universe::VariableUniverse;

pub struct MetadataAggregator;

impl MetadataAggregator {
    /// Build one profile per universe variable, in universe order
    ///
    /// Waves may be passed in any order; they are folded by rank. Variables
    /// no wave declares produce no profile.
    pub fn aggregate(waves: &[ExtractedWave], universe: &VariableUniverse) -> Vec<VariableProfile> {
        let mut ordered: Vec<&ExtractedWave> = waves.iter().collect();
        ordered.sort_by_key(|w| w.wave.rank);

        let indexed: Vec<HashMap<&str, &VariableMetadataRecord>> = ordered
            .iter()
            .map(|w| w.records.iter().map(|r| (r.variable.as_str(), r)).collect())
            .collect();

        let profiles: Vec<VariableProfile> = universe
            .names()
            .iter()
            .filter_map(|name| {
                let instances: Vec<VariableMetadataRecord> = indexed
                    .iter()
                    .filter_map(|records| records.get(name.as_str()).map(|r| (*r).clone()))
                    .collect();

                if instances.is_empty() {
                    return None;
                }

                let mut profile = VariableProfile::new(name.clone(), instances);
                profile.occurrences = universe.count(name);
                Some(profile)
            })
            .collect();

        tracing::info!(
            waves = ordered.len(),
            variables = profiles.len(),
            "aggregated variable metadata"
        );

        profiles
    }
}
