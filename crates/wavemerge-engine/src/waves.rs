//! Wave ordering and selection

use std::collections::HashSet;
use wavemerge_core::{Wave, WaveBundle, WaveSelection};
use crate::pipeline::ConfigurationError;

/// Assign wave ranks: the parent becomes rank 0, the rest keep load order
pub fn order_waves(
    bundles: Vec<WaveBundle>,
    parent: &str,
) -> Result<Vec<(Wave, WaveBundle)>, ConfigurationError> {
    if bundles.is_empty() {
        return Err(ConfigurationError::NoWaves);
    }

    let mut seen = HashSet::new();
    for bundle in &bundles {
        if !seen.insert(bundle.id.as_str()) {
            return Err(ConfigurationError::DuplicateWave(bundle.id.clone()));
        }
    }

    let mut bundles = bundles;
    let parent_idx = bundles
        .iter()
        .position(|b| b.id == parent)
        .ok_or_else(|| ConfigurationError::MissingParentWave(parent.to_string()))?;

    let parent_bundle = bundles.remove(parent_idx);
    let ordered = std::iter::once(parent_bundle)
        .chain(bundles)
        .enumerate()
        .map(|(rank, bundle)| (Wave::new(bundle.id.clone(), rank), bundle))
        .collect();

    Ok(ordered)
}

/// Waves split by the configured selection
#[derive(Debug, Clone)]
pub struct WaveSelectionOutcome {
    /// Waves to assemble, rank order
    pub selected: Vec<(Wave, WaveBundle)>,

    /// Waves loaded but not assembled, rank order
    pub dropped: Vec<(Wave, WaveBundle)>,
}

/// Apply wave selection; the parent wave must survive it
///
/// Ranks are kept as assigned by [`order_waves`], so gaps may appear.
pub fn select_waves(
    ordered: Vec<(Wave, WaveBundle)>,
    selection: &WaveSelection,
) -> Result<WaveSelectionOutcome, ConfigurationError> {
    let (selected, dropped): (Vec<_>, Vec<_>) = ordered
        .into_iter()
        .partition(|(wave, _)| selection.is_selected(&wave.id));

    if let Some((parent, _)) = dropped.iter().find(|(wave, _)| wave.is_parent()) {
        return Err(ConfigurationError::ParentNotSelected(parent.id.clone()));
    }

    Ok(WaveSelectionOutcome { selected, dropped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavemerge_core::{MetadataBundle, RecordTable};

    fn bundle(id: &str) -> WaveBundle {
        WaveBundle::new(id, RecordTable::default(), MetadataBundle::default())
    }

    fn ids(waves: &[(Wave, WaveBundle)]) -> Vec<(String, usize)> {
        waves.iter().map(|(w, _)| (w.id.clone(), w.rank)).collect()
    }

    #[test]
    fn parent_moves_to_rank_zero() {
        let ordered = order_waves(vec![bundle("w1"), bundle("w2"), bundle("parent"), bundle("w3")], "parent").unwrap();

        assert_eq!(
            ids(&ordered),
            vec![
                ("parent".to_string(), 0),
                ("w1".to_string(), 1),
                ("w2".to_string(), 2),
                ("w3".to_string(), 3),
            ]
        );
    }

    #[test]
    fn missing_parent_and_duplicates_are_configuration_errors() {
        assert!(matches!(
            order_waves(vec![bundle("w1")], "parent"),
            Err(ConfigurationError::MissingParentWave(p)) if p == "parent"
        ));
        assert!(matches!(
            order_waves(vec![bundle("w1"), bundle("w1")], "w1"),
            Err(ConfigurationError::DuplicateWave(_))
        ));
        assert!(matches!(order_waves(vec![], "w1"), Err(ConfigurationError::NoWaves)));
    }

    #[test]
    fn selection_keeps_ranks() {
        let ordered = order_waves(vec![bundle("main"), bundle("pilot"), bundle("main_2")], "main").unwrap();
        let selection = WaveSelection { retain: vec!["main*".to_string()] };

        let outcome = select_waves(ordered, &selection).unwrap();
        assert_eq!(ids(&outcome.selected), vec![("main".to_string(), 0), ("main_2".to_string(), 2)]);
        assert_eq!(ids(&outcome.dropped), vec![("pilot".to_string(), 1)]);
    }

    #[test]
    fn selection_cannot_drop_parent() {
        let ordered = order_waves(vec![bundle("pilot"), bundle("main")], "pilot").unwrap();
        let selection = WaveSelection { retain: vec!["main".to_string()] };

        assert!(matches!(
            select_waves(ordered, &selection),
            Err(ConfigurationError::ParentNotSelected(p)) if p == "pilot"
        ));
    }
}
