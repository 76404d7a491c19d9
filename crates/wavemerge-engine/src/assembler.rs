//! Dataset assembly: trim, tag and row-concatenate wave tables

use std::collections::HashSet;
use wavemerge_core::{CellValue, RecordTable};
use crate::extractor::ExtractedWave;

pub struct DatasetAssembler<'a> {
    provenance_column: &'a str,
}

impl<'a> DatasetAssembler<'a> {
    pub fn new(provenance_column: &'a str) -> Self {
        Self { provenance_column }
    }

    /// Concatenate every wave's retained columns plus its provenance tag
    ///
    /// Rows keep their order within a wave and waves are stacked by rank.
    /// Non-provenance columns appear in first-seen order; the provenance
    /// column is last.
    pub fn assemble(&self, waves: &[ExtractedWave], included: &HashSet<&str>) -> RecordTable {
        let mut ordered: Vec<&ExtractedWave> = waves.iter().collect();
        ordered.sort_by_key(|w| w.wave.rank);

        let mut merged = RecordTable::default();
        for wave in ordered {
            let mut table = wave.table.clone();
            table.retain_columns(|column| included.contains(column));
            table.push_constant_column(self.provenance_column, CellValue::Text(wave.wave.id.clone()));

            tracing::debug!(
                wave = %wave.wave.id,
                rows = table.row_count(),
                columns = table.columns.len(),
                "appending wave"
            );
            merged.concat(&table);
        }

        merged.move_column_to_end(self.provenance_column);

        tracing::info!(
            rows = merged.row_count(),
            columns = merged.columns.len(),
            "assembled merged table"
        );

        merged
    }
}
