//! Benchmarks for the merge pipeline
//!
//! These benchmarks measure a full merge over synthetic waves with partially
//! overlapping variables and a sprinkling of value-label conflicts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wavemerge_core::{CellValue, MergeConfig, MetadataBundle, OverrideRule, RecordTable, ValueLabels, WaveBundle};
use wavemerge_engine::MergePipeline;

/// Generate `num_waves` waves of `num_vars` variables and `rows` rows each
///
/// Each wave drops a different tenth of the variables; every 25th variable
/// has wave-specific value labels.
fn generate_waves(num_waves: usize, num_vars: usize, rows: usize) -> Vec<WaveBundle> {
    (0..num_waves)
        .map(|w| {
            let names: Vec<String> = (0..num_vars)
                .filter(|v| v % 10 != w % 10)
                .map(|v| format!("var_{}", v))
                .collect();

            let table_rows = (0..rows)
                .map(|r| names.iter().map(|_| CellValue::Number(r as f64)).collect())
                .collect();

            let mut metadata = MetadataBundle::with_columns(names.clone());
            for (i, name) in names.iter().enumerate() {
                metadata.column_labels.insert(name.clone(), format!("Label for {}", name));
                if i % 25 == 0 {
                    let mut labels = ValueLabels::new();
                    labels.insert("1".to_string(), format!("wave {} yes", w));
                    metadata.value_labels.insert(name.clone(), labels);
                }
            }

            WaveBundle::new(
                format!("wave_{}", w),
                RecordTable::from_rows(names, table_rows),
                metadata,
            )
        })
        .collect()
}

fn bench_full_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_merge");

    for &(waves, vars) in &[(4, 100), (8, 500), (12, 1000)] {
        let input = generate_waves(waves, vars, 200);
        let rules = vec![OverrideRule::new("var_0", "force include")];
        let pipeline = MergePipeline::new(MergeConfig::default().with_parent_wave("wave_0"));

        group.bench_with_input(
            BenchmarkId::new("waves_x_vars", format!("{}x{}", waves, vars)),
            &input,
            |b, input| {
                b.iter(|| {
                    let outcome = pipeline.run(black_box(input.clone()), &rules);
                    black_box(outcome)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_full_merge);
criterion_main!(benches);
