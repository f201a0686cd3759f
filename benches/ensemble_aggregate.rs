//! Benchmarks for ensemble aggregation and era binning.
//!
//! Run:
//! - cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use moonpies_figures::config::SimConfig;
use moonpies_figures::ensemble::{ImpactorClass, aggregate};
use moonpies_figures::era::{EraBins, bin_by_era};
use moonpies_figures::sim::synthetic::SyntheticSimulation;

const SEED_COUNTS: [u64; 3] = [1, 4, 10];
const ERA_ORDER: [&str; 5] = ["Pre-Nec.", "Nec.", "Imb.", "Era.", "Cop."];

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble_aggregate");
    group.sample_size(20);

    let cfg = SimConfig::default();
    for &n_seeds in &SEED_COUNTS {
        let seeds: Vec<u64> = (0..n_seeds).collect();
        let id = BenchmarkId::new("seeds", n_seeds);
        group.bench_with_input(id, &seeds, |b, seeds| {
            b.iter(|| {
                let seeds = black_box(seeds);
                let table =
                    aggregate(&SyntheticSimulation, &cfg, seeds, &ImpactorClass::ALL).unwrap();
                black_box(table);
            });
        });
    }

    group.finish();
}

fn bench_era_binning(c: &mut Criterion) {
    let cfg = SimConfig::default();
    let table = aggregate(&SyntheticSimulation, &cfg, &[0, 1], &ImpactorClass::ALL)
        .unwrap()
        .with_derived_columns()
        .unwrap();
    let bins = EraBins::lunar();

    c.bench_function("bin_by_era_lunar", |b| {
        b.iter(|| {
            let stats = bin_by_era(black_box(&table), &bins, &ERA_ORDER).unwrap();
            black_box(stats);
        });
    });
}

criterion_group!(benches, bench_aggregate, bench_era_binning);
criterion_main!(benches);
