use moonpies_figures::FigureError;
use moonpies_figures::config::SimConfig;
use moonpies_figures::ensemble::{
    EnsembleAccumulator, ImpactorClass, aggregate, aggregate_class, aggregate_with,
};
use moonpies_figures::sim::synthetic::SyntheticSimulation;
use moonpies_figures::sim::{CraterRecord, Simulation, SimulationSession, ice_by_module};
use moonpies_figures::stats::Statistic;
use moonpies_figures::table::{IceColumn, TimeSeriesTable};
use ndarray::Array2;

/// Every module value is `scale * class_factor * (seed + 1) * (step + 1)`.
#[derive(Clone, Default)]
struct LinearSim {
    /// Seed whose session drops the last time step.
    ragged_seed: Option<u64>,
}

struct LinearSession {
    cfg: SimConfig,
    time: Vec<f64>,
}

impl LinearSession {
    fn series(&self, scale: f64) -> Vec<f64> {
        let class = if self.cfg.is_comet { 10.0 } else { 1.0 };
        let seed = self.cfg.seed as f64 + 1.0;
        (0..self.time.len())
            .map(|i| scale * class * seed * (i as f64 + 1.0))
            .collect()
    }
}

impl Simulation for LinearSim {
    type Session = LinearSession;

    fn session(&self, config: &SimConfig) -> moonpies_figures::Result<LinearSession> {
        let mut time = config.time_array();
        if self.ragged_seed == Some(config.seed) {
            time.pop();
        }
        Ok(LinearSession {
            cfg: config.clone(),
            time,
        })
    }
}

impl SimulationSession for LinearSession {
    fn config(&self) -> &SimConfig {
        &self.cfg
    }
    fn time_array(&self) -> &[f64] {
        &self.time
    }
    fn craters(&self) -> &[CraterRecord] {
        &[]
    }
    fn volcanic_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(1.0))
    }
    fn solar_wind_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(2.0))
    }
    fn micrometeorite_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(3.0))
    }
    fn small_impactor_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(4.0))
    }
    fn small_simple_crater_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(5.0))
    }
    fn large_simple_crater_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(6.0))
    }
    fn complex_crater_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(7.0))
    }
    fn basin_ice(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(8.0))
    }
    fn gardening_depth(&mut self) -> moonpies_figures::Result<Vec<f64>> {
        Ok(self.series(0.5))
    }
    fn bsed_depth(&mut self) -> moonpies_figures::Result<(Array2<f64>, Array2<f64>)> {
        let row = self.series(0.25);
        let depth = Array2::from_shape_fn((3, row.len()), |(_, i)| row[i]);
        let fraction = Array2::from_elem((3, row.len()), 1.0);
        Ok((depth, fraction))
    }
}

fn short_cfg() -> SimConfig {
    SimConfig {
        time_start: 4.0e9,
        time_end: 0.0,
        timestep: 1.0e9,
        ..SimConfig::default()
    }
}

fn assert_tables_close(a: &TimeSeriesTable, b: &TimeSeriesTable, tol: f64) {
    assert_eq!(a.time(), b.time());
    assert_eq!(a.column_names(), b.column_names());
    for (column, values) in a.columns() {
        let other = b.require(column).unwrap();
        for (row, (x, y)) in values.iter().zip(other).enumerate() {
            assert!((x - y).abs() <= tol, "{column} row {row}: {x} vs {y}");
        }
    }
}

#[test]
fn class_mean_equals_elementwise_mean_of_seed_tables() {
    let sim = LinearSim::default();
    let base = short_cfg();
    let seeds = [0, 1, 2, 3];
    let template = ice_by_module(&mut sim.session(&base).unwrap(), Statistic::Mean)
        .unwrap()
        .zeroed();

    let mean = aggregate_class(
        &sim,
        &base,
        &seeds,
        ImpactorClass::Asteroid,
        &template,
        Statistic::Mean,
    )
    .unwrap();

    let mut expected = template.clone();
    for &seed in &seeds {
        let run = ice_by_module(&mut sim.session(&base.with_seed(seed)).unwrap(), Statistic::Mean)
            .unwrap();
        expected.add_assign(&run).unwrap();
    }
    expected.scale(1.0 / seeds.len() as f64);
    assert_tables_close(&mean, &expected, 1e-9);
}

#[test]
fn ice_columns_sum_and_loss_columns_average_across_classes() {
    let sim = LinearSim::default();
    let table = aggregate(&sim, &short_cfg(), &[0, 1, 2, 3], &ImpactorClass::ALL).unwrap();
    // Seed factor averages to 2.5 for asteroids and 25 for comets.
    for (i, v) in table.require(IceColumn::Basin).unwrap().iter().enumerate() {
        let expected = 8.0 * 27.5 * (i as f64 + 1.0);
        assert!((v - expected).abs() < 1e-9, "basin row {i}: {v} vs {expected}");
    }
    for (i, v) in table.require(IceColumn::GardeningDepth).unwrap().iter().enumerate() {
        let expected = 0.5 * 27.5 / 2.0 * (i as f64 + 1.0);
        assert!((v - expected).abs() < 1e-9, "gardening row {i}: {v} vs {expected}");
    }
    for (i, v) in table.require(IceColumn::BallisticSedDepth).unwrap().iter().enumerate() {
        let expected = 0.25 * 27.5 / 2.0 * (i as f64 + 1.0);
        assert!((v - expected).abs() < 1e-9, "bsed row {i}: {v} vs {expected}");
    }
}

#[test]
fn single_class_aggregate_matches_class_mean() {
    let sim = LinearSim::default();
    let base = short_cfg();
    let only_comets = aggregate(&sim, &base, &[2, 5], &[ImpactorClass::Comet]).unwrap();
    let template = only_comets.zeroed();
    let class_mean =
        aggregate_class(&sim, &base, &[2, 5], ImpactorClass::Comet, &template, Statistic::Mean)
            .unwrap();
    assert_tables_close(&only_comets, &class_mean, 1e-9);
}

#[test]
fn merging_disjoint_seed_sets_equals_aggregating_their_union() {
    let sim = LinearSim::default();
    let base = short_cfg();
    let run = |seed: u64| {
        ice_by_module(&mut sim.session(&base.with_seed(seed)).unwrap(), Statistic::Mean).unwrap()
    };
    let template = run(0).zeroed();

    let mut left = EnsembleAccumulator::new(&template);
    for seed in [0, 1] {
        left.add(&run(seed)).unwrap();
    }
    let mut right = EnsembleAccumulator::new(&template);
    for seed in [2, 3, 4] {
        right.add(&run(seed)).unwrap();
    }
    left.merge(&right).unwrap();

    let mut whole = EnsembleAccumulator::new(&template);
    for seed in 0..5 {
        whole.add(&run(seed)).unwrap();
    }
    assert_eq!(left.count(), 5);
    assert_tables_close(&left.finalize().unwrap(), &whole.finalize().unwrap(), 1e-9);
}

#[test]
fn misaligned_seed_is_reported_with_its_seed() {
    let sim = LinearSim {
        ragged_seed: Some(3),
    };
    let err = aggregate(&sim, &short_cfg(), &[0, 1, 2, 3], &ImpactorClass::ALL).unwrap_err();
    match err {
        FigureError::ShapeMismatch { context, .. } => {
            assert!(context.contains("seed 3"), "context was {context}");
        }
        other => panic!("expected shape mismatch, got {other}"),
    }
}

#[test]
fn empty_inputs_are_rejected() {
    let sim = LinearSim::default();
    assert!(matches!(
        aggregate(&sim, &short_cfg(), &[], &ImpactorClass::ALL),
        Err(FigureError::EmptyEnsemble(_))
    ));
    assert!(matches!(
        aggregate(&sim, &short_cfg(), &[0], &[]),
        Err(FigureError::EmptyEnsemble(_))
    ));
}

#[test]
fn max_statistic_changes_only_the_bsed_column() {
    let sim = SyntheticSimulation;
    let cfg = SimConfig {
        timestep: 50e6,
        ..SimConfig::default()
    };
    let mean = aggregate_with(&sim, &cfg, &[0, 1], &ImpactorClass::ALL, Statistic::Mean).unwrap();
    let max = aggregate_with(&sim, &cfg, &[0, 1], &ImpactorClass::ALL, Statistic::Max).unwrap();
    for column in IceColumn::MODULES {
        let a = mean.require(column).unwrap();
        let b = max.require(column).unwrap();
        if column == IceColumn::BallisticSedDepth {
            assert!(a.iter().zip(b).all(|(x, y)| x <= y));
        } else {
            assert_eq!(a, b, "{column} should not depend on the bsed statistic");
        }
    }
}

#[test]
fn synthetic_aggregate_is_reproducible() {
    let sim = SyntheticSimulation;
    let cfg = SimConfig {
        timestep: 50e6,
        ..SimConfig::default()
    };
    let a = aggregate(&sim, &cfg, &[0, 1, 2], &ImpactorClass::ALL).unwrap();
    let b = aggregate(&sim, &cfg, &[0, 1, 2], &ImpactorClass::ALL).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), cfg.time_array().len());
    a.check_finite().unwrap();
}
