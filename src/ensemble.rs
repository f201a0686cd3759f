//! Seed-averaged module tables over asteroid and comet populations.

use std::fmt;

use tracing::{debug, info};

use crate::config::SimConfig;
use crate::error::{FigureError, Result};
use crate::sim::{Simulation, ice_by_module};
use crate::stats::Statistic;
use crate::table::{IceColumn, TimeSeriesTable};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImpactorClass {
    Asteroid,
    Comet,
}

impl ImpactorClass {
    pub const ALL: [ImpactorClass; 2] = [ImpactorClass::Asteroid, ImpactorClass::Comet];

    /// Class-specific variant of a base (asteroid) configuration.
    pub fn configure(self, base: &SimConfig) -> SimConfig {
        match self {
            ImpactorClass::Asteroid => base.clone(),
            ImpactorClass::Comet => base.comet(),
        }
    }
}

impl fmt::Display for ImpactorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactorClass::Asteroid => f.write_str("asteroid"),
            ImpactorClass::Comet => f.write_str("comet"),
        }
    }
}

/// Running sum of per-seed tables sharing one time index.
#[derive(Clone, Debug)]
pub struct EnsembleAccumulator {
    sum: TimeSeriesTable,
    count: usize,
}

impl EnsembleAccumulator {
    /// Starts from a zeroed copy of `template`.
    pub fn new(template: &TimeSeriesTable) -> Self {
        Self {
            sum: template.zeroed(),
            count: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, run: &TimeSeriesTable) -> Result<()> {
        run.check_finite()?;
        self.sum.add_assign(run)?;
        self.count += 1;
        Ok(())
    }

    /// Folds in another accumulator over a disjoint set of seeds.
    pub fn merge(&mut self, other: &EnsembleAccumulator) -> Result<()> {
        self.sum.add_assign(&other.sum)?;
        self.count += other.count;
        Ok(())
    }

    pub fn finalize(self) -> Result<TimeSeriesTable> {
        if self.count == 0 {
            return Err(FigureError::EmptyEnsemble(
                "no seeds were added".to_string(),
            ));
        }
        let mut mean = self.sum;
        mean.scale(1.0 / self.count as f64);
        Ok(mean)
    }
}

/// Seed-averaged module table for a single impactor class.
pub fn aggregate_class<S: Simulation>(
    sim: &S,
    base: &SimConfig,
    seeds: &[u64],
    class: ImpactorClass,
    template: &TimeSeriesTable,
    bsed_stat: Statistic,
) -> Result<TimeSeriesTable> {
    let mut acc = EnsembleAccumulator::new(template);
    for &seed in seeds {
        let cfg = class.configure(&base.with_seed(seed));
        // A new session per draw keeps seeds independent.
        let mut session = sim.session(&cfg)?;
        let run = ice_by_module(&mut session, bsed_stat)?;
        acc.add(&run).map_err(|err| match err {
            FigureError::ShapeMismatch {
                context,
                expected,
                found,
            } => FigureError::ShapeMismatch {
                context: format!("{class} seed {seed}: {context}"),
                expected,
                found,
            },
            other => other,
        })?;
    }
    debug!("aggregated {} {class} seeds", acc.count());
    acc.finalize()
}

/// Combines seed-averaged asteroid and comet tables.
///
/// Each class is averaged over `seeds` on its own. Ice columns of the class
/// means are summed; loss-depth columns are averaged across classes since
/// both populations see the same loss processes.
pub fn aggregate<S: Simulation>(
    sim: &S,
    base: &SimConfig,
    seeds: &[u64],
    classes: &[ImpactorClass],
) -> Result<TimeSeriesTable> {
    aggregate_with(sim, base, seeds, classes, Statistic::Mean)
}

pub fn aggregate_with<S: Simulation>(
    sim: &S,
    base: &SimConfig,
    seeds: &[u64],
    classes: &[ImpactorClass],
    bsed_stat: Statistic,
) -> Result<TimeSeriesTable> {
    if seeds.is_empty() {
        return Err(FigureError::EmptyEnsemble("seed list is empty".to_string()));
    }
    if classes.is_empty() {
        return Err(FigureError::EmptyEnsemble(
            "no impactor classes requested".to_string(),
        ));
    }
    info!(
        "aggregating {} seeds over {} impactor classes",
        seeds.len(),
        classes.len()
    );

    let template = {
        let mut session = sim.session(&base.with_seed(0))?;
        ice_by_module(&mut session, bsed_stat)?.zeroed()
    };

    let mut combined = template.clone();
    for &class in classes {
        let class_mean = aggregate_class(sim, base, seeds, class, &template, bsed_stat)?;
        combined.add_assign(&class_mean)?;
    }

    let n_classes = classes.len() as f64;
    for column in IceColumn::LOSS {
        if let Some(summed) = combined.remove(column) {
            let averaged = summed.into_iter().map(|v| v / n_classes).collect();
            combined.insert(column, averaged)?;
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(time: &[f64], value: f64) -> TimeSeriesTable {
        let mut t = TimeSeriesTable::new(time.to_vec());
        for c in IceColumn::MODULES {
            t.insert(c, vec![value; time.len()]).unwrap();
        }
        t
    }

    #[test]
    fn finalize_divides_by_seed_count() {
        let time = [2.0, 1.0];
        let mut acc = EnsembleAccumulator::new(&table(&time, 0.0));
        acc.add(&table(&time, 1.0)).unwrap();
        acc.add(&table(&time, 3.0)).unwrap();
        let mean = acc.finalize().unwrap();
        assert_eq!(mean.get(IceColumn::Volcanic).unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn empty_accumulator_cannot_finalize() {
        let acc = EnsembleAccumulator::new(&table(&[1.0], 0.0));
        assert!(matches!(acc.finalize(), Err(FigureError::EmptyEnsemble(_))));
    }

    #[test]
    fn add_rejects_misaligned_time_index() {
        let mut acc = EnsembleAccumulator::new(&table(&[2.0, 1.0], 0.0));
        let err = acc.add(&table(&[2.0, 0.5], 1.0)).unwrap_err();
        assert!(matches!(err, FigureError::ShapeMismatch { .. }));
        assert_eq!(acc.count(), 0);
    }

    #[test]
    fn add_rejects_nan() {
        let mut acc = EnsembleAccumulator::new(&table(&[1.0], 0.0));
        let mut bad = table(&[1.0], 1.0);
        bad.insert(IceColumn::Basin, vec![f64::NAN]).unwrap();
        assert!(matches!(acc.add(&bad), Err(FigureError::NonFinite { .. })));
    }

    #[test]
    fn merge_weights_by_seed_count() {
        let time = [1.0];
        let template = table(&time, 0.0);
        let mut a = EnsembleAccumulator::new(&template);
        a.add(&table(&time, 1.0)).unwrap();
        let mut b = EnsembleAccumulator::new(&template);
        b.add(&table(&time, 4.0)).unwrap();
        b.add(&table(&time, 7.0)).unwrap();
        a.merge(&b).unwrap();
        assert_eq!(a.count(), 3);
        assert_eq!(a.finalize().unwrap().get(IceColumn::Basin).unwrap(), &[4.0]);
    }
}
