//! Figures built from fresh simulation ensembles.

use std::fs::File;

use tracing::info;

use super::{FigureTarget, data_path, render};
use crate::config::{FigureConfig, SimConfig};
use crate::ensemble::{ImpactorClass, aggregate};
use crate::era::{EraBins, EraStats, bin_by_era};
use crate::error::{FigureError, Result};
use crate::sim::{Simulation, SimulationSession};
use crate::stats;
use crate::table::{IceColumn, TimeSeriesTable};

/// Column order of the per-era bar chart.
pub(super) const ERA_ORDER: [IceColumn; 7] = [
    IceColumn::TotalIce,
    IceColumn::ImpactorIce,
    IceColumn::Basin,
    IceColumn::Volcanic,
    IceColumn::SolarWind,
    IceColumn::GardeningDepth,
    IceColumn::BallisticSedDepth,
];

fn seeds(fig: &FigureConfig) -> Vec<u64> {
    (0..fig.n_seeds).collect()
}

/// Era mean/min/max of the asteroid+comet ensemble with derived columns.
pub fn module_era_stats<S: Simulation>(
    sim: &S,
    cfg: &SimConfig,
    fig: &FigureConfig,
) -> Result<EraStats> {
    let table = aggregate(sim, cfg, &seeds(fig), &ImpactorClass::ALL)?
        .with_derived_columns()?
        .select(&ERA_ORDER)?;
    let bins = EraBins::new(fig.era_edges_yr(), fig.era_labels.clone())?;
    let order: Vec<&str> = fig.era_labels.iter().map(String::as_str).collect();
    bin_by_era(&table, &bins, &order)
}

/// Ice delivered and lost per module, grouped by geological era.
pub fn plot_by_module<S: Simulation>(
    sim: &S,
    cfg: &SimConfig,
    fig: &FigureConfig,
    target: &FigureTarget,
) -> Result<EraStats> {
    let stats = module_era_stats(sim, cfg, fig)?;
    if let Some(path) = target.prepare()? {
        render::write_era_csv(File::create(data_path(&path))?, &stats)?;
        render::era_bars(&path, &stats, &target.version).map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(stats)
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModuleTimeFigure {
    /// Per-module means within equal-width time bins.
    pub binned: TimeSeriesTable,
    /// Running total of the unbinned ensemble, oldest step first.
    pub cumulative: TimeSeriesTable,
}

/// Ice per module through time, binned and cumulative.
pub fn plot_by_module_time<S: Simulation>(
    sim: &S,
    cfg: &SimConfig,
    fig: &FigureConfig,
    target: &FigureTarget,
) -> Result<ModuleTimeFigure> {
    let table = aggregate(sim, cfg, &seeds(fig), &ImpactorClass::ALL)?;
    let figure = ModuleTimeFigure {
        binned: table.bin_by_time(fig.time_bins)?,
        cumulative: table.cumsum(),
    };
    if let Some(path) = target.prepare()? {
        figure.binned.write_csv(File::create(data_path(&path))?)?;
        let cumu_path = path.with_file_name(format!(
            "{}_cumulative.csv",
            path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
        ));
        figure.cumulative.write_csv(File::create(cumu_path)?)?;
        render::module_time(&path, &figure.binned, &figure.cumulative, &target.version)
            .map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(figure)
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasinSeries {
    pub class: ImpactorClass,
    /// Basin ice per seed, `per_seed[seed][time]`.
    pub per_seed: Vec<Vec<f64>>,
    pub mean: Vec<f64>,
    pub p99_7: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasinIceFigure {
    pub time: Vec<f64>,
    pub series: Vec<BasinSeries>,
}

/// Basin-delivered ice over many seeds for each impactor class, with the
/// seed mean and 99.7th percentile smoothed over `window` steps.
pub fn basin_ice<S: Simulation>(
    sim: &S,
    cfg: &SimConfig,
    seeds: &[u64],
    window: usize,
    target: &FigureTarget,
) -> Result<BasinIceFigure> {
    if seeds.is_empty() {
        return Err(FigureError::EmptyEnsemble("basin ice needs seeds".to_string()));
    }
    let time = cfg.time_array();
    let mut series = Vec::with_capacity(ImpactorClass::ALL.len());
    for class in ImpactorClass::ALL {
        let mut per_seed = Vec::with_capacity(seeds.len());
        for &seed in seeds {
            let mut session = sim.session(&class.configure(&cfg.with_seed(seed)))?;
            let ice = session.basin_ice()?;
            if ice.len() != time.len() {
                return Err(FigureError::shape(
                    format!("{class} basin ice seed {seed}"),
                    time.len(),
                    ice.len(),
                ));
            }
            per_seed.push(ice);
        }
        let across = |step: usize| -> Vec<f64> { per_seed.iter().map(|run| run[step]).collect() };
        let mean: Vec<f64> = (0..time.len()).map(|i| stats::mean(&across(i))).collect();
        let p99_7: Vec<f64> = (0..time.len())
            .map(|i| stats::percentile(&across(i), 99.7))
            .collect();
        series.push(BasinSeries {
            class,
            mean: stats::moving_average(&mean, window),
            p99_7: stats::moving_average(&p99_7, window),
            per_seed,
        });
    }
    let figure = BasinIceFigure { time, series };
    if let Some(path) = target.prepare()? {
        render::write_basin_csv(File::create(data_path(&path))?, &figure)?;
        render::basin_lines(&path, &figure, seeds.len(), &target.version)
            .map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(figure)
}
