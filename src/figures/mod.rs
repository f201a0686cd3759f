//! Figure functions and the parallel driver that produces all of them.
//!
//! Every figure computes its data first and returns it; rendering and saving
//! only happen when the [`FigureTarget`] names a file. Next to each image a
//! CSV with the plotted numbers is written.

mod comparison;
mod layers;
mod modules;
mod render;

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;
use tracing::{error, info};

use crate::config::{FigureConfig, SimConfig};
use crate::error::{FigureError, Result};
use crate::runs::{AggregateLoader, LoadedRuns, ResultsSelector};
use crate::sim::Simulation;

pub use comparison::{
    QuartileGroup, RunComparison, SurfaceBoxplot, SurfacePanel, bsed_comparison,
    bsed_sensitivity, comet_sensitivity, compare_runs, surface_boxplot, surface_threshold,
};
pub use layers::{LayerDistribution, LayerGroup, MIN_LAYER, kde_layers};
pub use modules::{
    BasinIceFigure, BasinSeries, ModuleTimeFigure, basin_ice, module_era_stats, plot_by_module,
    plot_by_module_time,
};

/// Where a figure goes. `file: None` computes the figure without saving.
#[derive(Clone, Debug, PartialEq)]
pub struct FigureTarget {
    pub file: Option<String>,
    pub dir: PathBuf,
    pub version: String,
}

impl FigureTarget {
    pub fn new(
        file: impl Into<String>,
        dir: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            file: Some(file.into()),
            dir: dir.into(),
            version: version.into(),
        }
    }

    /// Target that saves nothing.
    pub fn unsaved() -> Self {
        Self {
            file: None,
            dir: PathBuf::new(),
            version: String::new(),
        }
    }

    /// Image path with the version suffix, parent directory created.
    fn prepare(&self) -> Result<Option<PathBuf>> {
        let Some(file) = &self.file else {
            return Ok(None);
        };
        let path = save_path(&self.dir, file, &self.version);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Some(path))
    }
}

/// `dir/file` with `_{version}` inserted before the extension, unless the
/// version already appears in the path.
pub fn save_path(dir: &Path, file: &str, version: &str) -> PathBuf {
    let path = dir.join(file);
    if version.is_empty() || path.to_string_lossy().contains(version) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{version}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{version}"),
    };
    path.with_file_name(name)
}

/// CSV companion of an image path.
fn data_path(image: &Path) -> PathBuf {
    image.with_extension("csv")
}

/// One self-contained figure computation.
pub struct FigureJob<'a> {
    pub name: String,
    run: Box<dyn FnOnce() -> Result<()> + Send + 'a>,
}

impl<'a> FigureJob<'a> {
    pub fn new(name: impl Into<String>, run: impl FnOnce() -> Result<()> + Send + 'a) -> Self {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }
}

/// Outcome of one job in [`generate_all`].
#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub result: Result<()>,
}

/// Runs `jobs` on a pool of `workers` threads and waits for all of them.
///
/// Jobs share nothing; a failing or panicking job does not affect the
/// others. Reports come back in submission order.
pub fn generate_all(jobs: Vec<FigureJob<'_>>, workers: usize) -> Vec<JobReport> {
    let n_jobs = jobs.len();
    if n_jobs == 0 {
        return Vec::new();
    }
    let workers = workers.clamp(1, n_jobs);
    info!("Starting {n_jobs} figures on {workers} workers...");

    let (job_tx, job_rx) = unbounded();
    let (done_tx, done_rx) = unbounded();
    for (idx, job) in jobs.into_iter().enumerate() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send((idx, job));
    }
    drop(job_tx);

    std::thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move || {
                while let Ok((idx, job)) = job_rx.recv() {
                    let FigureJob { name, run } = job;
                    let result = panic::catch_unwind(AssertUnwindSafe(run))
                        .unwrap_or_else(|_| Err(FigureError::JobPanicked(name.clone())));
                    if let Err(err) = &result {
                        error!("figure {name} failed: {err}");
                    }
                    let _ = done_tx.send((idx, JobReport { name, result }));
                }
            });
        }
    });
    drop(done_tx);

    let mut reports: Vec<(usize, JobReport)> = done_rx.iter().collect();
    reports.sort_by_key(|(idx, _)| *idx);
    let failed = reports.iter().filter(|(_, r)| r.result.is_err()).count();
    info!("Finished {n_jobs} figures ({failed} failed)");
    reports.into_iter().map(|(_, r)| r).collect()
}

/// The standard figure set with default arguments.
pub fn default_jobs<S>(
    sim: S,
    sim_cfg: &SimConfig,
    fig_cfg: &FigureConfig,
) -> Vec<FigureJob<'static>>
where
    S: Simulation + Clone + Send + 'static,
{
    let version = sim_cfg.version.clone();
    let target = |file: &str| FigureTarget::new(file, fig_cfg.figs_dir.clone(), version.clone());
    let selector = match &fig_cfg.results_dir {
        Some(name) => ResultsSelector::Named(name.clone()),
        None => ResultsSelector::Latest,
    };
    let loader = AggregateLoader::new(fig_cfg.results_root.clone()).select(selector);

    let mut jobs = Vec::new();
    {
        let sim = sim.clone();
        let cfg = sim_cfg.clone();
        let fig = fig_cfg.clone();
        let target = target("plot_by_module.png");
        jobs.push(FigureJob::new("plot_by_module", move || {
            plot_by_module(&sim, &cfg, &fig, &target).map(|_| ())
        }));
    }
    {
        let sim = sim.clone();
        let cfg = sim_cfg.clone();
        let fig = fig_cfg.clone();
        let target = target("plot_by_module_time.png");
        jobs.push(FigureJob::new("plot_by_module_time", move || {
            plot_by_module_time(&sim, &cfg, &fig, &target).map(|_| ())
        }));
    }
    {
        let cfg = sim_cfg.clone();
        let first = fig_cfg.basin_seed0;
        let seeds: Vec<u64> = (first..first + fig_cfg.basin_runs).collect();
        let target = target("basin_ice.png");
        jobs.push(FigureJob::new("basin_ice", move || {
            basin_ice(&sim, &cfg, &seeds, 3, &target).map(|_| ())
        }));
    }

    type Comparison = fn(&LoadedRuns, &[String], &FigureTarget) -> Result<RunComparison>;
    let comparisons: [(&str, &str, Comparison); 3] = [
        ("compare_runs", "bsed_violin.png", bsed_comparison),
        ("bsed_sensitivity", "bsed50_violin.png", bsed_sensitivity),
        ("comet_sensitivity", "comet_violin.png", comet_sensitivity),
    ];
    for (name, file, compare) in comparisons {
        let loader = loader.clone();
        let coldtraps = fig_cfg.coldtraps.clone();
        let target = target(file);
        jobs.push(FigureJob::new(name, move || {
            compare(&loader.load()?, &coldtraps, &target).map(|_| ())
        }));
    }
    {
        let loader = loader.clone();
        let coldtraps = fig_cfg.coldtraps.clone();
        let target = target("kde_layers.png");
        jobs.push(FigureJob::new("kde_layers", move || {
            let data = loader.load()?;
            kde_layers(&data, &coldtraps, &["moonpies", "no_bsed"], &["Yes", "No"], &target)
                .map(|_| ())
        }));
    }
    {
        let coldtraps = fig_cfg.coldtraps.clone();
        let target = target("surface_boxplot.png");
        jobs.push(FigureJob::new("surface_boxplot", move || {
            let data = loader.load()?;
            surface_boxplot(&data, &coldtraps, &[6.0, 100.0], &target).map(|_| ())
        }));
    }
    jobs
}
