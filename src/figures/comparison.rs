//! Figures built from precomputed multi-run aggregates.

use std::fs::File;

use tracing::info;

use super::{FigureTarget, data_path, render};
use crate::error::{FigureError, Result};
use crate::runs::{LoadedRuns, RunRename};
use crate::stats::{self, BoxStats};

const TOTAL_ICE: &str = "total ice";
const LOG_ICE: &str = "log ice";

/// Quartile summary of one run at one coldtrap.
#[derive(Clone, Debug, PartialEq)]
pub struct QuartileGroup {
    pub coldtrap: String,
    pub run: String,
    pub stats: BoxStats,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunComparison {
    pub title: String,
    pub run_count: usize,
    /// Display labels in plotting order.
    pub runs: Vec<String>,
    pub groups: Vec<QuartileGroup>,
}

/// Compares log10 total ice between two (or more) renamed runs per coldtrap.
///
/// Total ice below 1 m is masked before taking the log. Runs missing from
/// `run_names` are dropped by the rename.
pub fn compare_runs(
    data: &LoadedRuns,
    coldtraps: &[String],
    run_names: &[&str],
    labels: &[&str],
    title: &str,
    target: &FigureTarget,
) -> Result<RunComparison> {
    if run_names.len() != labels.len() {
        return Err(FigureError::shape("run rename", run_names.len(), labels.len()));
    }
    let mut data = data.clone();
    data.rename(&RunRename::zip(run_names, labels));
    data.runs.derive_metric(LOG_ICE, TOTAL_ICE, |v| {
        stats::log10_masked(&[v], 1.0)[0]
    })?;
    let run_count = data.run_count.unwrap_or_else(|| data.count_seeds());

    // Plotted with the second run on the left.
    let runs: Vec<String> = labels.iter().rev().map(|l| l.to_string()).collect();
    let mut groups = Vec::with_capacity(coldtraps.len() * runs.len());
    for coldtrap in coldtraps {
        for run in &runs {
            let values = data.runs.values(LOG_ICE, run, coldtrap)?;
            groups.push(QuartileGroup {
                coldtrap: coldtrap.clone(),
                run: run.clone(),
                stats: BoxStats::from_values(&values, (0.0, 100.0)),
            });
        }
    }

    let figure = RunComparison {
        title: format!("{title} ({run_count} runs)"),
        run_count,
        runs,
        groups,
    };
    if let Some(path) = target.prepare()? {
        render::write_groups_csv(File::create(data_path(&path))?, &figure.groups)?;
        render::quartiles(&path, &figure, &target.version).map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(figure)
}

/// Nominal runs against runs without ballistic sedimentation.
pub fn bsed_comparison(
    data: &LoadedRuns,
    coldtraps: &[String],
    target: &FigureTarget,
) -> Result<RunComparison> {
    compare_runs(
        data,
        coldtraps,
        &["moonpies", "no_bsed"],
        &["Yes", "No"],
        "Ballistic Sedimentation",
        target,
    )
}

/// Half of the ballistic sedimentation loss against none.
pub fn bsed_sensitivity(
    data: &LoadedRuns,
    coldtraps: &[String],
    target: &FigureTarget,
) -> Result<RunComparison> {
    compare_runs(
        data,
        coldtraps,
        &["bsed_50pct", "no_bsed"],
        &["50% lost", "0% lost"],
        "Ballistic Sedimentation Loss Fraction",
        target,
    )
}

/// Nominal 20 wt% comet hydration against fully hydrated comets.
pub fn comet_sensitivity(
    data: &LoadedRuns,
    coldtraps: &[String],
    target: &FigureTarget,
) -> Result<RunComparison> {
    compare_runs(
        data,
        coldtraps,
        &["moonpies", "comet_100pct"],
        &["20%", "100%"],
        "Comet Hydration [wt%]",
        target,
    )
}

#[derive(Clone, Debug, PartialEq)]
pub struct SurfacePanel {
    pub depth: f64,
    pub key: String,
    pub threshold: f64,
    pub boxes: Vec<(String, BoxStats)>,
    /// Fraction of runs per coldtrap with more than `threshold` of ice.
    pub exceedance: Vec<(String, f64)>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceBoxplot {
    pub run_count: usize,
    pub panels: Vec<SurfacePanel>,
}

/// Ice thickness [m] above which a near-surface deposit counts as rich.
pub fn surface_threshold(depth: f64) -> f64 {
    if depth <= 6.0 { 0.3 } else { 5.0 }
}

/// Distribution of near-surface ice per coldtrap for the nominal run.
pub fn surface_boxplot(
    data: &LoadedRuns,
    coldtraps: &[String],
    depths: &[f64],
    target: &FigureTarget,
) -> Result<SurfaceBoxplot> {
    let run_count = data.run_count.unwrap_or_else(|| data.count_seeds());
    let mut panels = Vec::with_capacity(depths.len());
    for &depth in depths {
        let key = format!("{TOTAL_ICE} {depth}m");
        let threshold = surface_threshold(depth);
        let mut boxes = Vec::with_capacity(coldtraps.len());
        let mut exceedance = Vec::with_capacity(coldtraps.len());
        for coldtrap in coldtraps {
            let values = data.runs.values(&key, "moonpies", coldtrap)?;
            let frac = stats::exceedance_fraction(&values, threshold);
            info!("{coldtrap} exceeds {threshold} m {:.2}% of the time", frac * 100.0);
            boxes.push((coldtrap.clone(), BoxStats::from_values(&values, (1.0, 95.0))));
            exceedance.push((coldtrap.clone(), frac));
        }
        panels.push(SurfacePanel {
            depth,
            key,
            threshold,
            boxes,
            exceedance,
        });
    }

    let figure = SurfaceBoxplot { run_count, panels };
    if let Some(path) = target.prepare()? {
        render::write_surface_csv(File::create(data_path(&path))?, &figure)?;
        render::surface_boxes(&path, &figure, &target.version).map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(figure)
}
