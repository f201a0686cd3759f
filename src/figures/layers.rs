//! Ice layer thickness against burial depth, per coldtrap and run.

use std::fs::File;

use tracing::{debug, info};

use super::{FigureTarget, data_path, render};
use crate::error::{FigureError, Result};
use crate::runs::{LayerRecord, LoadedRuns, RunRename, rename_runs};
use crate::stats::{BoxStats, Histogram};

/// Layers thinner or shallower than this are dropped [m].
pub const MIN_LAYER: f64 = 0.1;

/// Cleaned layers of one run at one coldtrap.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerGroup {
    pub coldtrap: String,
    pub run: String,
    /// Layer ice thickness [m].
    pub ice: Vec<f64>,
    /// Depth of the layer bottom [m].
    pub depth: Vec<f64>,
    /// Depth of the layer top, floored at [`MIN_LAYER`] [m].
    pub depth_top: Vec<f64>,
    pub ice_stats: BoxStats,
    pub depth_top_stats: BoxStats,
    pub ice_hist: Histogram,
    pub depth_top_hist: Histogram,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerDistribution {
    /// Display labels in legend order.
    pub runs: Vec<String>,
    pub groups: Vec<LayerGroup>,
}

impl LayerDistribution {
    pub fn group(&self, coldtrap: &str, run: &str) -> Option<&LayerGroup> {
        self.groups
            .iter()
            .find(|g| g.coldtrap == coldtrap && g.run == run)
    }
}

/// Rounds to 0.1 m, half to even.
fn round_decimeter(v: f64) -> f64 {
    (v * 10.0).round_ties_even() / 10.0
}

/// `(ice, depth)` of a layer after rounding, or `None` if it is masked.
fn clean_layer(record: &LayerRecord) -> Option<(f64, f64)> {
    let ice = round_decimeter(record.ice);
    let depth = round_decimeter(record.depth);
    (ice >= MIN_LAYER && depth >= MIN_LAYER).then_some((ice, depth))
}

/// Layer thickness and top depth distributions for renamed runs.
///
/// Ice and depth are rounded to 0.1 m; layers with less than 0.1 m of ice
/// or shallower than 0.1 m are dropped.
pub fn kde_layers(
    data: &LoadedRuns,
    coldtraps: &[String],
    run_names: &[&str],
    labels: &[&str],
    target: &FigureTarget,
) -> Result<LayerDistribution> {
    if run_names.len() != labels.len() {
        return Err(FigureError::shape("run rename", run_names.len(), labels.len()));
    }
    let mut records = data.layers.records.clone();
    rename_runs(&mut records, &RunRename::zip(run_names, labels));

    let runs: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
    let mut groups = Vec::with_capacity(coldtraps.len() * runs.len());
    let mut masked = 0usize;
    for coldtrap in coldtraps {
        for run in &runs {
            let mut ice = Vec::new();
            let mut depth = Vec::new();
            for record in records
                .iter()
                .filter(|r| &r.coldtrap == coldtrap && &r.run == run)
            {
                match clean_layer(record) {
                    Some((i, d)) => {
                        ice.push(i);
                        depth.push(d);
                    }
                    None => masked += 1,
                }
            }
            let depth_top: Vec<f64> = ice
                .iter()
                .zip(&depth)
                .map(|(i, d)| (d - i).max(MIN_LAYER))
                .collect();
            groups.push(LayerGroup {
                coldtrap: coldtrap.clone(),
                run: run.clone(),
                ice_stats: BoxStats::from_values(&ice, (0.0, 100.0)),
                depth_top_stats: BoxStats::from_values(&depth_top, (0.0, 100.0)),
                ice_hist: Histogram::sturges_log10(&ice),
                depth_top_hist: Histogram::sturges_log10(&depth_top),
                ice,
                depth,
                depth_top,
            });
        }
    }
    debug!("kde_layers: masked {masked} thin or shallow layers");

    let figure = LayerDistribution { runs, groups };
    if let Some(path) = target.prepare()? {
        render::write_layers_csv(File::create(data_path(&path))?, &figure.groups)?;
        render::layer_panels(&path, &figure, &target.version).map_err(FigureError::plot)?;
        info!("Figure saved to {}", path.display());
    }
    Ok(figure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(depth: f64, ice: f64) -> LayerRecord {
        LayerRecord {
            run: "moonpies".to_string(),
            seed: 0,
            coldtrap: "Cabeus".to_string(),
            depth,
            ice,
        }
    }

    #[test]
    fn rounding_happens_before_masking() {
        assert_eq!(clean_layer(&record(5.0, 0.06)), Some((0.1, 5.0)));
        assert_eq!(clean_layer(&record(5.0, 0.04)), None);
        assert_eq!(clean_layer(&record(0.04, 1.0)), None);
        assert_eq!(clean_layer(&record(0.25, 1.0)), Some((1.0, 0.2)));
    }
}
