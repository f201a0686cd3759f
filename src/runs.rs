//! Loader for precomputed multi-run aggregate tables.
//!
//! A results root holds one subdirectory per aggregation, each marked by a
//! `layers.csv`. Inside:
//!
//! - `layers.csv`: `run,seed,coldtrap,depth,ice`, one row per ice layer.
//! - `runs.csv` (optional): `run,seed,coldtrap` followed by numeric metric
//!   columns. Metric names may be hierarchical with `/` between levels, e.g.
//!   `total ice/6m`.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{FigureError, Result};

pub const LAYERS_FILE: &str = "layers.csv";
pub const RUNS_FILE: &str = "runs.csv";

const LEVEL_SEPARATOR: char = '/';

/// Which results subdirectory to load.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ResultsSelector {
    /// Most recent marked subdirectory. Names that parse as dates (`yymmdd`,
    /// `yyyymmdd`, `yyyy-mm-dd`, optionally followed by `_suffix`) are ordered
    /// by date and rank above undated names, which are ordered by name.
    #[default]
    Latest,
    /// An explicit subdirectory name.
    Named(String),
}

fn parse_dir_date(name: &str) -> Option<NaiveDate> {
    let stem = name.split('_').next().unwrap_or(name);
    let is_digits = stem.chars().all(|c| c.is_ascii_digit());
    match stem.len() {
        6 if is_digits => NaiveDate::parse_from_str(stem, "%y%m%d").ok(),
        8 if is_digits => NaiveDate::parse_from_str(stem, "%Y%m%d").ok(),
        10 => NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn walk_error(err: walkdir::Error) -> FigureError {
    FigureError::Io(err.into())
}

/// Resolves the results directory under `root`.
pub fn locate_results(root: &Path, selector: &ResultsSelector) -> Result<PathBuf> {
    let not_found = || FigureError::NotFound {
        root: root.to_path_buf(),
    };
    match selector {
        ResultsSelector::Named(name) => {
            let dir = root.join(name);
            if dir.join(LAYERS_FILE).is_file() {
                Ok(dir)
            } else {
                Err(not_found())
            }
        }
        ResultsSelector::Latest => {
            if !root.is_dir() {
                return Err(not_found());
            }
            let mut best: Option<((Option<NaiveDate>, String), PathBuf)> = None;
            for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
                let entry = entry.map_err(walk_error)?;
                if !entry.file_type().is_dir() || !entry.path().join(LAYERS_FILE).is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().to_string();
                let key = (parse_dir_date(&name), name);
                if best.as_ref().is_none_or(|(k, _)| key > *k) {
                    best = Some((key, entry.into_path()));
                }
            }
            best.map(|(_, path)| path).ok_or_else(not_found)
        }
    }
}

/// Records that carry a run identifier and a seed.
pub trait RunRecordLike {
    fn run(&self) -> &str;
    fn set_run(&mut self, run: String);
    fn seed(&self) -> u64;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub run: String,
    pub seed: u64,
    pub coldtrap: String,
    /// Depth of the layer bottom [m].
    pub depth: f64,
    /// Ice thickness of the layer [m].
    pub ice: f64,
}

impl RunRecordLike for LayerRecord {
    fn run(&self) -> &str {
        &self.run
    }
    fn set_run(&mut self, run: String) {
        self.run = run;
    }
    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Per-layer stratigraphy records. `seed` indexes the records; the data
/// columns are [`LayersTable::COLUMNS`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayersTable {
    pub records: Vec<LayerRecord>,
}

impl LayersTable {
    pub const COLUMNS: [&'static str; 4] = ["depth", "ice", "coldtrap", "run"];

    pub fn columns(&self) -> &'static [&'static str] {
        &Self::COLUMNS
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A metric column name, one entry per header level.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnKey(pub Vec<String>);

impl ColumnKey {
    fn parse(raw: &str) -> Self {
        ColumnKey(
            raw.split(LEVEL_SEPARATOR)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Levels joined by single spaces.
    pub fn flat(&self) -> String {
        self.0.join(" ")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunRecord {
    pub run: String,
    pub seed: u64,
    pub coldtrap: String,
    /// One value per [`RunsTable::metrics`] entry; NaN where empty.
    pub values: Vec<f64>,
}

impl RunRecordLike for RunRecord {
    fn run(&self) -> &str {
        &self.run
    }
    fn set_run(&mut self, run: String) {
        self.run = run;
    }
    fn seed(&self) -> u64 {
        self.seed
    }
}

/// Run-level summary records per (run, seed, coldtrap).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunsTable {
    pub metrics: Vec<ColumnKey>,
    pub records: Vec<RunRecord>,
}

impl RunsTable {
    /// Index of a metric by its flattened name.
    pub fn metric_index(&self, name: &str) -> Option<usize> {
        self.metrics.iter().position(|k| k.flat() == name)
    }

    /// Values of metric `name` for the records of `run` at `coldtrap`.
    pub fn values(&self, name: &str, run: &str, coldtrap: &str) -> Result<Vec<f64>> {
        let idx = self
            .metric_index(name)
            .ok_or_else(|| FigureError::MissingColumn(name.to_string()))?;
        Ok(self
            .records
            .iter()
            .filter(|r| r.run == run && r.coldtrap == coldtrap)
            .map(|r| r.values[idx])
            .collect())
    }

    /// Appends metric `name` computed from `source` on every record.
    pub fn derive_metric(
        &mut self,
        name: &str,
        source: &str,
        f: impl Fn(f64) -> f64,
    ) -> Result<()> {
        let idx = self
            .metric_index(source)
            .ok_or_else(|| FigureError::MissingColumn(source.to_string()))?;
        for record in &mut self.records {
            let derived = f(record.values[idx]);
            record.values.push(derived);
        }
        self.metrics.push(ColumnKey(vec![name.to_string()]));
        Ok(())
    }

    fn flatten(&mut self) {
        for key in &mut self.metrics {
            *key = ColumnKey(vec![key.flat()]);
        }
    }
}

/// Mapping from internal run ids to display labels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunRename {
    map: HashMap<String, String>,
}

impl RunRename {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            map: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Pairs `run_names[i]` with `labels[i]`.
    pub fn zip(run_names: &[&str], labels: &[&str]) -> Self {
        Self::new(run_names.iter().copied().zip(labels.iter().copied()))
    }

    pub fn get(&self, run: &str) -> Option<&str> {
        self.map.get(run).map(String::as_str)
    }
}

/// Outcome of [`rename_runs`]. Unmapped runs are dropped, not errors; this
/// is how callers select a subset of runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenameReport {
    pub kept: usize,
    pub dropped: usize,
    pub unmapped_runs: BTreeSet<String>,
}

impl RenameReport {
    fn absorb(&mut self, other: RenameReport) {
        self.kept += other.kept;
        self.dropped += other.dropped;
        self.unmapped_runs.extend(other.unmapped_runs);
    }
}

/// Rewrites run ids through `mapping`, dropping records whose id is unmapped.
pub fn rename_runs<R: RunRecordLike>(records: &mut Vec<R>, mapping: &RunRename) -> RenameReport {
    let mut report = RenameReport::default();
    records.retain_mut(|record| match mapping.get(record.run()) {
        Some(label) => {
            record.set_run(label.to_string());
            report.kept += 1;
            true
        }
        None => {
            report.unmapped_runs.insert(record.run().to_string());
            report.dropped += 1;
            false
        }
    });
    if !report.unmapped_runs.is_empty() {
        warn!(
            "dropped {} records from unmapped runs {:?}",
            report.dropped, report.unmapped_runs
        );
    }
    report
}

/// Layers, runs and the number of distinct seeds behind them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedRuns {
    pub dir: PathBuf,
    pub layers: LayersTable,
    pub runs: RunsTable,
    pub run_count: Option<usize>,
    pub rename_report: Option<RenameReport>,
}

impl LoadedRuns {
    /// Distinct seeds across layers and runs records.
    pub fn count_seeds(&self) -> usize {
        let mut seeds = BTreeSet::new();
        seeds.extend(self.layers.records.iter().map(|r| r.seed()));
        seeds.extend(self.runs.records.iter().map(|r| r.seed()));
        seeds.len()
    }

    /// Renames both tables; the run count, if tracked, is recomputed.
    pub fn rename(&mut self, mapping: &RunRename) -> RenameReport {
        let mut report = rename_runs(&mut self.layers.records, mapping);
        report.absorb(rename_runs(&mut self.runs.records, mapping));
        if self.run_count.is_some() {
            self.run_count = Some(self.count_seeds());
        }
        self.rename_report = Some(report.clone());
        report
    }
}

/// Builder for loading one results directory.
#[derive(Clone, Debug)]
pub struct AggregateLoader {
    root: PathBuf,
    selector: ResultsSelector,
    flatten: bool,
    run_count: bool,
    rename: Option<RunRename>,
}

impl AggregateLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            selector: ResultsSelector::Latest,
            flatten: true,
            run_count: true,
            rename: None,
        }
    }

    pub fn select(mut self, selector: ResultsSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn run_count(mut self, run_count: bool) -> Self {
        self.run_count = run_count;
        self
    }

    pub fn rename(mut self, mapping: RunRename) -> Self {
        self.rename = Some(mapping);
        self
    }

    pub fn load(self) -> Result<LoadedRuns> {
        let dir = locate_results(&self.root, &self.selector)?;
        info!("Loading aggregated data from {}", dir.display());

        let layers = read_layers(&dir.join(LAYERS_FILE))?;
        let runs_path = dir.join(RUNS_FILE);
        let mut runs = if runs_path.is_file() {
            read_runs(&runs_path)?
        } else {
            debug!("no {RUNS_FILE} in {}", dir.display());
            RunsTable::default()
        };
        if self.flatten {
            runs.flatten();
        }

        let mut loaded = LoadedRuns {
            dir,
            layers,
            runs,
            run_count: None,
            rename_report: None,
        };
        if let Some(mapping) = &self.rename {
            loaded.rename(mapping);
        }
        if self.run_count {
            loaded.run_count = Some(loaded.count_seeds());
        }
        Ok(loaded)
    }
}

fn require_headers(headers: &csv::StringRecord, required: &[&str]) -> Result<()> {
    for name in required {
        if !headers.iter().any(|h| h.trim() == *name) {
            return Err(FigureError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

pub fn read_layers(path: &Path) -> Result<LayersTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    require_headers(rdr.headers()?, &["run", "seed", "coldtrap", "depth", "ice"])?;
    let records = rdr
        .deserialize::<LayerRecord>()
        .collect::<core::result::Result<Vec<_>, _>>()?;
    debug!("read {} layer records from {}", records.len(), path.display());
    Ok(LayersTable { records })
}

pub fn read_runs(path: &Path) -> Result<RunsTable> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = rdr.headers()?.clone();
    require_headers(&headers, &["run", "seed", "coldtrap"])?;
    let position = |name: &str| headers.iter().position(|h| h == name);
    let (Some(run_i), Some(seed_i), Some(coldtrap_i)) =
        (position("run"), position("seed"), position("coldtrap"))
    else {
        return Err(FigureError::MissingColumn("run/seed/coldtrap".to_string()));
    };
    let metric_cols: Vec<usize> = (0..headers.len())
        .filter(|i| ![run_i, seed_i, coldtrap_i].contains(i))
        .collect();
    let metrics = metric_cols
        .iter()
        .map(|&i| ColumnKey::parse(&headers[i]))
        .collect();

    let parse_err = |line: u64, message: String| FigureError::Parse {
        what: "runs record",
        path: path.to_path_buf(),
        line,
        message,
    };
    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let field = |i: usize| row.get(i).unwrap_or("");
        let seed = field(seed_i)
            .parse::<u64>()
            .map_err(|e| parse_err(line, format!("seed: {e}")))?;
        let values = metric_cols
            .iter()
            .map(|&i| {
                let raw = field(i);
                if raw.is_empty() {
                    Ok(f64::NAN)
                } else {
                    raw.parse::<f64>()
                        .map_err(|e| parse_err(line, format!("{}: {e}", &headers[i])))
                }
            })
            .collect::<Result<Vec<f64>>>()?;
        records.push(RunRecord {
            run: field(run_i).to_string(),
            seed,
            coldtrap: field(coldtrap_i).to_string(),
            values,
        });
    }
    debug!("read {} run records from {}", records.len(), path.display());
    Ok(RunsTable { metrics, records })
}
