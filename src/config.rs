use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Parameter preset of the simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Reproduces the earlier published model: no solar wind, no ballistic sedimentation.
    Cannon,
    #[default]
    Moonpies,
}

/// Named physical and numeric parameters handed to the simulation engine.
///
/// Variants are derived by copy-and-override (`with_seed`, `comet`) so a base
/// configuration is never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimConfig {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub is_comet: bool,
    /// Oldest simulated time [yr before present].
    #[serde(default = "SimConfig::default_time_start")]
    pub time_start: f64,
    #[serde(default)]
    pub time_end: f64,
    #[serde(default = "SimConfig::default_timestep")]
    pub timestep: f64,
    /// Mean impact speed [m/s].
    #[serde(default = "SimConfig::default_impact_speed_mean")]
    pub impact_speed_mean: f64,
    #[serde(default = "SimConfig::default_impact_speed_sd")]
    pub impact_speed_sd: f64,
    #[serde(default = "SimConfig::default_comet_speed_mean")]
    pub comet_speed_mean: f64,
    #[serde(default = "SimConfig::default_comet_speed_sd")]
    pub comet_speed_sd: f64,
    #[serde(default = "SimConfig::default_comet_speed_min")]
    pub comet_speed_min: f64,
    #[serde(default = "SimConfig::default_comet_speed_max")]
    pub comet_speed_max: f64,
    /// Fraction of impactors that carry hydrated material.
    #[serde(default = "SimConfig::default_hydrated_frac")]
    pub hydrated_frac: f64,
    /// Water mass fraction of hydrated asteroids.
    #[serde(default = "SimConfig::default_hydrated_wt_pct")]
    pub hydrated_wt_pct: f64,
    /// Water mass fraction of comets.
    #[serde(default = "SimConfig::default_comet_hydrated_wt_pct")]
    pub comet_hydrated_wt_pct: f64,
    /// Share of the impact flux that is cometary.
    #[serde(default = "SimConfig::default_comet_ast_frac")]
    pub comet_ast_frac: f64,
    #[serde(default = "SimConfig::default_version")]
    pub version: String,
}

impl SimConfig {
    fn default_time_start() -> f64 {
        4.25e9
    }
    fn default_timestep() -> f64 {
        10e6
    }
    fn default_impact_speed_mean() -> f64 {
        20e3
    }
    fn default_impact_speed_sd() -> f64 {
        6e3
    }
    fn default_comet_speed_mean() -> f64 {
        34e3
    }
    fn default_comet_speed_sd() -> f64 {
        12e3
    }
    fn default_comet_speed_min() -> f64 {
        10.2e3
    }
    fn default_comet_speed_max() -> f64 {
        72e3
    }
    fn default_hydrated_frac() -> f64 {
        0.36
    }
    fn default_hydrated_wt_pct() -> f64 {
        0.1
    }
    fn default_comet_hydrated_wt_pct() -> f64 {
        0.2
    }
    fn default_comet_ast_frac() -> f64 {
        0.05
    }
    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    pub fn moonpies() -> Self {
        Self::default()
    }

    pub fn cannon() -> Self {
        Self {
            mode: Mode::Cannon,
            ..Self::default()
        }
    }

    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    /// Comet variant: comet speed distribution and comet composition.
    pub fn comet(&self) -> Self {
        Self {
            is_comet: true,
            impact_speed_mean: self.comet_speed_mean,
            impact_speed_sd: self.comet_speed_sd,
            hydrated_frac: 1.0,
            hydrated_wt_pct: self.comet_hydrated_wt_pct,
            ..self.clone()
        }
    }

    /// Share of the impact flux this configuration's impactor class carries.
    pub fn flux_frac(&self) -> f64 {
        if self.is_comet {
            self.comet_ast_frac
        } else {
            1.0 - self.comet_ast_frac
        }
    }

    pub fn solar_wind_enabled(&self) -> bool {
        self.mode == Mode::Moonpies
    }

    pub fn ballistic_sed_enabled(&self) -> bool {
        self.mode == Mode::Moonpies
    }

    /// Simulation time steps from `time_start` down to `time_end`, inclusive.
    pub fn time_array(&self) -> Vec<f64> {
        if self.timestep <= 0.0 || self.time_start < self.time_end {
            return Vec::new();
        }
        let n = ((self.time_start - self.time_end) / self.timestep).round() as usize + 1;
        (0..n)
            .map(|i| self.time_start - i as f64 * self.timestep)
            .collect()
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            mode: Mode::Moonpies,
            is_comet: false,
            time_start: Self::default_time_start(),
            time_end: 0.0,
            timestep: Self::default_timestep(),
            impact_speed_mean: Self::default_impact_speed_mean(),
            impact_speed_sd: Self::default_impact_speed_sd(),
            comet_speed_mean: Self::default_comet_speed_mean(),
            comet_speed_sd: Self::default_comet_speed_sd(),
            comet_speed_min: Self::default_comet_speed_min(),
            comet_speed_max: Self::default_comet_speed_max(),
            hydrated_frac: Self::default_hydrated_frac(),
            hydrated_wt_pct: Self::default_hydrated_wt_pct(),
            comet_hydrated_wt_pct: Self::default_comet_hydrated_wt_pct(),
            comet_ast_frac: Self::default_comet_ast_frac(),
            version: Self::default_version(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FigureConfig {
    #[serde(default = "FigureConfig::default_figs_dir")]
    pub figs_dir: PathBuf,
    /// Root holding one subdirectory per aggregated results set.
    #[serde(default = "FigureConfig::default_results_root")]
    pub results_root: PathBuf,
    /// Explicit results subdirectory; the latest one is used when unset.
    #[serde(default)]
    pub results_dir: Option<String>,
    #[serde(default = "FigureConfig::default_n_seeds")]
    pub n_seeds: u64,
    #[serde(default = "FigureConfig::default_time_bins")]
    pub time_bins: usize,
    #[serde(default = "FigureConfig::default_era_labels")]
    pub era_labels: Vec<String>,
    /// Era edges [Ga], strictly decreasing, one more than the labels.
    #[serde(default = "FigureConfig::default_era_ages_ga")]
    pub era_ages_ga: Vec<f64>,
    #[serde(default = "FigureConfig::default_coldtraps")]
    pub coldtraps: Vec<String>,
    #[serde(default = "FigureConfig::default_basin_runs")]
    pub basin_runs: u64,
    #[serde(default = "FigureConfig::default_basin_seed0")]
    pub basin_seed0: u64,
    #[serde(default = "FigureConfig::default_workers")]
    pub workers: usize,
}

impl FigureConfig {
    fn default_figs_dir() -> PathBuf {
        PathBuf::from("figs")
    }
    fn default_results_root() -> PathBuf {
        PathBuf::from("out")
    }
    fn default_n_seeds() -> u64 {
        10
    }
    fn default_time_bins() -> usize {
        85
    }
    fn default_era_labels() -> Vec<String> {
        ["Pre-Nec.", "Nec.", "Imb.", "Era.", "Cop."]
            .into_iter()
            .map(String::from)
            .collect()
    }
    fn default_era_ages_ga() -> Vec<f64> {
        vec![4.26, 3.97, 3.83, 3.2, 1.1, 0.0]
    }
    fn default_coldtraps() -> Vec<String> {
        [
            "Faustini",
            "Haworth",
            "Shoemaker",
            "Cabeus B",
            "Idel'son L",
            "Amundsen",
            "Cabeus",
            "de Gerlache",
            "Slater",
            "Sverdrup",
            "Wiechert J",
            "Shackleton",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    fn default_basin_runs() -> u64 {
        500
    }
    fn default_basin_seed0() -> u64 {
        200
    }
    fn default_workers() -> usize {
        4
    }

    /// Era edges converted to years.
    pub fn era_edges_yr(&self) -> Vec<f64> {
        self.era_ages_ga.iter().map(|ga| ga * 1e9).collect()
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        Self {
            figs_dir: Self::default_figs_dir(),
            results_root: Self::default_results_root(),
            results_dir: None,
            n_seeds: Self::default_n_seeds(),
            time_bins: Self::default_time_bins(),
            era_labels: Self::default_era_labels(),
            era_ages_ga: Self::default_era_ages_ga(),
            coldtraps: Self::default_coldtraps(),
            basin_runs: Self::default_basin_runs(),
            basin_seed0: Self::default_basin_seed0(),
            workers: Self::default_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimConfig,
    #[serde(default)]
    pub figures: FigureConfig,
}

impl AppConfig {
    /// Reads `path`, or writes a commented copy of the defaults there when it
    /// does not exist. Unreadable or malformed files fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => match toml::from_str(&contents) {
                    Ok(cfg) => return cfg,
                    Err(err) => {
                        warn!("Failed to parse config {}: {err}. Using defaults.", path.display());
                    }
                },
                Err(err) => {
                    warn!("Failed to read config {}: {err}. Using defaults.", path.display());
                }
            }
            return Self::default();
        }

        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path, comment_out_values(&text)) {
                    warn!("Failed to write default config to {}: {err}", path.display());
                } else {
                    info!("Wrote default config to {}", path.display());
                }
            }
            Err(err) => warn!("Failed to serialize default config: {err}"),
        }
        default_cfg
    }
}

/// Comments out every key line, keeping section headers live.
fn comment_out_values(text: &str) -> String {
    let mut commented = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            commented.push('\n');
        } else if trimmed.starts_with('[') && trimmed.ends_with(']') {
            commented.push_str(line);
            commented.push('\n');
        } else {
            commented.push_str("# ");
            commented.push_str(line);
            commented.push('\n');
        }
    }
    commented
}
