//! Seeded stand-in for the simulation engine.
//!
//! Produces plausible, finite, non-negative module outputs so the aggregation
//! and figure pipeline can run without the physical model. The magnitudes are
//! shaped after the published module curves, not computed from physics.

use ndarray::Array2;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{CraterRecord, Simulation, SimulationSession};
use crate::config::SimConfig;
use crate::error::{FigureError, Result};

const GA: f64 = 1e9;

/// Nominal crater and basin list: (name, lat, age [Ga], -err, +err, basin).
const CRATERS: [(&str, f64, f64, f64, f64, bool); 16] = [
    ("Faustini", -87.3, 4.1, 0.1, 0.1, false),
    ("Haworth", -87.4, 3.98, 0.07, 0.07, false),
    ("Shoemaker", -88.1, 4.03, 0.07, 0.07, false),
    ("Cabeus B", -82.3, 3.87, 0.07, 0.07, false),
    ("Idel'son L", -84.2, 3.89, 0.07, 0.07, false),
    ("Amundsen", -84.4, 3.76, 0.07, 0.07, false),
    ("Cabeus", -85.3, 3.84, 0.07, 0.07, false),
    ("de Gerlache", -88.5, 3.34, 0.11, 0.11, false),
    ("Slater", -88.1, 3.36, 0.13, 0.13, false),
    ("Sverdrup", -88.3, 3.56, 0.08, 0.08, false),
    ("Wiechert J", -85.2, 2.15, 0.87, 0.87, false),
    ("Shackleton", -89.7, 3.15, 0.15, 0.15, false),
    ("South Pole-Aitken", -53.0, 4.25, 0.02, 0.02, true),
    ("Nectaris", -15.6, 3.97, 0.05, 0.05, true),
    ("Serenitatis", 26.1, 3.94, 0.05, 0.05, true),
    ("Imbrium", 32.8, 3.83, 0.03, 0.03, true),
];

/// Relative impact flux, decaying from the late heavy bombardment.
fn impact_flux(t: f64) -> f64 {
    1.0 + ((t - 3.5 * GA) / (0.15 * GA)).exp()
}

#[derive(Clone, Debug, Default)]
pub struct SyntheticSimulation;

impl Simulation for SyntheticSimulation {
    type Session = SyntheticSession;

    fn session(&self, config: &SimConfig) -> Result<SyntheticSession> {
        SyntheticSession::new(config.clone())
    }
}

pub struct SyntheticSession {
    cfg: SimConfig,
    time: Vec<f64>,
    craters: Vec<CraterRecord>,
    rng: StdRng,
    /// Random crater ages drawn once per session.
    crater_ages: Vec<f64>,
}

impl SyntheticSession {
    pub fn new(cfg: SimConfig) -> Result<Self> {
        let time = cfg.time_array();
        if time.is_empty() {
            return Err(FigureError::Simulation(format!(
                "empty time array (start={}, end={}, step={})",
                cfg.time_start, cfg.time_end, cfg.timestep
            )));
        }
        let craters: Vec<CraterRecord> = CRATERS
            .iter()
            .map(|&(name, lat, age, low, upp, is_basin)| CraterRecord {
                name: name.to_string(),
                lat,
                age: age * GA,
                age_low: low * GA,
                age_upp: upp * GA,
                is_basin,
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let crater_ages = craters
            .iter()
            .map(|c| rng.random_range((c.age - c.age_low)..=(c.age + c.age_upp)))
            .collect();
        Ok(Self {
            cfg,
            time,
            craters,
            rng,
            crater_ages,
        })
    }

    fn dt_scale(&self) -> f64 {
        self.cfg.timestep / 10e6
    }

    /// Share of delivered water that survives impact at `speed` [m/s].
    fn retention(speed: f64) -> f64 {
        (1.0 - (speed - 10e3) / 50e3).clamp(0.0, 1.0)
    }

    fn impactor_water(&self) -> f64 {
        self.cfg.hydrated_frac
            * self.cfg.hydrated_wt_pct
            * self.cfg.flux_frac()
            * Self::retention(self.cfg.impact_speed_mean)
    }

    fn random_speed(&mut self) -> f64 {
        // Uniform draw with the configured mean and standard deviation.
        let half_width = self.cfg.impact_speed_sd * 3f64.sqrt();
        let lo = (self.cfg.impact_speed_mean - half_width).max(0.0);
        let hi = self.cfg.impact_speed_mean + half_width;
        let speed = self.rng.random_range(lo..=hi);
        if self.cfg.is_comet {
            speed.clamp(self.cfg.comet_speed_min, self.cfg.comet_speed_max)
        } else {
            speed
        }
    }

    fn time_index(&self, age: f64) -> usize {
        let first = self.time[0];
        let idx = ((first - age) / self.cfg.timestep).round();
        idx.clamp(0.0, (self.time.len() - 1) as f64) as usize
    }

    fn scaled_flux(&self, base: f64) -> Vec<f64> {
        let scale = base * self.impactor_water() * self.dt_scale();
        self.time.iter().map(|&t| scale * impact_flux(t)).collect()
    }

    fn stochastic_craters(&mut self, rate: f64, magnitude: f64) -> Vec<f64> {
        let water = self.impactor_water() * self.dt_scale();
        let mut out = vec![0.0; self.time.len()];
        for i in 0..self.time.len() {
            let p = (rate * impact_flux(self.time[i])).min(1.0);
            if self.rng.random_bool(p) {
                let size = self.rng.random_range(0.1..=1.0);
                out[i] = magnitude * size * water * Self::retention(self.random_speed());
            }
        }
        out
    }
}

impl SimulationSession for SyntheticSession {
    fn config(&self) -> &SimConfig {
        &self.cfg
    }

    fn time_array(&self) -> &[f64] {
        &self.time
    }

    fn craters(&self) -> &[CraterRecord] {
        &self.craters
    }

    fn volcanic_ice(&mut self) -> Result<Vec<f64>> {
        let scale = 1e-3 * self.dt_scale();
        Ok(self
            .time
            .iter()
            .map(|&t| {
                if (2.0 * GA..=4.0 * GA).contains(&t) {
                    let z = (t - 3.5 * GA) / (0.4 * GA);
                    scale * (-z * z).exp()
                } else {
                    0.0
                }
            })
            .collect())
    }

    fn solar_wind_ice(&mut self) -> Result<Vec<f64>> {
        let value = if self.cfg.solar_wind_enabled() {
            2e-4 * self.dt_scale()
        } else {
            0.0
        };
        Ok(vec![value; self.time.len()])
    }

    fn micrometeorite_ice(&mut self) -> Result<Vec<f64>> {
        Ok(self.scaled_flux(5e-3))
    }

    fn small_impactor_ice(&mut self) -> Result<Vec<f64>> {
        Ok(self.scaled_flux(2e-2))
    }

    fn small_simple_crater_ice(&mut self) -> Result<Vec<f64>> {
        Ok(self.scaled_flux(5e-2))
    }

    fn large_simple_crater_ice(&mut self) -> Result<Vec<f64>> {
        Ok(self.stochastic_craters(0.02, 10.0))
    }

    fn complex_crater_ice(&mut self) -> Result<Vec<f64>> {
        Ok(self.stochastic_craters(0.005, 50.0))
    }

    fn basin_ice(&mut self) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.time.len()];
        let water = self.cfg.hydrated_frac * self.cfg.hydrated_wt_pct * self.cfg.flux_frac();
        let basins: Vec<(usize, f64)> = self
            .craters
            .iter()
            .zip(&self.crater_ages)
            .filter(|(c, _)| c.is_basin)
            .map(|(c, &age)| (self.time_index(age), c.lat))
            .collect();
        for (idx, lat) in basins {
            let speed = self.random_speed();
            // Farther basins deliver less to the south pole.
            let distance_factor = 1.0 / (1.0 + (lat + 90.0) / 30.0);
            out[idx] += 500.0 * water * distance_factor * Self::retention(speed);
        }
        Ok(out)
    }

    fn gardening_depth(&mut self) -> Result<Vec<f64>> {
        let scale = 0.05 * self.dt_scale();
        Ok(self.time.iter().map(|&t| scale * impact_flux(t)).collect())
    }

    fn bsed_depth(&mut self) -> Result<(Array2<f64>, Array2<f64>)> {
        let n_craters = self.craters.len();
        let n_time = self.time.len();
        let mut depth = Array2::<f64>::zeros((n_craters, n_time));
        let mut fraction = Array2::<f64>::zeros((n_craters, n_time));
        if !self.cfg.ballistic_sed_enabled() {
            return Ok((depth, fraction));
        }
        for c in 0..n_craters {
            if self.craters[c].is_basin {
                continue;
            }
            let idx = self.time_index(self.crater_ages[c]);
            depth[[c, idx]] = self.rng.random_range(0.5..=20.0);
            fraction[[c, idx]] = self.rng.random_range(0.0..=1.0);
        }
        Ok((depth, fraction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ice_by_module;
    use crate::stats::Statistic;
    use crate::table::IceColumn;

    fn short_cfg(seed: u64) -> SimConfig {
        SimConfig {
            seed,
            time_start: 4.25e9,
            time_end: 0.0,
            timestep: 50e6,
            ..SimConfig::default()
        }
    }

    #[test]
    fn same_seed_same_table() {
        let sim = SyntheticSimulation;
        let a = ice_by_module(&mut sim.session(&short_cfg(4)).unwrap(), Statistic::Mean).unwrap();
        let b = ice_by_module(&mut sim.session(&short_cfg(4)).unwrap(), Statistic::Mean).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tables_are_finite_and_non_negative() {
        let sim = SyntheticSimulation;
        for cfg in [short_cfg(1), short_cfg(1).comet(), SimConfig::cannon().with_seed(2)] {
            let table = ice_by_module(&mut sim.session(&cfg).unwrap(), Statistic::Mean).unwrap();
            table.check_finite().unwrap();
            for (column, values) in table.columns() {
                assert!(values.iter().all(|&v| v >= 0.0), "{column} has negative values");
            }
            assert_eq!(table.column_names(), IceColumn::MODULES.to_vec());
        }
    }

    #[test]
    fn cannon_mode_has_no_bsed_or_solar_wind() {
        let sim = SyntheticSimulation;
        let cfg = SimConfig {
            timestep: 50e6,
            ..SimConfig::cannon()
        };
        let table = ice_by_module(&mut sim.session(&cfg).unwrap(), Statistic::Mean).unwrap();
        assert!(table.require(IceColumn::BallisticSedDepth).unwrap().iter().all(|&v| v == 0.0));
        assert!(table.require(IceColumn::SolarWind).unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_time_array_is_an_error() {
        let cfg = SimConfig {
            timestep: 0.0,
            ..SimConfig::default()
        };
        assert!(SyntheticSimulation.session(&cfg).is_err());
    }
}
