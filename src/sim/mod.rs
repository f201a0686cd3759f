//! Contract with the external simulation engine and the per-seed adapter.
//!
//! The engine is consumed through [`Simulation`], which opens one
//! [`SimulationSession`] per (configuration, seed). Any memoized draws live in
//! the session, so a fresh session is a fresh random state and nothing needs
//! to be cleared between seeds.

pub mod synthetic;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bsed;
use crate::config::SimConfig;
use crate::error::Result;
use crate::stats::Statistic;
use crate::table::{IceColumn, TimeSeriesTable};

/// A crater or basin from the engine's crater list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CraterRecord {
    pub name: String,
    /// Latitude [deg].
    pub lat: f64,
    /// Nominal age [yr before present].
    pub age: f64,
    /// Uncertainty towards younger ages [yr].
    pub age_low: f64,
    /// Uncertainty towards older ages [yr].
    pub age_upp: f64,
    pub is_basin: bool,
}

/// One seeded draw of the simulation.
///
/// Every per-module vector has one value per entry of [`time_array`].
///
/// [`time_array`]: SimulationSession::time_array
pub trait SimulationSession {
    fn config(&self) -> &SimConfig;
    fn time_array(&self) -> &[f64];
    fn craters(&self) -> &[CraterRecord];

    fn volcanic_ice(&mut self) -> Result<Vec<f64>>;
    fn solar_wind_ice(&mut self) -> Result<Vec<f64>>;
    fn micrometeorite_ice(&mut self) -> Result<Vec<f64>>;
    fn small_impactor_ice(&mut self) -> Result<Vec<f64>>;
    fn small_simple_crater_ice(&mut self) -> Result<Vec<f64>>;
    fn large_simple_crater_ice(&mut self) -> Result<Vec<f64>>;
    fn complex_crater_ice(&mut self) -> Result<Vec<f64>>;
    fn basin_ice(&mut self) -> Result<Vec<f64>>;
    /// Impact gardening overturn depth [m].
    fn gardening_depth(&mut self) -> Result<Vec<f64>>;
    /// Ballistic sedimentation mixing depth [m] and affected fraction, both
    /// indexed `[crater, time]`.
    fn bsed_depth(&mut self) -> Result<(Array2<f64>, Array2<f64>)>;
}

/// Factory of independent sessions.
pub trait Simulation {
    type Session: SimulationSession;

    fn session(&self, config: &SimConfig) -> Result<Self::Session>;
}

/// Builds the per-module table for one session.
///
/// The ballistic sedimentation column is the cross-crater reduction of the
/// session's depth × fraction field.
pub fn ice_by_module<S: SimulationSession + ?Sized>(
    session: &mut S,
    bsed_stat: Statistic,
) -> Result<TimeSeriesTable> {
    let mut out = TimeSeriesTable::new(session.time_array().to_vec());
    out.insert(IceColumn::Volcanic, session.volcanic_ice()?)?;
    out.insert(IceColumn::SolarWind, session.solar_wind_ice()?)?;
    out.insert(IceColumn::Micrometeorite, session.micrometeorite_ice()?)?;
    out.insert(IceColumn::SmallImpactor, session.small_impactor_ice()?)?;
    out.insert(IceColumn::SmallSimpleCrater, session.small_simple_crater_ice()?)?;
    out.insert(IceColumn::LargeSimpleCrater, session.large_simple_crater_ice()?)?;
    out.insert(IceColumn::LargeComplexCrater, session.complex_crater_ice()?)?;
    out.insert(IceColumn::Basin, session.basin_ice()?)?;
    out.insert(IceColumn::GardeningDepth, session.gardening_depth()?)?;
    out.insert(
        IceColumn::BallisticSedDepth,
        bsed::reduce_bsed_depth(session, bsed_stat)?,
    )?;
    debug!(
        "ice_by_module: seed={} comet={} rows={}",
        session.config().seed,
        session.config().is_comet,
        out.len()
    );
    Ok(out)
}
