//! Cross-crater reduction of ballistic sedimentation mixing depth.

use ndarray::{ArrayView2, Axis};

use crate::error::{FigureError, Result};
use crate::sim::SimulationSession;
use crate::stats::Statistic;

/// Expected ballistic sedimentation depth per time step for one session.
pub fn reduce_bsed_depth<S: SimulationSession + ?Sized>(
    session: &mut S,
    statistic: Statistic,
) -> Result<Vec<f64>> {
    let n_time = session.time_array().len();
    let (depth, fraction) = session.bsed_depth()?;
    if depth.ncols() != n_time {
        return Err(FigureError::shape(
            "bsed depth time axis",
            n_time,
            depth.ncols(),
        ));
    }
    reduce_depth_fraction(depth.view(), fraction.view(), statistic)
}

/// Multiplies `depth` by `fraction` and reduces across craters (axis 0).
///
/// Both arrays are `[crater, time]`. With no craters every step is zero.
pub fn reduce_depth_fraction(
    depth: ArrayView2<'_, f64>,
    fraction: ArrayView2<'_, f64>,
    statistic: Statistic,
) -> Result<Vec<f64>> {
    if depth.dim() != fraction.dim() {
        return Err(FigureError::shape(
            "bsed depth vs fraction",
            format!("{:?}", depth.dim()),
            format!("{:?}", fraction.dim()),
        ));
    }
    let (n_craters, n_time) = depth.dim();
    if n_craters == 0 {
        return Ok(vec![0.0; n_time]);
    }
    let product = &depth * &fraction;
    Ok(product
        .axis_iter(Axis(1))
        .map(|per_crater| {
            let values: Vec<f64> = per_crater.iter().copied().collect();
            statistic.apply(&values)
        })
        .collect())
}
