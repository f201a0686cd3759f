//! Ensemble aggregation, era binning and figure generation for moonpies
//! lunar polar ice runs.

pub mod bsed;
pub mod config;
pub mod ensemble;
pub mod era;
pub mod error;
pub mod figures;
pub mod runs;
pub mod sim;
pub mod stats;
pub mod table;

pub use error::{FigureError, Result};
