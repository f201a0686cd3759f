//! Error type shared by the aggregation pipeline and the figure functions.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FigureError {
    /// No results directory with a `layers.csv` marker under the root.
    #[error("no aggregated results directory found under {root}")]
    NotFound { root: PathBuf },

    /// A table or array does not line up with the one it is combined with.
    #[error("shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error("ensemble has no contributions: {0}")]
    EmptyEnsemble(String),

    #[error("non-finite value in column `{column}` at row {row}")]
    NonFinite { column: String, row: usize },

    #[error("invalid era bins: {0}")]
    InvalidEraBins(String),

    #[error("unknown era label `{0}`")]
    UnknownEra(String),

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("failed to parse {what} in {path} (line {line}): {message}")]
    Parse {
        what: &'static str,
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("simulation error: {0}")]
    Simulation(String),

    #[error("plot error: {0}")]
    Plot(String),

    #[error("figure job `{0}` panicked")]
    JobPanicked(String),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl FigureError {
    pub fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        FigureError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn plot(err: impl std::fmt::Display) -> Self {
        FigureError::Plot(err.to_string())
    }
}

pub type Result<T> = core::result::Result<T, FigureError>;
