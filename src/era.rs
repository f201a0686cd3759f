//! Era-level summaries of a module time series.

use tracing::debug;

use crate::error::{FigureError, Result};
use crate::stats;
use crate::table::{IceColumn, TimeSeriesTable};

/// Contiguous geological eras defined by strictly decreasing edges [yr].
///
/// Era `i` spans `edges[i + 1] <= t < edges[i]`: an age on a boundary goes to
/// the older era. The oldest edge is closed into the oldest era so the eras
/// partition `[edges.last, edges[0]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct EraBins {
    edges_desc: Vec<f64>,
    labels_desc: Vec<String>,
}

impl EraBins {
    pub fn new(edges_desc: Vec<f64>, labels_desc: Vec<String>) -> Result<Self> {
        if edges_desc.len() < 2 {
            return Err(FigureError::InvalidEraBins(format!(
                "need at least two edges, got {}",
                edges_desc.len()
            )));
        }
        if labels_desc.len() != edges_desc.len() - 1 {
            return Err(FigureError::InvalidEraBins(format!(
                "{} edges need {} labels, got {}",
                edges_desc.len(),
                edges_desc.len() - 1,
                labels_desc.len()
            )));
        }
        if edges_desc.iter().any(|e| !e.is_finite()) {
            return Err(FigureError::InvalidEraBins("edges must be finite".to_string()));
        }
        if let Some(w) = edges_desc.windows(2).find(|w| w[0] <= w[1]) {
            return Err(FigureError::InvalidEraBins(format!(
                "edges must be strictly decreasing ({} then {})",
                w[0], w[1]
            )));
        }
        for (i, label) in labels_desc.iter().enumerate() {
            if labels_desc[..i].contains(label) {
                return Err(FigureError::InvalidEraBins(format!(
                    "duplicate label `{label}`"
                )));
            }
        }
        Ok(Self {
            edges_desc,
            labels_desc,
        })
    }

    /// Standard lunar eras from Pre-Nectarian to Copernican.
    pub fn lunar() -> Self {
        Self {
            edges_desc: vec![4.26e9, 3.97e9, 3.83e9, 3.2e9, 1.1e9, 0.0],
            labels_desc: ["Pre-Nec.", "Nec.", "Imb.", "Era.", "Cop."]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels_desc
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges_desc
    }

    /// Index of the era holding `t`, if any.
    pub fn era_of(&self, t: f64) -> Option<usize> {
        let n = self.labels_desc.len();
        let oldest = self.edges_desc[0];
        if !(t <= oldest && t >= self.edges_desc[n]) {
            return None;
        }
        if t == oldest {
            return Some(0);
        }
        (0..n).find(|&i| t >= self.edges_desc[i + 1])
    }

    fn label_index(&self, label: &str) -> Result<usize> {
        self.labels_desc
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| FigureError::UnknownEra(label.to_string()))
    }
}

/// One row per era, one column per table column. `None` marks an era with
/// no samples.
#[derive(Clone, Debug, PartialEq)]
pub struct EraTable {
    pub labels: Vec<String>,
    pub columns: Vec<IceColumn>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl EraTable {
    pub fn get(&self, label: &str, column: IceColumn) -> Option<f64> {
        let row = self.labels.iter().position(|l| l == label)?;
        let col = self.columns.iter().position(|&c| c == column)?;
        self.values[row][col]
    }

    pub fn column(&self, column: IceColumn) -> Option<Vec<Option<f64>>> {
        let col = self.columns.iter().position(|&c| c == column)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EraStats {
    pub mean: EraTable,
    pub min: EraTable,
    pub max: EraTable,
    /// Number of time steps in each era, in output row order.
    pub counts: Vec<usize>,
}

/// Groups `table` rows into eras and reduces each column to mean, min and
/// max. Rows come out in `label_order` (typically oldest to youngest).
///
/// Derived columns must already be present in `table`; they are binned as
/// their own series, not rebuilt from per-column statistics.
pub fn bin_by_era(
    table: &TimeSeriesTable,
    bins: &EraBins,
    label_order: &[&str],
) -> Result<EraStats> {
    let n_eras = bins.labels().len();
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); n_eras];
    let mut outside = 0usize;
    for (row, &t) in table.time().iter().enumerate() {
        match bins.era_of(t) {
            Some(era) => members[era].push(row),
            None => outside += 1,
        }
    }
    if outside > 0 {
        debug!("bin_by_era: {outside} rows fall outside the era range");
    }

    let columns = table.column_names();
    let order: Vec<usize> = label_order
        .iter()
        .map(|label| bins.label_index(label))
        .collect::<Result<_>>()?;

    let mut mean = Vec::with_capacity(order.len());
    let mut min = Vec::with_capacity(order.len());
    let mut max = Vec::with_capacity(order.len());
    let mut counts = Vec::with_capacity(order.len());
    for &era in &order {
        let rows = &members[era];
        counts.push(rows.len());
        let mut mean_row = Vec::with_capacity(columns.len());
        let mut min_row = Vec::with_capacity(columns.len());
        let mut max_row = Vec::with_capacity(columns.len());
        for (_, values) in table.columns() {
            let samples: Vec<f64> = rows.iter().map(|&r| values[r]).collect();
            let finite = |v: f64| if v.is_nan() { None } else { Some(v) };
            mean_row.push(finite(stats::mean(&samples)));
            min_row.push(finite(stats::min(&samples)));
            max_row.push(finite(stats::max(&samples)));
        }
        mean.push(mean_row);
        min.push(min_row);
        max.push(max_row);
    }

    let labels: Vec<String> = label_order.iter().map(|l| l.to_string()).collect();
    let make = |values| EraTable {
        labels: labels.clone(),
        columns: columns.clone(),
        values,
    };
    Ok(EraStats {
        mean: make(mean),
        min: make(min),
        max: make(max),
        counts,
    })
}
