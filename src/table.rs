//! Time-indexed tables of per-module ice contributions and loss depths.

use std::fmt;
use std::io::Write;

use crate::error::{FigureError, Result};
use crate::stats;

/// One named column of a [`TimeSeriesTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IceColumn {
    Volcanic,
    SolarWind,
    Micrometeorite,
    SmallImpactor,
    SmallSimpleCrater,
    LargeSimpleCrater,
    LargeComplexCrater,
    Basin,
    GardeningDepth,
    BallisticSedDepth,
    /// Sum of the impactor-delivered columns.
    ImpactorIce,
    /// Sum of impactor ice and the other ice sources.
    TotalIce,
}

impl IceColumn {
    /// Columns produced by the per-seed adapter, in output order.
    pub const MODULES: [IceColumn; 10] = [
        IceColumn::Volcanic,
        IceColumn::SolarWind,
        IceColumn::Micrometeorite,
        IceColumn::SmallImpactor,
        IceColumn::SmallSimpleCrater,
        IceColumn::LargeSimpleCrater,
        IceColumn::LargeComplexCrater,
        IceColumn::Basin,
        IceColumn::GardeningDepth,
        IceColumn::BallisticSedDepth,
    ];

    pub const IMPACTOR: [IceColumn; 5] = [
        IceColumn::Micrometeorite,
        IceColumn::SmallImpactor,
        IceColumn::SmallSimpleCrater,
        IceColumn::LargeSimpleCrater,
        IceColumn::LargeComplexCrater,
    ];

    pub const OTHER_ICE: [IceColumn; 3] =
        [IceColumn::Volcanic, IceColumn::SolarWind, IceColumn::Basin];

    pub const LOSS: [IceColumn; 2] = [IceColumn::GardeningDepth, IceColumn::BallisticSedDepth];

    pub fn label(self) -> &'static str {
        match self {
            IceColumn::Volcanic => "Volcanic ice",
            IceColumn::SolarWind => "Solar wind ice",
            IceColumn::Micrometeorite => "Micrometeorite ice",
            IceColumn::SmallImpactor => "Small impactor ice",
            IceColumn::SmallSimpleCrater => "Small simple crater ice",
            IceColumn::LargeSimpleCrater => "Large simple crater ice",
            IceColumn::LargeComplexCrater => "Large complex crater ice",
            IceColumn::Basin => "Basin ice",
            IceColumn::GardeningDepth => "Gardening depth",
            IceColumn::BallisticSedDepth => "Ballistic sed depth",
            IceColumn::ImpactorIce => "Impactor ice",
            IceColumn::TotalIce => "Total ice",
        }
    }

    /// Loss columns are depths, not deposited ice.
    pub fn is_loss(self) -> bool {
        Self::LOSS.contains(&self)
    }
}

impl fmt::Display for IceColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Columns sharing one time index (years before present).
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesTable {
    time: Vec<f64>,
    columns: Vec<(IceColumn, Vec<f64>)>,
}

impl TimeSeriesTable {
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            columns: Vec::new(),
        }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn column_names(&self) -> Vec<IceColumn> {
        self.columns.iter().map(|(c, _)| *c).collect()
    }

    pub fn columns(&self) -> impl Iterator<Item = (IceColumn, &[f64])> {
        self.columns.iter().map(|(c, v)| (*c, v.as_slice()))
    }

    pub fn get(&self, column: IceColumn) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v.as_slice())
    }

    pub fn require(&self, column: IceColumn) -> Result<&[f64]> {
        self.get(column)
            .ok_or_else(|| FigureError::MissingColumn(column.label().to_string()))
    }

    /// Inserts or replaces a column. The values must match the time index length.
    pub fn insert(&mut self, column: IceColumn, values: Vec<f64>) -> Result<()> {
        if values.len() != self.time.len() {
            return Err(FigureError::shape(
                format!("column `{column}`"),
                self.time.len(),
                values.len(),
            ));
        }
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = values,
            None => self.columns.push((column, values)),
        }
        Ok(())
    }

    pub fn remove(&mut self, column: IceColumn) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|(c, _)| *c == column)?;
        Some(self.columns.remove(idx).1)
    }

    /// Keeps only `order`, in that order. Every named column must exist.
    pub fn select(&self, order: &[IceColumn]) -> Result<Self> {
        let mut out = Self::new(self.time.clone());
        for &column in order {
            out.columns.push((column, self.require(column)?.to_vec()));
        }
        Ok(out)
    }

    /// Same index and columns with every value set to zero.
    pub fn zeroed(&self) -> Self {
        Self {
            time: self.time.clone(),
            columns: self
                .columns
                .iter()
                .map(|(c, v)| (*c, vec![0.0; v.len()]))
                .collect(),
        }
    }

    /// Checks that `other` has this table's exact time index and column set.
    pub fn check_aligned(&self, other: &Self, context: &str) -> Result<()> {
        if self.time.len() != other.time.len() {
            return Err(FigureError::shape(
                format!("{context}: time index length"),
                self.time.len(),
                other.time.len(),
            ));
        }
        if let Some(row) = self
            .time
            .iter()
            .zip(&other.time)
            .position(|(a, b)| a.to_bits() != b.to_bits())
        {
            return Err(FigureError::shape(
                format!("{context}: time index at row {row}"),
                self.time[row],
                other.time[row],
            ));
        }
        let mut ours = self.column_names();
        let mut theirs = other.column_names();
        ours.sort();
        theirs.sort();
        if ours != theirs {
            return Err(FigureError::shape(
                format!("{context}: column set"),
                format!("{ours:?}"),
                format!("{theirs:?}"),
            ));
        }
        Ok(())
    }

    /// Rejects NaN and infinities.
    pub fn check_finite(&self) -> Result<()> {
        for (column, values) in &self.columns {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(FigureError::NonFinite {
                    column: column.label().to_string(),
                    row,
                });
            }
        }
        Ok(())
    }

    /// Elementwise `self += other` after an alignment check.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_aligned(other, "table sum")?;
        for (column, values) in &mut self.columns {
            let rhs = other.require(*column)?;
            for (a, b) in values.iter_mut().zip(rhs) {
                *a += b;
            }
        }
        Ok(())
    }

    pub fn scale(&mut self, factor: f64) {
        for (_, values) in &mut self.columns {
            for v in values.iter_mut() {
                *v *= factor;
            }
        }
    }

    /// Adds "Impactor ice" and "Total ice" computed row by row.
    pub fn with_derived_columns(mut self) -> Result<Self> {
        let n = self.len();
        let mut impactor = vec![0.0; n];
        for column in IceColumn::IMPACTOR {
            for (acc, v) in impactor.iter_mut().zip(self.require(column)?) {
                *acc += v;
            }
        }
        let mut total = impactor.clone();
        for column in IceColumn::OTHER_ICE {
            for (acc, v) in total.iter_mut().zip(self.require(column)?) {
                *acc += v;
            }
        }
        self.insert(IceColumn::ImpactorIce, impactor)?;
        self.insert(IceColumn::TotalIce, total)?;
        Ok(self)
    }

    /// Running sum of every column in the table's row order.
    pub fn cumsum(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(c, values)| {
                let mut acc = 0.0;
                let summed = values
                    .iter()
                    .map(|v| {
                        acc += v;
                        acc
                    })
                    .collect();
                (*c, summed)
            })
            .collect();
        Self {
            time: self.time.clone(),
            columns,
        }
    }

    /// Mean of time and of every column within `nbins` equal-width time bins.
    ///
    /// Bins are right-closed with the first bin also closed on the left, so
    /// every row lands in exactly one bin. Empty bins are omitted. Rows come
    /// out in ascending time order.
    pub fn bin_by_time(&self, nbins: usize) -> Result<Self> {
        if nbins == 0 {
            return Err(FigureError::InvalidEraBins(
                "time binning needs at least one bin".to_string(),
            ));
        }
        let lo = stats::min(&self.time);
        let hi = stats::max(&self.time);
        if self.is_empty() || !lo.is_finite() || !hi.is_finite() {
            return Ok(Self {
                time: Vec::new(),
                columns: self.columns.iter().map(|(c, _)| (*c, Vec::new())).collect(),
            });
        }
        let width = (hi - lo) / nbins as f64;
        let bin_of = |t: f64| -> usize {
            if width <= 0.0 {
                return 0;
            }
            let pos = ((t - lo) / width).ceil() as isize - 1;
            pos.clamp(0, nbins as isize - 1) as usize
        };

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); nbins];
        for (row, &t) in self.time.iter().enumerate() {
            members[bin_of(t)].push(row);
        }

        let mut out = Self::new(Vec::new());
        out.columns = self.columns.iter().map(|(c, _)| (*c, Vec::new())).collect();
        for rows in members.iter().filter(|rows| !rows.is_empty()) {
            let ts: Vec<f64> = rows.iter().map(|&r| self.time[r]).collect();
            out.time.push(stats::mean(&ts));
            for ((_, src), (_, dst)) in self.columns.iter().zip(out.columns.iter_mut()) {
                let vs: Vec<f64> = rows.iter().map(|&r| src[r]).collect();
                dst.push(stats::mean(&vs));
            }
        }
        Ok(out)
    }

    /// Writes `time` followed by every column label as a CSV header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec!["time".to_string()];
        header.extend(self.columns.iter().map(|(c, _)| c.label().to_string()));
        wtr.write_record(&header)?;
        for (row, t) in self.time.iter().enumerate() {
            let mut record = vec![t.to_string()];
            record.extend(self.columns.iter().map(|(_, v)| v[row].to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
