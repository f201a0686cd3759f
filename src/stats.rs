//! Small numeric helpers used by the reducers and the figure tables.
//!
//! All reductions skip NaN so that masked cells never leak into a summary.
//! An input with no finite values reduces to NaN.

pub fn mean(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut n = 0usize;
    for &v in values {
        if v.is_nan() {
            continue;
        }
        sum += v;
        n += 1;
    }
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

pub fn min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { acc.min(v) })
}

pub fn max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { acc.max(v) })
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Percentile in `[0, 100]` with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let sorted = sorted_finite(values);
    percentile_sorted(&sorted, pct)
}

fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pct = pct.clamp(0.0, 100.0);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Centered moving average with zero padding; output has the input's length.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window == 0 || n == 0 {
        return values.to_vec();
    }
    let w = window as f64;
    // Same alignment as a full convolution trimmed to the input length.
    let offset = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let centre = i + offset;
            let start = centre.saturating_sub(window - 1);
            let end = centre.min(n - 1);
            let mut sum = 0.0;
            for &v in &values[start..=end] {
                sum += v;
            }
            sum / w
        })
        .collect()
}

/// log10 of each value, NaN where the value is below `floor` or not positive.
pub fn log10_masked(values: &[f64], floor: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| {
            if v.is_finite() && v > 0.0 && v >= floor {
                v.log10()
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Fraction of finite values strictly above `threshold`.
pub fn exceedance_fraction(values: &[f64], threshold: f64) -> f64 {
    let mut n = 0usize;
    let mut above = 0usize;
    for &v in values {
        if v.is_nan() {
            continue;
        }
        n += 1;
        if v > threshold {
            above += 1;
        }
    }
    if n == 0 { 0.0 } else { above as f64 / n as f64 }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxStats {
    pub whisker_lo: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_hi: f64,
    pub count: usize,
}

impl BoxStats {
    /// Quartiles plus whiskers at the given percentiles, e.g. `(1.0, 95.0)`.
    pub fn from_values(values: &[f64], whiskers: (f64, f64)) -> Self {
        let sorted = sorted_finite(values);
        Self {
            whisker_lo: percentile_sorted(&sorted, whiskers.0),
            q1: percentile_sorted(&sorted, 25.0),
            median: percentile_sorted(&sorted, 50.0),
            q3: percentile_sorted(&sorted, 75.0),
            whisker_hi: percentile_sorted(&sorted, whiskers.1),
            count: sorted.len(),
        }
    }
}

/// Counts in equal-width bins. `edges` has one more entry than `counts`;
/// the last bin is closed on the right.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Sturges bin count, `ceil(log2(n)) + 1`.
    pub fn sturges_bins(n: usize) -> usize {
        if n == 0 {
            0
        } else {
            (n as f64).log2().ceil() as usize + 1
        }
    }

    /// Histogram of the finite values over their own range.
    pub fn with_bins(values: &[f64], nbins: usize) -> Self {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() || nbins == 0 {
            return Self::default();
        }
        let (mut lo, mut hi) = (min(&finite), max(&finite));
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / nbins as f64;
        let mut counts = vec![0; nbins];
        for v in finite {
            let bin = ((v - lo) / width) as usize;
            counts[bin.min(nbins - 1)] += 1;
        }
        Self {
            edges: (0..=nbins).map(|i| lo + width * i as f64).collect(),
            counts,
        }
    }

    /// Sturges histogram with bins equally spaced in log10. Edges are
    /// returned in linear units; non-positive values are skipped.
    pub fn sturges_log10(values: &[f64]) -> Self {
        let logs: Vec<f64> = values
            .iter()
            .filter(|v| **v > 0.0 && v.is_finite())
            .map(|v| v.log10())
            .collect();
        let mut hist = Self::with_bins(&logs, Self::sturges_bins(logs.len()));
        for edge in &mut hist.edges {
            *edge = 10f64.powf(*edge);
        }
        hist
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Reduction applied across an axis.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Statistic {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    /// Percentile in `[0, 100]`.
    Percentile(f64),
}

impl Statistic {
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Statistic::Mean => mean(values),
            Statistic::Median => median(values),
            Statistic::Min => min(values),
            Statistic::Max => max(values),
            Statistic::Percentile(p) => percentile(values, p),
        }
    }

    pub fn label(self) -> String {
        match self {
            Statistic::Mean => "mean".to_string(),
            Statistic::Median => "median".to_string(),
            Statistic::Min => "min".to_string(),
            Statistic::Max => "max".to_string(),
            Statistic::Percentile(p) => format!("p{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{a} vs {b}");
    }

    #[test]
    fn reductions_skip_nan() {
        let v = [1.0, f64::NAN, 3.0];
        assert_close(mean(&v), 2.0);
        assert_close(min(&v), 1.0);
        assert_close(max(&v), 3.0);
        assert!(mean(&[f64::NAN]).is_nan());
        assert!(max(&[]).is_nan());
    }

    #[test]
    fn sturges_histogram_counts_every_value() {
        assert_eq!(Histogram::sturges_bins(0), 0);
        assert_eq!(Histogram::sturges_bins(1), 1);
        assert_eq!(Histogram::sturges_bins(8), 4);
        assert_eq!(Histogram::sturges_bins(9), 5);

        let h = Histogram::with_bins(&[0.0, 1.0, 2.0, 3.0, 4.0, f64::NAN], 2);
        assert_eq!(h.counts, vec![2, 3]);
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0]);

        let h = Histogram::sturges_log10(&[0.1, 1.0, 10.0, 100.0, 0.0, -1.0]);
        assert_eq!(h.total(), 4);
        assert_eq!(h.counts.len(), 3);
        assert_close(h.edges[0], 0.1);
        assert_close(*h.edges.last().unwrap(), 100.0);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_close(percentile(&v, 0.0), 1.0);
        assert_close(percentile(&v, 100.0), 4.0);
        assert_close(percentile(&v, 50.0), 2.5);
        assert_close(percentile(&v, 25.0), 1.75);
        assert_close(median(&[5.0]), 5.0);
    }

    #[test]
    fn moving_average_matches_same_mode_convolution() {
        // np.convolve([1, 2, 3, 4, 5], ones(3), 'same') / 3
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        let expected = [1.0, 2.0, 3.0, 4.0, 3.0];
        for (a, b) in out.iter().zip(expected) {
            assert_close(*a, b);
        }
        // Even window: np.convolve([1, 2, 3, 4], ones(2), 'same') / 2
        let out = moving_average(&[1.0, 2.0, 3.0, 4.0], 2);
        let expected = [0.5, 1.5, 2.5, 3.5];
        for (a, b) in out.iter().zip(expected) {
            assert_close(*a, b);
        }
    }

    #[test]
    fn log10_masks_values_below_floor() {
        let out = log10_masked(&[0.0, 0.5, 1.0, 100.0, -3.0], 1.0);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_close(out[2], 0.0);
        assert_close(out[3], 2.0);
        assert!(out[4].is_nan());
    }

    #[test]
    fn box_stats_are_ordered() {
        let values: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let stats = BoxStats::from_values(&values, (1.0, 95.0));
        assert_close(stats.whisker_lo, 1.0);
        assert_close(stats.q1, 25.0);
        assert_close(stats.median, 50.0);
        assert_close(stats.q3, 75.0);
        assert_close(stats.whisker_hi, 95.0);
        assert_eq!(stats.count, 101);
    }

    #[test]
    fn exceedance_counts_strictly_above() {
        assert_close(exceedance_fraction(&[0.1, 0.3, 0.5, f64::NAN], 0.3), 1.0 / 3.0);
        assert_close(exceedance_fraction(&[], 1.0), 0.0);
    }
}
