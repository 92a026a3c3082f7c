//! Series behind each dashboard chart.
//!
//! Everything here is pure: a table (or column) in, plain numbers out. The
//! TUI decides how to draw them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::summary::{mean, quantile_sorted, submission_dates, value_counts};
use crate::models::{Column, Table};

/// Bins used for violin density strips.
pub const DENSITY_BINS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Histogram,
    Scatter,
    Box,
    Violin,
    Heatmap,
}

impl ChartKind {
    pub const ALL: [ChartKind; 8] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Histogram,
        ChartKind::Scatter,
        ChartKind::Box,
        ChartKind::Violin,
        ChartKind::Heatmap,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ChartKind::Bar => "Bar",
            ChartKind::Line => "Line",
            ChartKind::Pie => "Pie",
            ChartKind::Histogram => "Histogram",
            ChartKind::Scatter => "Scatter",
            ChartKind::Box => "Box",
            ChartKind::Violin => "Violin",
            ChartKind::Heatmap => "Heatmap",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|k| k == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Whether the chart reads an x column, a y column, or both.
    pub fn uses_x(&self) -> bool {
        !matches!(self, ChartKind::Line | ChartKind::Heatmap)
    }

    pub fn uses_y(&self) -> bool {
        matches!(
            self,
            ChartKind::Histogram | ChartKind::Scatter | ChartKind::Violin
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub count: usize,
    /// Fraction of all non-null values, 0.0..=1.0
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViolinGroup {
    pub label: String,
    pub stats: BoxStats,
    /// Normalised density per bin; the densest bin is 1.0
    pub density: Vec<Bin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// `values[i][j]` is the Pearson r of columns i and j, `None` when undefined
    pub values: Vec<Vec<Option<f64>>>,
}

/// Value counts of a column, most frequent first.
pub fn bar_counts(column: &Column) -> Vec<(String, usize)> {
    value_counts(column)
}

/// Submissions per calendar day, oldest first.
pub fn daily_submissions(table: &Table) -> Vec<(NaiveDate, usize)> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in submission_dates(table) {
        *per_day.entry(date).or_insert(0) += 1;
    }
    per_day.into_iter().collect()
}

pub fn pie_slices(column: &Column) -> Vec<PieSlice> {
    let counts = value_counts(column);
    let total: usize = counts.iter().map(|(_, c)| c).sum();
    counts
        .into_iter()
        .map(|(label, count)| PieSlice {
            label,
            count,
            share: if total == 0 { 0.0 } else { count as f64 / total as f64 },
        })
        .collect()
}

/// Sturges' rule, at least one bin.
pub fn default_bins(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        (n as f64).log2().ceil() as usize + 1
    }
}

/// Equal-width bins over `x`.
///
/// Without `y` each bin holds a row count. With `y` each bin holds the sum of
/// `y` over its rows; rows missing `y` are skipped.
pub fn histogram(table: &Table, x: &str, y: Option<&str>, bins: Option<usize>) -> Vec<Bin> {
    let Some(x_col) = table.column(x) else {
        return Vec::new();
    };
    let y_col = y.and_then(|name| table.column(name));
    if y.is_some() && y_col.is_none() {
        return Vec::new();
    }

    let rows: Vec<(f64, f64)> = x_col
        .values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let xv = v.as_f64()?;
            match y_col {
                Some(col) => Some((xv, col.values.get(i)?.as_f64()?)),
                None => Some((xv, 1.0)),
            }
        })
        .collect();
    if rows.is_empty() {
        return Vec::new();
    }

    let xs: Vec<f64> = rows.iter().map(|(x, _)| *x).collect();
    let count = bins.unwrap_or_else(|| default_bins(xs.len())).max(1);
    let mut out = equal_width_bins(&xs, count);
    for (xv, weight) in rows {
        let idx = bin_index(&out, xv);
        out[idx].value += weight;
    }
    out
}

fn equal_width_bins(values: &[f64], count: usize) -> Vec<Bin> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // A constant column still gets a bin of non-zero width
    let (min, max) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (max - min) / count as f64;
    (0..count)
        .map(|i| Bin {
            lower: min + width * i as f64,
            upper: if i + 1 == count { max } else { min + width * (i + 1) as f64 },
            value: 0.0,
        })
        .collect()
}

/// Bins are half-open except the last, which includes its upper edge.
fn bin_index(bins: &[Bin], v: f64) -> usize {
    let last = bins.len() - 1;
    let (min, max) = (bins[0].lower, bins[last].upper);
    if v >= max {
        return last;
    }
    let pos = ((v - min) / (max - min) * bins.len() as f64).floor();
    (pos.max(0.0) as usize).min(last)
}

/// `(x, y)` pairs from two numeric columns; rows missing either are skipped.
pub fn scatter_points(table: &Table, x: &str, y: &str) -> Vec<(f64, f64)> {
    match (table.column(x), table.column(y)) {
        (Some(xc), Some(yc)) => paired(xc, yc),
        _ => Vec::new(),
    }
}

fn paired(a: &Column, b: &Column) -> Vec<(f64, f64)> {
    a.values
        .iter()
        .zip(&b.values)
        .filter_map(|(x, y)| Some((x.as_f64()?, y.as_f64()?)))
        .collect()
}

/// Quartiles and whiskers. Whiskers reach the furthest values within
/// 1.5 × IQR of the box; anything beyond is an outlier.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let q1 = quantile_sorted(&sorted, 0.25)?;
    let median = quantile_sorted(&sorted, 0.5)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    let (low_fence, high_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

    let inside: Vec<f64> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= low_fence && *v <= high_fence)
        .collect();
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < low_fence || *v > high_fence)
        .collect();

    Some(BoxStats {
        min: *sorted.first()?,
        q1,
        median,
        q3,
        max: *sorted.last()?,
        lower_whisker: inside.first().copied().unwrap_or(q1),
        upper_whisker: inside.last().copied().unwrap_or(q3),
        outliers,
        mean: mean(&sorted)?,
        count: sorted.len(),
    })
}

/// Violin per group of `y`. With no `group` column there is a single violin
/// labelled with the column name.
pub fn violin(table: &Table, y: &str, group: Option<&str>) -> Vec<ViolinGroup> {
    let Some(y_col) = table.column(y) else {
        return Vec::new();
    };

    let groups: Vec<(String, Vec<f64>)> = match group.and_then(|g| table.column(g)) {
        Some(g_col) => {
            let mut order: Vec<String> = Vec::new();
            let mut by_label: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for (label, value) in g_col.values.iter().zip(&y_col.values) {
                if label.is_null() {
                    continue;
                }
                let Some(v) = value.as_f64() else {
                    continue;
                };
                let label = label.to_string();
                if !by_label.contains_key(&label) {
                    order.push(label.clone());
                }
                by_label.entry(label).or_default().push(v);
            }
            order
                .into_iter()
                .filter_map(|l| by_label.remove(&l).map(|v| (l, v)))
                .collect()
        }
        None => vec![(y_col.name.clone(), y_col.numbers())],
    };

    groups
        .into_iter()
        .filter_map(|(label, values)| {
            let stats = box_stats(&values)?;
            Some(ViolinGroup {
                label,
                density: density(&values, DENSITY_BINS),
                stats,
            })
        })
        .collect()
}

fn density(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut out = equal_width_bins(values, bins.max(1));
    for v in values {
        let idx = bin_index(&out, *v);
        out[idx].value += 1.0;
    }
    let peak = out.iter().map(|b| b.value).fold(0.0, f64::max);
    if peak > 0.0 {
        for bin in &mut out {
            bin.value /= peak;
        }
    }
    out
}

/// Pearson correlation between every pair of numeric columns, computed over
/// rows where both values are present.
pub fn correlation_matrix(table: &Table) -> CorrelationMatrix {
    let numeric: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| c.kind.is_numeric())
        .collect();

    let values = numeric
        .iter()
        .map(|a| numeric.iter().map(|b| pearson(&paired(a, b))).collect())
        .collect();

    CorrelationMatrix {
        columns: numeric.iter().map(|c| c.name.clone()).collect(),
        values,
    }
}

/// `None` with fewer than two pairs or when either side is constant.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
