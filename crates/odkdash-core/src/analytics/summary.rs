use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::models::table::parse_datetime;
use crate::models::{Column, ColumnType, Table, Value};

/// Column names that hold the submission timestamp, most preferred first.
/// `SubmissionDate` is what ODK Central exports; forms often add their own.
pub const DATE_COLUMNS: [&str; 2] = ["submission_date", "SubmissionDate"];

/// Number of frequent values shown for categorical columns.
const TOP_VALUES: usize = 5;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub total_submissions: usize,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericStats {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; `None` with fewer than two values
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnType,
    pub unique: usize,
    pub most_common: Option<String>,
    pub missing: usize,
    /// Filled for non-numeric columns
    pub top_values: Vec<(String, usize)>,
    /// Filled for numeric columns with at least one value
    pub numeric: Option<NumericStats>,
}

/// One row of the numeric "describe" table.
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeRow {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn overview(table: &Table) -> Overview {
    Overview {
        total_submissions: table.row_count(),
        numeric_columns: table.numeric_columns().len(),
        categorical_columns: table.categorical_columns().len(),
        date_range: date_range(table),
    }
}

/// The submission date column, if the table has one.
pub fn date_column(table: &Table) -> Option<&Column> {
    DATE_COLUMNS.iter().find_map(|name| table.column(name))
}

/// Dates of the submission date column. Unparsable cells are skipped.
pub fn submission_dates(table: &Table) -> Vec<NaiveDate> {
    let Some(column) = date_column(table) else {
        return Vec::new();
    };
    column
        .values
        .iter()
        .filter_map(|v| match v {
            Value::DateTime(dt) => Some(*dt),
            Value::Text(s) => parse_datetime(s),
            _ => None,
        })
        .map(|dt| dt.date())
        .collect()
}

fn date_range(table: &Table) -> Option<(NaiveDate, NaiveDate)> {
    let dates = submission_dates(table);
    let min = dates.iter().min()?;
    let max = dates.iter().max()?;
    Some((*min, *max))
}

/// Distinct values with counts, most frequent first.
///
/// Ties keep the order in which the values first appear.
pub fn value_counts(column: &Column) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in column.non_null() {
        let key = value.to_string();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push(key);
        }
        *count += 1;
    }
    let mut result: Vec<(String, usize)> = order
        .into_iter()
        .map(|k| {
            let c = counts[&k];
            (k, c)
        })
        .collect();
    // sort_by is stable, so ties stay in first-seen order
    result.sort_by(|a, b| b.1.cmp(&a.1));
    result
}

/// Most frequent value; ties go to the smallest value. `counts` is the
/// column's `value_counts`.
fn mode(column: &Column, counts: &[(String, usize)]) -> Option<String> {
    let top = counts.first()?.1;
    let tied: HashSet<&str> = counts
        .iter()
        .take_while(|(_, c)| *c == top)
        .map(|(k, _)| k.as_str())
        .collect();
    if tied.len() == 1 {
        return Some(counts[0].0.clone());
    }

    // First cell for each tied key, so ties compare by value rather than text
    let mut firsts: HashMap<String, &Value> = HashMap::with_capacity(tied.len());
    for value in column.non_null() {
        let key = value.to_string();
        if tied.contains(key.as_str()) {
            firsts.entry(key).or_insert(value);
        }
    }
    firsts
        .into_values()
        .min_by(|a, b| compare_values(a, b))
        .map(|v| v.to_string())
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match (a, b) {
            (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

pub fn summarize(column: &Column) -> ColumnSummary {
    let counts = value_counts(column);
    let numeric = if column.kind.is_numeric() {
        numeric_stats(&column.numbers())
    } else {
        None
    };
    let top_values = if column.kind.is_numeric() {
        Vec::new()
    } else {
        counts.iter().take(TOP_VALUES).cloned().collect()
    };

    ColumnSummary {
        name: column.name.clone(),
        kind: column.kind,
        unique: counts.len(),
        most_common: mode(column, &counts),
        missing: column.missing(),
        top_values,
        numeric,
    }
}

pub fn numeric_stats(values: &[f64]) -> Option<NumericStats> {
    Some(NumericStats {
        mean: mean(values)?,
        median: median(values)?,
        std: std_dev(values),
    })
}

/// count/mean/std/min/quartiles/max for each numeric column with data.
pub fn describe(table: &Table) -> Vec<DescribeRow> {
    table
        .columns()
        .iter()
        .filter(|c| c.kind.is_numeric())
        .filter_map(|c| {
            let mut values = c.numbers();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            Some(DescribeRow {
                column: c.name.clone(),
                count: values.len(),
                mean: mean(&values)?,
                std: std_dev(&values),
                min: *values.first()?,
                q25: quantile_sorted(&values, 0.25)?,
                q50: quantile_sorted(&values, 0.5)?,
                q75: quantile_sorted(&values, 0.75)?,
                max: *values.last()?,
            })
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    quantile_sorted(&sorted, 0.5)
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Quantile of already-sorted values with linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
