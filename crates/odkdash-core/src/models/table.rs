use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::api::OdkError;

/// A single parsed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Column type inferred from the non-empty cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    DateTime,
    Text,
    /// Every cell was empty
    Empty,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Boolean)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::DateTime => "datetime",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    /// Non-null numeric values in row order.
    pub fn numbers(&self) -> Vec<f64> {
        self.values.iter().filter_map(Value::as_f64).collect()
    }

    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_null())
    }

    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// Rows × named columns, column-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Zero rows, zero columns. Means "no data yet".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from columns that all have the same length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, OdkError> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(OdkError::Parse(format!(
                "column {:?} has {} values, expected {}",
                bad.name,
                bad.values.len(),
                row_count
            )));
        }
        Ok(Self { columns, row_count })
    }

    /// Read and parse a CSV file.
    pub fn from_path(path: &Path) -> Result<Self, OdkError> {
        let bytes = std::fs::read(path)?;
        Self::from_csv_bytes(&bytes)
    }

    /// Parse CSV bytes. The first record is the header.
    ///
    /// Short records are padded with nulls; a record longer than the header
    /// is an error. Empty input gives an empty table.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self, OdkError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| OdkError::Parse(format!("bad header: {}", e)))?
            .clone();
        if headers.is_empty() || (headers.len() == 1 && headers[0].trim().is_empty()) {
            return Ok(Self::empty());
        }
        let names = column_names(&headers);
        let width = names.len();

        let mut raw: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| OdkError::Parse(e.to_string()))?;
            if record.len() > width {
                return Err(OdkError::Parse(format!(
                    "row {} has {} fields, header has {}",
                    i + 1,
                    record.len(),
                    width
                )));
            }
            for (col, cells) in raw.iter_mut().enumerate() {
                let cell = record.get(col).map(str::trim).filter(|s| !s.is_empty());
                cells.push(cell.map(str::to_string));
            }
        }

        let columns: Vec<Column> = names
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| build_column(name, cells))
            .collect();
        let table = Self::from_columns(columns)?;
        debug!(rows = table.row_count, columns = table.column_count(), "Parsed submissions table");
        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0 || self.columns.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.columns.get(column)?.values.get(row)
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn categorical_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind.is_categorical())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Project onto the named columns, in the order given. Unknown names are skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Table {
        let columns: Vec<Column> = names
            .iter()
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect();
        let row_count = if columns.is_empty() { 0 } else { self.row_count };
        Table { columns, row_count }
    }
}

/// Header names with blanks and duplicates made unique.
fn column_names(headers: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = h.trim_start_matches('\u{feff}').trim();
            let base = if h.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                h.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}

fn parse_int(s: &str) -> Option<i64> {
    s.parse().ok()
}

fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Dates as ODK writes them: RFC 3339 timestamps, or plain date / datetime.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn infer_type(cells: &[Option<String>]) -> ColumnType {
    if cells.iter().all(Option::is_none) {
        return ColumnType::Empty;
    }
    let all = |f: &dyn Fn(&str) -> bool| cells.iter().flatten().all(|s| f(s.as_str()));

    if all(&|s| parse_int(s).is_some()) {
        ColumnType::Integer
    } else if all(&|s| parse_float(s).is_some()) {
        ColumnType::Float
    } else if all(&|s| parse_bool(s).is_some()) {
        ColumnType::Boolean
    } else if all(&|s| parse_datetime(s).is_some()) {
        ColumnType::DateTime
    } else {
        ColumnType::Text
    }
}

fn build_column(name: String, cells: Vec<Option<String>>) -> Column {
    let kind = infer_type(&cells);
    let values = cells
        .into_iter()
        .map(|cell| match cell {
            None => Value::Null,
            Some(s) => match kind {
                ColumnType::Integer => parse_int(&s).map(Value::Int).unwrap_or(Value::Null),
                ColumnType::Float => parse_float(&s).map(Value::Float).unwrap_or(Value::Null),
                ColumnType::Boolean => parse_bool(&s).map(Value::Bool).unwrap_or(Value::Null),
                ColumnType::DateTime => parse_datetime(&s)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Null),
                ColumnType::Text | ColumnType::Empty => Value::Text(s),
            },
        })
        .collect();
    Column { name, kind, values }
}
