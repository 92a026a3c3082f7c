//! Tabular model for downloaded submissions.
//!
//! - `Table`: named columns parsed from the export CSV
//! - `Column`, `ColumnType`: one column and its inferred type
//! - `Value`: a single typed cell

pub mod table;

pub use table::{Column, ColumnType, Table, Value};
