//! Summary statistics and chart series over a submissions table.

pub mod charts;
pub mod summary;

pub use charts::{
    BoxStats, Bin, ChartKind, CorrelationMatrix, PieSlice, ViolinGroup, bar_counts, box_stats,
    correlation_matrix, daily_submissions, histogram, pie_slices, scatter_points, violin,
};
pub use summary::{ColumnSummary, DescribeRow, Overview, describe, overview, summarize, value_counts};
