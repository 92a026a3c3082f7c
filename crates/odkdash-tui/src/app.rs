//! Application state for the dashboard.
//!
//! `App` owns the currently displayed table, the UI selections, and the
//! channel that background loads report back on. Statistics derived from the
//! column filter are computed when the table or filter changes, not per frame.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use odkdash_core::analytics::{
    correlation_matrix, describe, overview, summarize, ChartKind, ColumnSummary,
    CorrelationMatrix, DescribeRow, Overview,
};
use odkdash_core::cache::age_display;
use odkdash_core::models::Table;
use odkdash_core::{DataLoader, LoadOutcome, OdkError};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background load channel.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Columns shown by default in the Data tab.
pub const DEFAULT_VISIBLE_COLUMNS: usize = 5;

/// Number of rows to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Data,
    Summary,
    Charts,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Data => "Data",
            Tab::Summary => "Summary",
            Tab::Charts => "Charts",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Data => Tab::Summary,
            Tab::Summary => Tab::Charts,
            Tab::Charts => Tab::Data,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            Tab::Data => Tab::Charts,
            Tab::Summary => Tab::Data,
            Tab::Charts => Tab::Summary,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub state: AppState,
    pub current_tab: Tab,

    /// `None` when the configuration could not be loaded
    loader: Option<Arc<DataLoader>>,
    cache_ttl: Duration,

    pub table: Arc<Table>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub loading: bool,

    // Data tab
    pub data_selection: usize,

    // Summary tab: cursor over all columns, and the column filter
    pub column_cursor: usize,
    pub visible_columns: Vec<String>,

    // Filtered view and what is derived from it
    view: Arc<Table>,
    overview: Overview,
    describe: Vec<DescribeRow>,
    correlation: CorrelationMatrix,
    /// Summary of the column under the cursor, when it is visible
    column_summary: Option<ColumnSummary>,

    // Charts tab
    pub chart_kind: ChartKind,
    pub chart_x: usize,
    pub chart_y: usize,

    // Background task channel
    load_rx: mpsc::Receiver<LoadOutcome>,
    load_tx: mpsc::Sender<LoadOutcome>,

    pub status_message: Option<String>,
    /// The status message reports a failure
    pub status_is_error: bool,
    /// "project / form" shown in the title bar
    pub source_label: Option<String>,
}

impl App {
    pub fn new(loader: Option<Arc<DataLoader>>, cache_ttl: Duration) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let empty = Table::empty();
        Self {
            state: AppState::Normal,
            current_tab: Tab::Data,
            loader,
            cache_ttl,
            table: Arc::new(Table::empty()),
            loaded_at: None,
            loading: false,
            data_selection: 0,
            column_cursor: 0,
            visible_columns: Vec::new(),
            overview: overview(&empty),
            describe: Vec::new(),
            correlation: correlation_matrix(&empty),
            column_summary: None,
            view: Arc::new(empty),
            chart_kind: ChartKind::Bar,
            chart_x: 0,
            chart_y: 0,
            load_rx: rx,
            load_tx: tx,
            status_message: None,
            status_is_error: false,
            source_label: None,
        }
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Start a background load. `force` bypasses the freshness window.
    pub fn request_load(&mut self, force: bool) {
        let Some(loader) = self.loader.clone() else {
            if force {
                self.status_message = Some("No ODK server configured".to_string());
                self.status_is_error = true;
            }
            return;
        };
        if self.loading {
            debug!("Load already in progress");
            return;
        }

        self.loading = true;
        self.status_is_error = false;
        self.status_message = Some(if force {
            "Fetching submissions...".to_string()
        } else {
            "Loading submissions...".to_string()
        });

        let tx = self.load_tx.clone();
        tokio::spawn(async move {
            let outcome = if force {
                loader.refresh().await
            } else {
                loader.load_detailed().await
            };
            if tx.send(outcome).await.is_err() {
                debug!("Dashboard closed before load finished");
            }
        });
    }

    /// Drain finished loads, and start a new one once the table goes stale.
    pub fn check_background_tasks(&mut self) {
        while let Ok(outcome) = self.load_rx.try_recv() {
            self.apply_outcome(outcome);
        }

        if self.is_stale(Utc::now()) {
            info!("Table older than the freshness window, reloading");
            self.request_load(false);
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.loaded_at {
            Some(at) => !self.loading && self.loader.is_some() && now - at >= self.cache_ttl,
            None => false,
        }
    }

    /// Install a finished load.
    pub fn apply_outcome(&mut self, outcome: LoadOutcome) {
        self.loading = false;
        self.loaded_at = Some(outcome.cached_at);
        self.status_is_error = outcome.fetch_error.is_some();

        self.status_message = match outcome.fetch_error {
            Some(ref e) => {
                error!(error = %e, "Background load failed");
                Some(user_message(e))
            }
            None if outcome.from_cache => None,
            None => Some(format!("Loaded {} submissions", outcome.table.row_count())),
        };

        self.set_table(outcome.table);
    }

    fn set_table(&mut self, table: Arc<Table>) {
        self.table = table;

        // Keep the filter where columns survived, else fall back to the default
        let names = self.table.column_names();
        self.visible_columns.retain(|c| names.contains(&c.as_str()));
        if self.visible_columns.is_empty() {
            self.visible_columns = names
                .iter()
                .take(DEFAULT_VISIBLE_COLUMNS)
                .map(|s| s.to_string())
                .collect();
        }

        self.data_selection = self.data_selection.min(self.table.row_count().saturating_sub(1));
        self.column_cursor = self.column_cursor.min(self.table.column_count().saturating_sub(1));
        self.refresh_view();
    }

    /// Rebuild the filtered view and its statistics.
    fn refresh_view(&mut self) {
        let view = self.table.select(&self.visible_columns);
        self.overview = overview(&view);
        // Hiding every column still leaves the submissions
        self.overview.total_submissions = self.table.row_count();
        self.describe = describe(&view);
        self.correlation = correlation_matrix(&view);
        self.view = Arc::new(view);
        self.refresh_column_summary();
        self.clamp_chart_columns();
    }

    fn refresh_column_summary(&mut self) {
        self.column_summary = self
            .table
            .columns()
            .get(self.column_cursor)
            .filter(|c| self.is_visible(&c.name))
            .map(summarize);
    }

    pub fn cache_age(&self) -> Option<String> {
        self.loaded_at.map(|at| age_display(at, Utc::now()))
    }

    // ===== Column filter =====

    /// Move the Summary tab cursor one column up or down.
    pub fn move_column_cursor(&mut self, forward: bool) {
        let last = self.table.column_count().saturating_sub(1);
        let next = if forward {
            (self.column_cursor + 1).min(last)
        } else {
            self.column_cursor.saturating_sub(1)
        };
        if next != self.column_cursor {
            self.column_cursor = next;
            self.refresh_column_summary();
        }
    }

    /// Toggle the column under the cursor in the filter.
    pub fn toggle_column(&mut self) {
        let Some(column) = self.table.columns().get(self.column_cursor) else {
            return;
        };
        let name = column.name.clone();
        if let Some(pos) = self.visible_columns.iter().position(|c| *c == name) {
            self.visible_columns.remove(pos);
        } else {
            self.visible_columns.push(name);
            // Keep the table's column order
            let order = self.table.column_names();
            self.visible_columns
                .sort_by_key(|c| order.iter().position(|n| *n == c.as_str()).unwrap_or(usize::MAX));
        }
        self.refresh_view();
    }

    pub fn is_visible(&self, name: &str) -> bool {
        self.visible_columns.iter().any(|c| c == name)
    }

    /// The table restricted to the visible columns.
    pub fn view(&self) -> &Table {
        &self.view
    }

    pub fn overview(&self) -> &Overview {
        &self.overview
    }

    pub fn describe_rows(&self) -> &[DescribeRow] {
        &self.describe
    }

    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }

    pub fn column_summary(&self) -> Option<&ColumnSummary> {
        self.column_summary.as_ref()
    }

    // ===== Charts =====

    /// Columns the current chart can use on its x axis.
    pub fn x_candidates(&self) -> Vec<&str> {
        match self.chart_kind {
            ChartKind::Pie => self.view.categorical_columns(),
            ChartKind::Line | ChartKind::Heatmap => Vec::new(),
            _ => self.view.numeric_columns(),
        }
    }

    /// Choices for the y axis. `None` means "no y column".
    pub fn y_candidates(&self) -> Vec<Option<&str>> {
        match self.chart_kind {
            ChartKind::Histogram => std::iter::once(None)
                .chain(self.view.numeric_columns().into_iter().map(Some))
                .collect(),
            ChartKind::Scatter => self.view.numeric_columns().into_iter().map(Some).collect(),
            ChartKind::Violin => std::iter::once(None)
                .chain(self.view.categorical_columns().into_iter().map(Some))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn selected_x(&self) -> Option<&str> {
        self.x_candidates().get(self.chart_x).copied()
    }

    pub fn selected_y(&self) -> Option<&str> {
        self.y_candidates().get(self.chart_y).copied().flatten()
    }

    pub fn set_chart_kind(&mut self, kind: ChartKind) {
        self.chart_kind = kind;
        self.chart_x = 0;
        // Scatter reads better with two different columns
        self.chart_y = if kind == ChartKind::Scatter { 1 } else { 0 };
        self.clamp_chart_columns();
    }

    pub fn cycle_x(&mut self, forward: bool) {
        self.chart_x = cycle(self.chart_x, self.x_candidates().len(), forward);
    }

    pub fn cycle_y(&mut self, forward: bool) {
        self.chart_y = cycle(self.chart_y, self.y_candidates().len(), forward);
    }

    fn clamp_chart_columns(&mut self) {
        let xs = self.x_candidates().len();
        let ys = self.y_candidates().len();
        if self.chart_x >= xs {
            self.chart_x = 0;
        }
        if self.chart_y >= ys {
            self.chart_y = 0;
        }
    }
}

fn cycle(current: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        0
    } else if forward {
        (current + 1) % len
    } else {
        (current + len - 1) % len
    }
}

/// Status bar text for a failed fetch.
pub fn user_message(e: &OdkError) -> String {
    match e {
        OdkError::Authentication { .. } => {
            "Login to ODK Central failed. Check ODK_EMAIL / ODK_PASSWORD.".to_string()
        }
        OdkError::Fetch { status: 401, .. } => {
            "Session rejected by the server. Showing last download.".to_string()
        }
        OdkError::Fetch { status: 404, .. } => {
            "Form not found. Check PROJECT_ID / FORM_ID.".to_string()
        }
        OdkError::Transport(_) => "Network error. Showing last download.".to_string(),
        other => format!("Error: {}", other),
    }
}
