use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::truncate_string;

/// Widest a single cell is allowed to render
const MAX_CELL_WIDTH: usize = 32;

/// Render the Data tab - submissions restricted to the visible columns
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let view = app.view();

    let header = Row::new(
        view.columns()
            .iter()
            .map(|c| Cell::from(truncate_string(&c.name, MAX_CELL_WIDTH))),
    )
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = (0..view.row_count())
        .map(|r| {
            let style = if r == app.data_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let cells = (0..view.column_count()).map(|c| {
                let text = view.cell(r, c).map(|v| v.to_string()).unwrap_or_default();
                Cell::from(truncate_string(&text, MAX_CELL_WIDTH))
            });
            Row::new(cells).style(style)
        })
        .collect();

    // Size each column to its widest cell, capped
    let widths: Vec<Constraint> = view
        .columns()
        .iter()
        .map(|c| {
            let widest = c
                .values
                .iter()
                .map(|v| v.to_string().chars().count())
                .chain(std::iter::once(c.name.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_CELL_WIDTH);
            Constraint::Length(widest as u16)
        })
        .collect();

    let hidden = app.table.column_count() - view.column_count();
    let title = if hidden > 0 {
        format!(
            " Submissions ({}) - {} columns hidden, [2] to choose ",
            view.row_count(),
            hidden
        )
    } else {
        format!(" Submissions ({}) ", view.row_count())
    };

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.data_selection));

    frame.render_stateful_widget(table, area, &mut state);
}
