use odkdash_core::analytics::ColumnSummary;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table},
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::{format_number, format_optional, truncate_string};

/// Render the Summary tab - overview, column picker, column and numeric summaries.
/// Everything but the picker reflects the column filter.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(8)])
        .split(area);

    render_overview(frame, app, rows[0]);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(rows[1]);

    render_column_list(frame, app, cols[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(cols[1]);

    render_column_summary(frame, app, right[0]);
    render_describe(frame, app, right[1]);
}

fn render_overview(frame: &mut Frame, app: &App, area: Rect) {
    let o = app.overview();
    let range = match o.date_range {
        Some((from, to)) => format!("{} to {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d")),
        None => "N/A".to_string(),
    };

    let label = |s: &'static str| Span::styled(s, styles::muted_style());
    let value = |s: String| Span::styled(s, styles::highlight_style());

    let lines = vec![
        Line::from(vec![
            label(" Submissions: "),
            value(o.total_submissions.to_string()),
            label("   Numeric columns: "),
            value(o.numeric_columns.to_string()),
            label("   Categorical columns: "),
            value(o.categorical_columns.to_string()),
        ]),
        Line::from(vec![label(" Date range: "), value(range)]),
    ];

    let block = Block::default()
        .title(" Overview ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_column_list(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width.saturating_sub(12) as usize;
    let items: Vec<ListItem> = app
        .table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let mark = if app.is_visible(&c.name) { "[x]" } else { "[ ]" };
            let style = if i == app.column_cursor {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {} ", mark), styles::muted_style()),
                Span::styled(truncate_string(&c.name, width), style),
            ]))
        })
        .collect();

    let title = format!(
        " Columns ({}/{}) [space] ",
        app.visible_columns.len(),
        app.table.column_count()
    );
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .highlight_style(styles::selected_style());

    let mut state = ListState::default();
    state.select(Some(app.column_cursor));
    frame.render_stateful_widget(list, area, &mut state);
}

fn summary_lines(s: &ColumnSummary) -> Vec<Line<'static>> {
    let field = |k: &'static str, v: String| {
        Line::from(vec![
            Span::styled(format!("  {:<14}", k), styles::muted_style()),
            Span::styled(v, styles::list_item_style()),
        ])
    };

    let mut lines = vec![
        field("Type", s.kind.name().to_string()),
        field("Unique", s.unique.to_string()),
        field(
            "Most common",
            s.most_common.clone().unwrap_or_else(|| "N/A".to_string()),
        ),
        field("Missing", s.missing.to_string()),
    ];

    if let Some(ref n) = s.numeric {
        lines.push(field("Mean", format_number(n.mean)));
        lines.push(field("Median", format_number(n.median)));
        lines.push(field("Std dev", format_optional(n.std)));
    }

    if !s.top_values.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("  Top values", styles::highlight_style())));
        for (value, count) in &s.top_values {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:>6}  ", count), styles::success_style()),
                Span::raw(truncate_string(value, 40)),
            ]));
        }
    }
    lines
}

fn render_column_summary(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.table.columns().get(app.column_cursor);
    let (title, lines) = match (app.column_summary(), current) {
        (Some(s), _) => (format!(" {} ", truncate_string(&s.name, 40)), summary_lines(s)),
        (None, Some(column)) => (
            format!(" {} ", truncate_string(&column.name, 40)),
            vec![Line::from(Span::styled(
                "  Hidden. Press [space] to include it.",
                styles::muted_style(),
            ))],
        ),
        (None, None) => (" Column ".to_string(), vec![]),
    };

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_describe(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(
        ["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"]
            .into_iter()
            .map(Cell::from),
    )
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .describe_rows()
        .iter()
        .map(|d| {
            Row::new(vec![
                Cell::from(truncate_string(&d.column, 18)),
                Cell::from(d.count.to_string()),
                Cell::from(format_number(d.mean)),
                Cell::from(format_optional(d.std)),
                Cell::from(format_number(d.min)),
                Cell::from(format_number(d.q25)),
                Cell::from(format_number(d.q50)),
                Cell::from(format_number(d.q75)),
                Cell::from(format_number(d.max)),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Length(18),
        Constraint::Length(6),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
        Constraint::Fill(1),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(" Numeric columns ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false)),
    );
    frame.render_widget(table, area);
}
