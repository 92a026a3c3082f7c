use odkdash_core::analytics::{
    bar_counts, box_stats, daily_submissions, histogram, pie_slices, scatter_points, violin,
    BoxStats, ChartKind,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType,
        Paragraph, Row, Table,
    },
    Frame,
};

use crate::app::App;
use crate::ui::styles;
use crate::utils::{box_line, density_strip, format_number, share_bar, truncate_string};

/// Width of category labels to the left of bars and box plots
const LABEL_WIDTH: usize = 16;

/// Render the Charts tab - chart picker, axis selection and the chart itself
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(6)])
        .split(area);

    render_picker(frame, app, chunks[0]);

    let body = chunks[1];
    match app.chart_kind {
        ChartKind::Bar => render_bar(frame, app, body),
        ChartKind::Line => render_line(frame, app, body),
        ChartKind::Pie => render_pie(frame, app, body),
        ChartKind::Histogram => render_histogram(frame, app, body),
        ChartKind::Scatter => render_scatter(frame, app, body),
        ChartKind::Box => render_box(frame, app, body),
        ChartKind::Violin => render_violin(frame, app, body),
        ChartKind::Heatmap => render_heatmap(frame, app, body),
    }
}

fn render_picker(frame: &mut Frame, app: &App, area: Rect) {
    let mut kinds = vec![Span::raw(" ")];
    for (i, kind) in ChartKind::ALL.iter().enumerate() {
        if i > 0 {
            kinds.push(Span::styled(" · ", styles::muted_style()));
        }
        kinds.push(Span::styled(
            kind.title(),
            styles::tab_style(*kind == app.chart_kind),
        ));
    }

    let mut axes = vec![Span::raw(" ")];
    if app.chart_kind.uses_x() {
        axes.push(Span::styled("[ ] x: ", styles::muted_style()));
        axes.push(Span::styled(
            app.selected_x().unwrap_or("-").to_string(),
            styles::highlight_style(),
        ));
    }
    if app.chart_kind.uses_y() {
        let label = if app.chart_kind == ChartKind::Violin { "group" } else { "y" };
        axes.push(Span::styled(format!("   {{ }} {}: ", label), styles::muted_style()));
        axes.push(Span::styled(
            app.selected_y().unwrap_or("none").to_string(),
            styles::highlight_style(),
        ));
    }
    if !app.chart_kind.uses_x() && !app.chart_kind.uses_y() {
        axes.push(Span::styled("←/→ to change chart", styles::muted_style()));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(
        Paragraph::new(vec![Line::from(kinds), Line::from(axes)]).block(block),
        area,
    );
}

fn chart_block(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false))
}

fn render_message(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("  {}", message), styles::muted_style())),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(chart_block(format!(" {} ", title))),
        area,
    );
}

/// `n` evenly spaced axis labels from `lo` to `hi`.
fn axis_labels(lo: f64, hi: f64, n: usize) -> Vec<Span<'static>> {
    let steps = n.max(2) - 1;
    (0..=steps)
        .map(|i| {
            let v = lo + (hi - lo) * i as f64 / steps as f64;
            Span::styled(format_number(v), styles::muted_style())
        })
        .collect()
}

/// Bounds padded so a constant series is still visible.
fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        [0.0, 1.0]
    } else if lo == hi {
        [lo - 1.0, hi + 1.0]
    } else {
        [lo, hi]
    }
}

fn render_bar(frame: &mut Frame, app: &App, area: Rect) {
    let Some(column) = app.selected_x().and_then(|x| app.view().column(x)) else {
        render_message(frame, area, "Bar", "No numeric columns to chart");
        return;
    };

    let rows = area.height.saturating_sub(2) as usize;
    let counts = bar_counts(column);
    let bars: Vec<Bar> = counts
        .iter()
        .take(rows)
        .map(|(label, count)| {
            Bar::default()
                .value(*count as u64)
                .label(Line::from(truncate_string(label, LABEL_WIDTH)))
                .text_value(count.to_string())
                .style(Style::default().fg(styles::series_color(0)))
        })
        .collect();

    let title = if counts.len() > rows {
        format!(" {} - top {} of {} values ", column.name, rows, counts.len())
    } else {
        format!(" {} - value counts ", column.name)
    };

    let chart = BarChart::default()
        .block(chart_block(title))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_line(frame: &mut Frame, app: &App, area: Rect) {
    let days = daily_submissions(app.view());
    if days.is_empty() {
        render_message(frame, area, "Line", "No submission_date column with dates");
        return;
    }

    let points: Vec<(f64, f64)> = days
        .iter()
        .enumerate()
        .map(|(i, (_, count))| (i as f64, *count as f64))
        .collect();
    let max = days.iter().map(|(_, c)| *c).max().unwrap_or(0) as f64;
    let last = (days.len() - 1) as f64;
    let (first_day, last_day) = (days[0].0, days[days.len() - 1].0);

    let dataset = Dataset::default()
        .name("submissions")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(styles::series_color(0)))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(chart_block(" Submissions per day ".to_string()))
        .x_axis(
            Axis::default()
                .style(styles::muted_style())
                .bounds([0.0, last.max(1.0)])
                .labels(vec![
                    Span::styled(first_day.format("%Y-%m-%d").to_string(), styles::muted_style()),
                    Span::styled(last_day.format("%Y-%m-%d").to_string(), styles::muted_style()),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(styles::muted_style())
                .bounds([0.0, max.max(1.0)])
                .labels(axis_labels(0.0, max.max(1.0), 3)),
        );
    frame.render_widget(chart, area);
}

fn render_pie(frame: &mut Frame, app: &App, area: Rect) {
    let Some(column) = app.selected_x().and_then(|x| app.view().column(x)) else {
        render_message(frame, area, "Pie", "No categorical columns to chart");
        return;
    };

    let bar_width = (area.width as usize).saturating_sub(LABEL_WIDTH + 20);
    let lines: Vec<Line> = pie_slices(column)
        .iter()
        .take(area.height.saturating_sub(2) as usize)
        .enumerate()
        .map(|(i, slice)| {
            Line::from(vec![
                Span::styled(
                    format!(" {:<w$} ", truncate_string(&slice.label, LABEL_WIDTH), w = LABEL_WIDTH),
                    styles::list_item_style(),
                ),
                Span::styled(
                    format!("{:>5.1}% ", slice.share * 100.0),
                    styles::highlight_style(),
                ),
                Span::styled(format!("{:>5} ", slice.count), styles::muted_style()),
                Span::styled(
                    share_bar(slice.share, bar_width),
                    Style::default().fg(styles::series_color(i)),
                ),
            ])
        })
        .collect();

    frame.render_widget(
        Paragraph::new(lines).block(chart_block(format!(" {} - share ", column.name))),
        area,
    );
}

fn render_histogram(frame: &mut Frame, app: &App, area: Rect) {
    let Some(x) = app.selected_x() else {
        render_message(frame, area, "Histogram", "No numeric columns to chart");
        return;
    };
    let y = app.selected_y();
    let bins = histogram(app.view(), x, y, None);
    if bins.is_empty() {
        render_message(frame, area, "Histogram", "No values to bin");
        return;
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let bar_width = (inner_width / bins.len()).saturating_sub(1).clamp(1, 12) as u16;

    let bars: Vec<Bar> = bins
        .iter()
        .map(|b| {
            Bar::default()
                // Negative sums draw as empty bars
                .value(b.value.max(0.0).round() as u64)
                .label(Line::from(format_number(b.lower)))
                .text_value(format_number(b.value))
                .style(Style::default().fg(styles::series_color(0)))
        })
        .collect();

    let title = match y {
        Some(y) => format!(" sum of {} by {} ", y, x),
        None => format!(" {} - count per bin ", x),
    };

    let chart = BarChart::default()
        .block(chart_block(title))
        .bar_width(bar_width)
        .bar_gap(1)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_scatter(frame: &mut Frame, app: &App, area: Rect) {
    let (Some(x), Some(y)) = (app.selected_x(), app.selected_y()) else {
        render_message(frame, area, "Scatter", "Needs numeric columns for x and y");
        return;
    };
    let points = scatter_points(app.view(), x, y);
    if points.is_empty() {
        render_message(frame, area, "Scatter", "No rows with both values");
        return;
    }

    let x_bounds = padded_bounds(points.iter().map(|p| p.0));
    let y_bounds = padded_bounds(points.iter().map(|p| p.1));

    let dataset = Dataset::default()
        .name(format!("{} rows", points.len()))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Scatter)
        .style(Style::default().fg(styles::series_color(1)))
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(chart_block(format!(" {} vs {} ", y, x)))
        .x_axis(
            Axis::default()
                .title(x.to_string())
                .style(styles::muted_style())
                .bounds(x_bounds)
                .labels(axis_labels(x_bounds[0], x_bounds[1], 3)),
        )
        .y_axis(
            Axis::default()
                .title(y.to_string())
                .style(styles::muted_style())
                .bounds(y_bounds)
                .labels(axis_labels(y_bounds[0], y_bounds[1], 3)),
        );
    frame.render_widget(chart, area);
}

fn stats_line(stats: &BoxStats) -> Line<'static> {
    let field = |k: &'static str, v: f64| {
        vec![
            Span::styled(format!("{} ", k), styles::muted_style()),
            Span::styled(format!("{}  ", format_number(v)), styles::list_item_style()),
        ]
    };
    let mut spans = vec![Span::raw(" ")];
    spans.extend(field("min", stats.min));
    spans.extend(field("q1", stats.q1));
    spans.extend(field("median", stats.median));
    spans.extend(field("q3", stats.q3));
    spans.extend(field("max", stats.max));
    spans.extend(field("mean", stats.mean));
    spans.push(Span::styled(
        format!("outliers {}", stats.outliers.len()),
        styles::muted_style(),
    ));
    Line::from(spans)
}

fn render_box(frame: &mut Frame, app: &App, area: Rect) {
    let Some(column) = app.selected_x().and_then(|x| app.view().column(x)) else {
        render_message(frame, area, "Box", "No numeric columns to chart");
        return;
    };
    let Some(stats) = box_stats(&column.numbers()) else {
        render_message(frame, area, "Box", "Column has no values");
        return;
    };

    let width = (area.width as usize).saturating_sub(4);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!(" {}", box_line(&stats, stats.min, stats.max, width)),
            Style::default().fg(styles::series_color(0)),
        )),
        Line::from(vec![
            Span::styled(format!(" {}", format_number(stats.min)), styles::muted_style()),
            Span::raw(" ".repeat(width.saturating_sub(
                format_number(stats.min).len() + format_number(stats.max).len(),
            ))),
            Span::styled(format_number(stats.max), styles::muted_style()),
        ]),
        Line::from(""),
        stats_line(&stats),
    ];

    frame.render_widget(
        Paragraph::new(lines).block(chart_block(format!(" {} ({} values) ", column.name, stats.count))),
        area,
    );
}

fn render_violin(frame: &mut Frame, app: &App, area: Rect) {
    let Some(x) = app.selected_x() else {
        render_message(frame, area, "Violin", "No numeric columns to chart");
        return;
    };
    let groups = violin(app.view(), x, app.selected_y());
    if groups.is_empty() {
        render_message(frame, area, "Violin", "Column has no values");
        return;
    }

    // Shared axis across groups
    let lo = groups.iter().map(|g| g.stats.min).fold(f64::INFINITY, f64::min);
    let hi = groups.iter().map(|g| g.stats.max).fold(f64::NEG_INFINITY, f64::max);
    let width = (area.width as usize).saturating_sub(LABEL_WIDTH + 6);

    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let color = Style::default().fg(styles::series_color(i));
        let label = format!(" {:<w$} ", truncate_string(&group.label, LABEL_WIDTH), w = LABEL_WIDTH);
        lines.push(Line::from(vec![
            Span::styled(label, styles::list_item_style()),
            Span::styled(density_strip(&group.density), color),
            Span::styled(format!("  n={}", group.stats.count), styles::muted_style()),
        ]));
        lines.push(Line::from(vec![
            Span::raw(" ".repeat(LABEL_WIDTH + 2)),
            Span::styled(box_line(&group.stats, lo, hi, width), color),
        ]));
    }
    lines.push(Line::from(vec![
        Span::raw(" ".repeat(LABEL_WIDTH + 2)),
        Span::styled(
            format!("{} .. {}", format_number(lo), format_number(hi)),
            styles::muted_style(),
        ),
    ]));

    let title = match app.selected_y() {
        Some(g) => format!(" {} by {} ", x, g),
        None => format!(" {} ", x),
    };
    frame.render_widget(Paragraph::new(lines).block(chart_block(title)), area);
}

fn render_heatmap(frame: &mut Frame, app: &App, area: Rect) {
    let matrix = app.correlation();
    if matrix.columns.len() < 2 {
        render_message(frame, area, "Heatmap", "Needs at least two numeric columns");
        return;
    }

    let cell_width = 8;
    let header = Row::new(
        std::iter::once(Cell::from(""))
            .chain(matrix.columns.iter().map(|c| Cell::from(truncate_string(c, cell_width)))),
    )
    .style(styles::title_style());

    let rows: Vec<Row> = matrix
        .columns
        .iter()
        .zip(&matrix.values)
        .map(|(name, values)| {
            let cells = std::iter::once(
                Cell::from(truncate_string(name, LABEL_WIDTH)).style(styles::title_style()),
            )
            .chain(values.iter().map(|r| {
                let text = r.map(|r| format!("{:>6.2}", r)).unwrap_or_else(|| "     -".to_string());
                Cell::from(text).style(styles::correlation_style(*r))
            }));
            Row::new(cells)
        })
        .collect();

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(LABEL_WIDTH as u16))
        .chain(matrix.columns.iter().map(|_| Constraint::Length(cell_width as u16)))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(chart_block(" Correlation (Pearson r) ".to_string()));
    frame.render_widget(table, area);
}
