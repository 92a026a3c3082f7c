use ratatui::style::{Color, Modifier, Style};

// Color palette, built around ODK blue
pub const PRIMARY: Color = Color::Rgb(0, 158, 204);
pub const SECONDARY: Color = Color::Rgb(80, 176, 112);
pub const ACCENT: Color = Color::Rgb(232, 168, 56);
pub const ERROR: Color = Color::Rgb(214, 72, 72);
pub const MUTED: Color = Color::Rgb(120, 128, 136);
pub const HIGHLIGHT: Color = Color::Rgb(28, 52, 72);
const STATUS_BG: Color = Color::Rgb(22, 30, 40);

/// Colors for chart series, cycled in order
pub const SERIES: [Color; 6] = [PRIMARY, ACCENT, SECONDARY, ERROR, Color::Cyan, Color::Magenta];

pub fn series_color(i: usize) -> Color {
    SERIES[i % SERIES.len()]
}

// Styles
pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    Style::default().bg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    Style::default().fg(Color::White)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn highlight_style() -> Style {
    Style::default().fg(ACCENT)
}

pub fn success_style() -> Style {
    Style::default().fg(SECONDARY)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn tab_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::White)
    }
}

pub fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(PRIMARY)
    } else {
        Style::default().fg(MUTED)
    }
}

pub fn status_bar_style() -> Style {
    Style::default().bg(STATUS_BG).fg(Color::White)
}

pub fn help_key_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    Style::default().fg(Color::White)
}

/// Heatmap cell: blue for positive r, red for negative, brighter when stronger.
pub fn correlation_style(r: Option<f64>) -> Style {
    match r {
        None => muted_style(),
        Some(r) => {
            let level = (r.abs().clamp(0.0, 1.0) * 160.0) as u8 + 40;
            let bg = if r >= 0.0 {
                Color::Rgb(24, 40, level)
            } else {
                Color::Rgb(level, 32, 32)
            };
            Style::default().bg(bg).fg(Color::White)
        }
    }
}
