//! Keyboard input handling for the TUI.
//!
//! Translates key events into application state changes.

use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{App, AppState, Tab, PAGE_SCROLL_SIZE};

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return false;
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return true;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('u') => app.request_load(true),
        KeyCode::Char('1') => app.current_tab = Tab::Data,
        KeyCode::Char('2') => app.current_tab = Tab::Summary,
        KeyCode::Char('3') => app.current_tab = Tab::Charts,
        KeyCode::Tab => app.current_tab = app.current_tab.next(),
        KeyCode::BackTab => app.current_tab = app.current_tab.prev(),
        _ => match app.current_tab {
            Tab::Data => handle_data_input(app, key),
            Tab::Summary => handle_summary_input(app, key),
            Tab::Charts => handle_charts_input(app, key),
        },
    }
    false
}

fn handle_data_input(app: &mut App, key: KeyEvent) {
    let last = app.table.row_count().saturating_sub(1);
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => {
            app.data_selection = app.data_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            app.data_selection = (app.data_selection + 1).min(last);
        }
        KeyCode::PageUp => {
            app.data_selection = app.data_selection.saturating_sub(PAGE_SCROLL_SIZE);
        }
        KeyCode::PageDown => {
            app.data_selection = (app.data_selection + PAGE_SCROLL_SIZE).min(last);
        }
        KeyCode::Home => app.data_selection = 0,
        KeyCode::End => app.data_selection = last,
        _ => {}
    }
}

fn handle_summary_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_column_cursor(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_column_cursor(true),
        KeyCode::Char(' ') => app.toggle_column(),
        _ => {}
    }
}

fn handle_charts_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Right | KeyCode::Char('l') => app.set_chart_kind(app.chart_kind.next()),
        KeyCode::Left | KeyCode::Char('h') => app.set_chart_kind(app.chart_kind.prev()),
        KeyCode::Char(']') => app.cycle_x(true),
        KeyCode::Char('[') => app.cycle_x(false),
        KeyCode::Char('}') => app.cycle_y(true),
        KeyCode::Char('{') => app.cycle_y(false),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crossterm::event::KeyModifiers;
    use odkdash_core::analytics::ChartKind;
    use odkdash_core::{LoadOutcome, Table};
    use std::sync::Arc;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> App {
        let mut app = App::new(None, Duration::minutes(30));
        let csv = "a,b,c\n1,2,x\n3,4,y\n5,6,z\n";
        app.apply_outcome(LoadOutcome {
            table: Arc::new(Table::from_csv_bytes(csv.as_bytes()).unwrap()),
            fetch_error: None,
            from_cache: false,
            cached_at: Utc::now(),
        });
        app
    }

    #[test]
    fn test_quit_requires_confirmation() {
        let mut app = app();
        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))));
        assert_eq!(app.state, AppState::ConfirmingQuit);

        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))));
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q')));
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn test_help_overlay_swallows_keys() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('?')));
        assert_eq!(app.state, AppState::ShowingHelp);

        handle_input(&mut app, key(KeyCode::Char('3')));
        assert_eq!(app.current_tab, Tab::Data);

        handle_input(&mut app, key(KeyCode::Esc));
        assert_eq!(app.state, AppState::Normal);
    }

    #[test]
    fn test_number_keys_switch_tabs() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('3')));
        assert_eq!(app.current_tab, Tab::Charts);
        handle_input(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.current_tab, Tab::Summary);
        handle_input(&mut app, key(KeyCode::Tab));
        assert_eq!(app.current_tab, Tab::Charts);
    }

    #[test]
    fn test_data_scrolling_is_clamped() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::PageDown));
        assert_eq!(app.data_selection, 2);
        handle_input(&mut app, key(KeyCode::Up));
        assert_eq!(app.data_selection, 1);
        handle_input(&mut app, key(KeyCode::Home));
        handle_input(&mut app, key(KeyCode::Up));
        assert_eq!(app.data_selection, 0);
    }

    #[test]
    fn test_space_toggles_column_on_summary_tab() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('2')));
        handle_input(&mut app, key(KeyCode::Down));
        handle_input(&mut app, key(KeyCode::Char(' ')));
        assert_eq!(app.visible_columns, vec!["a", "c"]);
    }

    #[test]
    fn test_arrows_cycle_chart_kind() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('3')));
        handle_input(&mut app, key(KeyCode::Right));
        assert_eq!(app.chart_kind, ChartKind::Line);
        handle_input(&mut app, key(KeyCode::Left));
        handle_input(&mut app, key(KeyCode::Left));
        assert_eq!(app.chart_kind, ChartKind::Heatmap);
    }

    #[test]
    fn test_brackets_cycle_chart_columns() {
        let mut app = app();
        handle_input(&mut app, key(KeyCode::Char('3')));
        assert_eq!(app.selected_x(), Some("a"));
        handle_input(&mut app, key(KeyCode::Char(']')));
        assert_eq!(app.selected_x(), Some("b"));

        app.set_chart_kind(ChartKind::Scatter);
        handle_input(&mut app, key(KeyCode::Char('}')));
        assert_eq!(app.selected_y(), Some("a"));
    }
}
