//! odkdash - ODK Central submissions in the terminal.
//!
//! With no arguments this opens the dashboard. `--watch` runs the unattended
//! fetch loop instead, and `--fetch-once` downloads a single export.

mod app;
mod ui;
mod utils;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use odkdash_core::auth::{CredentialStore, FileTokenStore, MemoryTokenStore, TokenStore};
use odkdash_core::cache::DEFAULT_TTL_MINUTES;
use odkdash_core::config::{self, ENV_EMAIL};
use odkdash_core::scheduler::DEFAULT_PERIOD;
use odkdash_core::{Config, Scheduler, Services, SystemClock, Table};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file inside the data directory while the dashboard owns the terminal
const LOG_FILE_NAME: &str = "odkdash.log";

const USAGE: &str = "\
Usage: odkdash [OPTION]

With no option, open the dashboard.

Options:
  --watch            Fetch submissions every ODKDASH_REFRESH_MINUTES until Ctrl+C
  --fetch-once       Fetch submissions once and exit
  --store-password   Save the ODK Central password in the OS keychain
  --logout           Remove the saved session token
  -h, --help         Show this help

Configuration comes from the environment or a .env file:
  ODK_DOMAIN, ODK_EMAIL, ODK_PASSWORD, PROJECT_ID, FORM_ID
  ODKDASH_DATA_DIR, ODKDASH_REFRESH_MINUTES, ODKDASH_CACHE_TTL_MINUTES,
  ODKDASH_TOKEN_LIFETIME_SECS";

/// Initialize the tracing subscriber for logging.
///
/// With a log directory, output goes to a file there (the dashboard owns
/// stdout/stderr). Otherwise it goes to stderr.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if log_dir.is_some() { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{default_level},odkdash=info,odkdash_core=info")));

    let log_dir = log_dir.filter(|dir| std::fs::create_dir_all(dir).is_ok());
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => run_dashboard().await,
        Some("--watch") => {
            let _guard = init_tracing(None);
            run_watch().await
        }
        Some("--fetch-once") => {
            let _guard = init_tracing(None);
            run_fetch_once().await
        }
        Some("--store-password") => store_password(),
        Some("--logout") => logout(),
        Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => bail!("unknown option '{}'\n\n{}", other, USAGE),
    }
}

// ============================================================================
// Dashboard
// ============================================================================

async fn run_dashboard() -> Result<()> {
    let _guard = init_tracing(Some(&config::data_dir_from_env()));
    info!("odkdash dashboard starting");

    let mut app = build_app();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.request_load(false);

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("odkdash dashboard shutting down");
    Ok(())
}

/// A dashboard wired to the configured server, or an empty one that says
/// what is missing.
fn build_app() -> App {
    let default_ttl = chrono::Duration::minutes(DEFAULT_TTL_MINUTES);
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Starting without a server");
            let mut app = App::new(None, default_ttl);
            app.status_message = Some(e.to_string());
            app.status_is_error = true;
            return app;
        }
    };

    match Services::from_config(&config) {
        Ok(services) => {
            let mut app = App::new(Some(services.loader), config.cache_ttl);
            app.source_label = Some(format!(
                "project {} / {}",
                config.project_id, config.form_id
            ));
            app
        }
        Err(e) => {
            error!(error = %e, "Could not set up the ODK client");
            let mut app = App::new(None, config.cache_ttl);
            app.status_message = Some(e.to_string());
            app.status_is_error = true;
            app
        }
    }
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background loads
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// Background modes
// ============================================================================

async fn run_watch() -> Result<()> {
    let config = Config::from_env()?;
    // The watcher keeps its token in memory and never touches the dashboard's token file
    let services = Services::with_store(
        &config,
        Arc::new(MemoryTokenStore::new()),
        Arc::new(SystemClock),
    )?;

    let period = config.refresh_interval.to_std().unwrap_or(DEFAULT_PERIOD);
    let scheduler = Scheduler::new(period);
    let fetcher = services.fetcher.clone();
    info!(
        project = %config.project_id,
        form = %config.form_id,
        path = ?fetcher.artifact_path(),
        "Watching for submissions"
    );

    let stats = scheduler
        .run(
            move || {
                let fetcher = fetcher.clone();
                async move { fetcher.fetch_configured().await }
            },
            shutdown_signal(),
        )
        .await;

    println!(
        "Stopped after {} fetches ({} failed)",
        stats.runs, stats.failures
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn run_fetch_once() -> Result<()> {
    let config = Config::from_env()?;
    let services = Services::from_config(&config)?;

    let path = services
        .fetcher
        .fetch_configured()
        .await
        .context("fetch failed")?;
    let table = Table::from_path(&path)?;

    println!("{}", path.display());
    println!(
        "{} submissions, {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(())
}

// ============================================================================
// Credential commands
// ============================================================================

fn store_password() -> Result<()> {
    let email = match std::env::var(ENV_EMAIL) {
        Ok(email) if !email.trim().is_empty() => email.trim().to_string(),
        _ => prompt("ODK Central email: ")?,
    };
    if email.is_empty() {
        bail!("an email address is required");
    }

    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
    if password.is_empty() {
        bail!("empty password, nothing stored");
    }

    CredentialStore::store(&email, &password)?;
    println!("Password for {} saved to the keychain", email);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn logout() -> Result<()> {
    let store = FileTokenStore::new(config::token_path(&config::data_dir_from_env()));
    store.clear()?;
    println!("Removed {}", store.path().display());
    Ok(())
}
