use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::CachedData;
use crate::api::OdkError;
use crate::clock::Clock;
use crate::fetch::Fetcher;
use crate::models::Table;

/// Default freshness window for the in-memory table.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// What a load produced.
#[derive(Debug)]
pub struct LoadOutcome {
    pub table: Arc<Table>,
    /// Set when this load tried to fetch and the fetch failed
    pub fetch_error: Option<OdkError>,
    /// True when the memoized table was returned without fetching
    pub from_cache: bool,
    /// When the returned table was produced
    pub cached_at: DateTime<Utc>,
}

/// Keeps the parsed submissions table fresh for interactive use.
///
/// Within the freshness window the memoized table is returned as is. Past it,
/// the loader fetches, then parses whatever artifact is on disk. A failed
/// fetch still leaves the previous artifact readable.
pub struct DataLoader {
    fetcher: Arc<Fetcher>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    memo: Mutex<Option<CachedData<Arc<Table>>>>,
}

impl DataLoader {
    pub fn new(fetcher: Arc<Fetcher>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            ttl,
            clock,
            memo: Mutex::new(None),
        }
    }

    pub async fn load(&self) -> Arc<Table> {
        self.load_detailed().await.table
    }

    pub async fn load_detailed(&self) -> LoadOutcome {
        let mut memo = self.memo.lock().await;
        if let Some(cached) = memo.as_ref() {
            if !cached.is_stale(self.clock.now(), self.ttl) {
                debug!(age_minutes = cached.age_minutes(self.clock.now()), "Using memoized table");
                return LoadOutcome {
                    table: cached.data.clone(),
                    fetch_error: None,
                    from_cache: true,
                    cached_at: cached.cached_at,
                };
            }
        }
        self.fetch_and_memoize(&mut memo).await
    }

    /// Fetch and reparse now, ignoring the freshness window.
    pub async fn refresh(&self) -> LoadOutcome {
        let mut memo = self.memo.lock().await;
        info!("Manual refresh requested");
        self.fetch_and_memoize(&mut memo).await
    }

    /// How old the memoized table is, for display. `None` before the first load.
    pub async fn cache_age(&self) -> Option<String> {
        let memo = self.memo.lock().await;
        memo.as_ref().map(|c| c.age_display(self.clock.now()))
    }

    async fn fetch_and_memoize(&self, memo: &mut Option<CachedData<Arc<Table>>>) -> LoadOutcome {
        let fetch_error = match self.fetcher.fetch_configured().await {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Fetch failed, falling back to existing data");
                Some(e)
            }
        };

        let table = Arc::new(read_artifact(&self.fetcher.artifact_path()));
        let cached_at = self.clock.now();
        // Memoized even after a failed fetch so a broken server isn't hammered
        *memo = Some(CachedData::new(table.clone(), cached_at));

        LoadOutcome {
            table,
            fetch_error,
            from_cache: false,
            cached_at,
        }
    }
}

/// Parse the artifact, or an empty table when it is missing or unreadable.
fn read_artifact(path: &Path) -> Table {
    if !path.exists() {
        debug!(path = ?path, "No submissions file yet");
        return Table::empty();
    }
    match Table::from_path(path) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = ?path, error = %e, "Could not parse submissions file");
            Table::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OdkClient;
    use crate::auth::{Authenticator, Credentials, MemoryTokenStore, SessionManager};
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    const EXPORT_PATH: &str = "/v1/projects/7/forms/survey/submissions.csv";

    fn loader(server_url: &str, dir: &TempDir, clock: ManualClock) -> DataLoader {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        let credentials = Credentials {
            server: server_url.to_string(),
            email: "a@b.com".to_string(),
            password: "p".to_string(),
        };
        let client = OdkClient::new(server_url).unwrap();
        let authenticator =
            Authenticator::new(client.clone(), credentials, clock.clone(), Duration::hours(1));
        let session = SessionManager::new(authenticator, Arc::new(MemoryTokenStore::new()), clock.clone());
        let fetcher = Fetcher::new(
            client,
            Arc::new(session),
            dir.path().to_path_buf(),
            "7",
            "survey",
        );
        DataLoader::new(Arc::new(fetcher), Duration::minutes(DEFAULT_TTL_MINUTES), clock)
    }

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    async fn session_mock(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/v1/sessions")
            .with_body(r#"{"token":"tok"}"#)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_memoizes_within_window_and_refetches_after() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(start());
        let sessions = session_mock(&mut server).await;
        let export = server
            .mock("GET", EXPORT_PATH)
            .match_header("authorization", "Bearer tok")
            .with_body("a,b\n1,2\n3,4\n")
            .expect(2)
            .create_async()
            .await;

        let dl = loader(&server.url(), &dir, clock.clone());

        let first = dl.load_detailed().await;
        assert!(!first.from_cache);
        assert!(first.fetch_error.is_none());
        assert_eq!(first.table.row_count(), 2);

        clock.advance(Duration::minutes(10));
        let second = dl.load_detailed().await;
        assert!(second.from_cache);
        assert_eq!(second.cached_at, start());
        assert!(Arc::ptr_eq(&first.table, &second.table));

        clock.advance(Duration::minutes(21));
        let third = dl.load_detailed().await;
        assert!(!third.from_cache);
        assert_eq!(third.table.row_count(), 2);

        export.assert_async().await;
        sessions.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_fetch_without_artifact_gives_empty_table() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _sessions = session_mock(&mut server).await;
        let export = server
            .mock("GET", EXPORT_PATH)
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;

        let dl = loader(&server.url(), &dir, ManualClock::new(start()));
        let outcome = dl.load_detailed().await;
        assert!(outcome.table.is_empty());
        assert!(matches!(outcome.fetch_error, Some(OdkError::Fetch { status: 500, .. })));

        // Memoized: no second request inside the window
        let again = dl.load_detailed().await;
        assert!(again.from_cache);
        export.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_artifact_visible() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _sessions = session_mock(&mut server).await;
        let _export = server
            .mock("GET", EXPORT_PATH)
            .with_status(503)
            .create_async()
            .await;

        let dl = loader(&server.url(), &dir, ManualClock::new(start()));
        let path = dl.fetcher.artifact_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "x\n1\n2\n3\n").unwrap();

        let outcome = dl.load_detailed().await;
        assert!(outcome.fetch_error.is_some());
        assert_eq!(outcome.table.row_count(), 3);
    }

    #[tokio::test]
    async fn test_unparsable_artifact_gives_empty_table() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let _sessions = session_mock(&mut server).await;
        let _export = server
            .mock("GET", EXPORT_PATH)
            .with_body("a,b\n1,2,3\n")
            .create_async()
            .await;

        let dl = loader(&server.url(), &dir, ManualClock::new(start()));
        let outcome = dl.load_detailed().await;
        assert!(outcome.fetch_error.is_none());
        assert!(outcome.table.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_ignores_window() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new(start());
        let _sessions = session_mock(&mut server).await;
        let export = server
            .mock("GET", EXPORT_PATH)
            .with_body("a\n1\n")
            .expect(2)
            .create_async()
            .await;

        let dl = loader(&server.url(), &dir, clock.clone());
        assert_eq!(dl.cache_age().await, None);

        dl.load().await;
        assert_eq!(dl.cache_age().await.as_deref(), Some("just now"));

        clock.advance(Duration::minutes(5));
        assert_eq!(dl.cache_age().await.as_deref(), Some("5m ago"));

        let outcome = dl.refresh().await;
        assert!(!outcome.from_cache);
        assert_eq!(dl.cache_age().await.as_deref(), Some("just now"));
        export.assert_async().await;
    }
}
