//! End-to-end fetch scenarios against a mock ODK Central server.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use odkdash_core::auth::{Credentials, FileTokenStore, Token, TokenStore};
use odkdash_core::clock::ManualClock;
use odkdash_core::config::artifact_path;
use odkdash_core::{Clock, Config, OdkError, Services, Table};
use tempfile::TempDir;

const EXPORT_PATH: &str = "/v1/projects/3/forms/household/submissions.csv";

fn config(server_url: &str, dir: &TempDir) -> Config {
    Config {
        credentials: Credentials {
            server: server_url.to_string(),
            email: "field@example.org".to_string(),
            password: "secret".to_string(),
        },
        project_id: "3".to_string(),
        form_id: "household".to_string(),
        data_dir: dir.path().to_path_buf(),
        refresh_interval: Duration::minutes(10),
        cache_ttl: Duration::minutes(30),
        token_lifetime: Duration::hours(1),
    }
}

fn services(config: &Config, clock: &ManualClock) -> (Services, Arc<FileTokenStore>) {
    let store = Arc::new(FileTokenStore::new(config.token_path()));
    let services = Services::with_store(config, store.clone(), Arc::new(clock.clone())).unwrap();
    (services, store)
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
}

#[tokio::test]
async fn test_retries_once_after_401_with_fresh_token() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), &dir);
    let clock = clock();

    let first_session = server
        .mock("POST", "/v1/sessions")
        .with_body(r#"{"token":"tok1"}"#)
        .expect(1)
        .create_async()
        .await;
    let second_session = server
        .mock("POST", "/v1/sessions")
        .with_body(r#"{"token":"tok2"}"#)
        .expect(1)
        .create_async()
        .await;
    let rejected = server
        .mock("GET", EXPORT_PATH)
        .match_header("authorization", "Bearer tok1")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", EXPORT_PATH)
        .match_header("authorization", "Bearer tok2")
        .with_body("a,b\n1,2\n")
        .expect(1)
        .create_async()
        .await;

    let (services, store) = services(&config, &clock);
    let path = services.fetcher.fetch_configured().await.unwrap();

    assert_eq!(path, artifact_path(dir.path(), "household"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1,2\n");

    let table = Table::from_path(&path).unwrap();
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.column_names(), vec!["a", "b"]);

    // The re-authenticated token is what got persisted
    assert_eq!(store.load().map(|t| t.token), Some("tok2".to_string()));

    first_session.assert_async().await;
    second_session.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_second_401_fails_and_keeps_old_artifact() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), &dir);
    let clock = clock();

    let sessions = server
        .mock("POST", "/v1/sessions")
        .with_body(r#"{"token":"tok"}"#)
        .expect(2)
        .create_async()
        .await;
    let export = server
        .mock("GET", EXPORT_PATH)
        .with_status(401)
        .expect(2)
        .create_async()
        .await;

    let path = config.artifact_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "old,data\n1,2\n").unwrap();

    let (services, _) = services(&config, &clock);
    let err = services.fetcher.fetch_configured().await.unwrap_err();

    assert!(matches!(err, OdkError::Fetch { status: 401, .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "old,data\n1,2\n");
    sessions.assert_async().await;
    export.assert_async().await;
}

#[tokio::test]
async fn test_stored_token_is_reused_across_runs() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), &dir);
    let clock = clock();

    let sessions = server
        .mock("POST", "/v1/sessions")
        .expect(0)
        .create_async()
        .await;
    let export = server
        .mock("GET", EXPORT_PATH)
        .match_header("authorization", "Bearer saved")
        .with_body("x\n1\n")
        .expect(1)
        .create_async()
        .await;

    FileTokenStore::new(config.token_path())
        .save(&Token::new("saved", clock.now() + Duration::minutes(20)))
        .unwrap();

    let (services, _) = services(&config, &clock);
    services.fetcher.fetch_configured().await.unwrap();

    sessions.assert_async().await;
    export.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_reported_without_writing() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), &dir);
    let clock = clock();

    let _sessions = server
        .mock("POST", "/v1/sessions")
        .with_body(r#"{"token":"tok"}"#)
        .create_async()
        .await;
    let export = server
        .mock("GET", EXPORT_PATH)
        .with_status(404)
        .with_body(r#"{"message":"Could not find the resource you were looking for."}"#)
        .expect(1)
        .create_async()
        .await;

    let (services, _) = services(&config, &clock);
    let err = services.fetcher.fetch_configured().await.unwrap_err();

    match err {
        OdkError::Fetch { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Could not find"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!config.artifact_path().exists());
    export.assert_async().await;
}

#[tokio::test]
async fn test_bad_credentials_surface_as_authentication_error() {
    let mut server = mockito::Server::new_async().await;
    let dir = TempDir::new().unwrap();
    let config = config(&server.url(), &dir);
    let clock = clock();

    let _sessions = server
        .mock("POST", "/v1/sessions")
        .with_status(401)
        .with_body(r#"{"message":"Could not authenticate with the provided credentials."}"#)
        .create_async()
        .await;
    let export = server.mock("GET", EXPORT_PATH).expect(0).create_async().await;

    let (services, store) = services(&config, &clock);
    let err = services.fetcher.fetch_configured().await.unwrap_err();

    assert!(matches!(err, OdkError::Authentication { status: 401, .. }));
    assert!(store.load().is_none());
    export.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let dir = TempDir::new().unwrap();
    // Grab a free port, then close it so connections are refused
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let config = config(&format!("http://127.0.0.1:{}", port), &dir);
    let clock = clock();

    let (services, _) = services(&config, &clock);
    let err = services.fetcher.fetch_configured().await.unwrap_err();
    assert!(matches!(err, OdkError::Transport(_)));
}
