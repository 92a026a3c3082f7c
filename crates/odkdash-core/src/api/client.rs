//! API client for the ODK Central REST API.
//!
//! Two endpoints are used: session creation (email/password for a bearer
//! token) and the per-form CSV submissions export.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::OdkError;
use crate::auth::Credentials;

/// HTTP request timeout in seconds.
/// Exports of large forms can be slow; 30s still fails fast on a dead server.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct SessionRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

/// Outcome of a submissions export request.
#[derive(Debug)]
pub enum ExportResponse {
    /// 2xx with the raw CSV body
    Csv(Vec<u8>),
    /// 401: the token was not accepted
    Unauthorized,
    /// Any other non-success status
    Rejected { status: StatusCode, body: String },
}

/// API client for an ODK Central server.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct OdkClient {
    client: Client,
    base_url: Url,
}

impl OdkClient {
    /// Create a client for the server at `base_url` (e.g. `https://central.example.org`)
    pub fn new(base_url: &str) -> Result<Self, OdkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Self::with_client(client, base_url)
    }

    /// Create a client that shares an existing connection pool.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self, OdkError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            OdkError::Configuration(format!("invalid server URL {:?}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(OdkError::Configuration(format!(
                "server URL {:?} cannot have a path",
                base_url.as_str()
            )));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `POST /v1/sessions`, returning the session token.
    pub async fn create_session(&self, credentials: &Credentials) -> Result<String, OdkError> {
        let url = self.endpoint(&["v1", "sessions"]);
        debug!(url = %url, email = %credentials.email, "Creating session");

        let response = self
            .client
            .post(url)
            .json(&SessionRequest {
                email: &credentials.email,
                password: &credentials.password,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(OdkError::authentication(status, &body));
        }

        let session: SessionResponse = serde_json::from_str(&body).map_err(|e| {
            OdkError::authentication(status, &format!("unexpected session response ({}): {}", e, body))
        })?;
        if session.token.is_empty() {
            return Err(OdkError::authentication(status, "session response had an empty token"));
        }
        Ok(session.token)
    }

    /// `GET /v1/projects/{project}/forms/{form}/submissions.csv`
    pub async fn export_submissions(
        &self,
        token: &str,
        project: &str,
        form: &str,
    ) -> Result<ExportResponse, OdkError> {
        let url = self.endpoint(&["v1", "projects", project, "forms", form, "submissions.csv"]);
        debug!(url = %url, "Requesting submissions export");

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(ExportResponse::Csv(bytes.to_vec()));
        }
        if status == StatusCode::UNAUTHORIZED {
            return Ok(ExportResponse::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        Ok(ExportResponse::Rejected { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn creds(server: &str) -> Credentials {
        Credentials {
            server: server.to_string(),
            email: "a@b.com".to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn test_endpoint_paths() {
        let client = OdkClient::new("https://x.test").unwrap();
        assert_eq!(
            client.endpoint(&["v1", "sessions"]).as_str(),
            "https://x.test/v1/sessions"
        );

        // Server mounted under a prefix, ids needing escapes
        let client = OdkClient::new("https://x.test/central/").unwrap();
        assert_eq!(
            client
                .endpoint(&["v1", "projects", "1", "forms", "my form", "submissions.csv"])
                .as_str(),
            "https://x.test/central/v1/projects/1/forms/my%20form/submissions.csv"
        );
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(matches!(
            OdkClient::new("not a url"),
            Err(OdkError::Configuration(_))
        ));
        assert!(matches!(
            OdkClient::new("mailto:a@b.com"),
            Err(OdkError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_create_session_sends_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/sessions")
            .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "p"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token":"tok1","expiresAt":"2030-01-01T00:00:00Z"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = OdkClient::new(&server.url()).unwrap();
        let token = client.create_session(&creds(&server.url())).await.unwrap();
        assert_eq!(token, "tok1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_session_failure_carries_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/sessions")
            .with_status(401)
            .with_body(r#"{"message":"Could not authenticate with the provided credentials."}"#)
            .create_async()
            .await;

        let client = OdkClient::new(&server.url()).unwrap();
        match client.create_session(&creds(&server.url())).await {
            Err(OdkError::Authentication { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Could not authenticate"));
            }
            other => panic!("expected authentication error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_session_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/sessions")
            .with_status(200)
            .with_body("<html>proxy login</html>")
            .create_async()
            .await;

        let client = OdkClient::new(&server.url()).unwrap();
        assert!(matches!(
            client.create_session(&creds(&server.url())).await,
            Err(OdkError::Authentication { status: 200, .. })
        ));
    }

    #[tokio::test]
    async fn test_export_statuses() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/projects/1/forms/ok/submissions.csv")
            .match_header("authorization", "Bearer tok1")
            .with_status(200)
            .with_body("a,b\n1,2\n")
            .create_async()
            .await;
        server
            .mock("GET", "/v1/projects/1/forms/denied/submissions.csv")
            .with_status(401)
            .create_async()
            .await;
        server
            .mock("GET", "/v1/projects/1/forms/missing/submissions.csv")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let client = OdkClient::new(&server.url()).unwrap();

        match client.export_submissions("tok1", "1", "ok").await.unwrap() {
            ExportResponse::Csv(body) => assert_eq!(body, b"a,b\n1,2\n"),
            other => panic!("expected CSV, got {:?}", other),
        }
        assert!(matches!(
            client.export_submissions("tok1", "1", "denied").await.unwrap(),
            ExportResponse::Unauthorized
        ));
        match client.export_submissions("tok1", "1", "missing").await.unwrap() {
            ExportResponse::Rejected { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "not found");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error() {
        // Port 9 on localhost is almost never listening
        let client = OdkClient::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            client.export_submissions("t", "1", "f").await,
            Err(OdkError::Transport(_))
        ));
    }
}
