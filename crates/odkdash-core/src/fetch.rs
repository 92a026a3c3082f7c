//! Submission export download.
//!
//! A fetch is a small state machine so that "retry once after a 401" is a
//! property of the transitions rather than of nested conditionals:
//!
//! ```text
//! NeedsAuth -> Authenticated -> Fetching -> Success
//!                                        -> RetryingAuth -> Fetching(retried) -> Success
//!                                                                             -> Failed
//! ```
//!
//! Any error moves straight to `Failed`. A second 401 is a failure.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::api::{ExportResponse, OdkClient, OdkError};
use crate::auth::{SessionManager, Token};
use crate::auth::store::write_atomic;
use crate::config::artifact_path;

#[derive(Debug)]
enum FetchState {
    NeedsAuth,
    Authenticated(Token),
    Fetching { token: Token, retried: bool },
    RetryingAuth,
    Success(Vec<u8>),
    Failed(OdkError),
}

/// Downloads a form's submissions export to its artifact file.
pub struct Fetcher {
    client: OdkClient,
    session: Arc<SessionManager>,
    data_dir: PathBuf,
    project_id: String,
    form_id: String,
}

impl Fetcher {
    pub fn new(
        client: OdkClient,
        session: Arc<SessionManager>,
        data_dir: PathBuf,
        project_id: impl Into<String>,
        form_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            session,
            data_dir,
            project_id: project_id.into(),
            form_id: form_id.into(),
        }
    }

    /// Artifact path for the configured form.
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.data_dir, &self.form_id)
    }

    /// Fetch the configured project/form pair.
    pub async fn fetch_configured(&self) -> Result<PathBuf, OdkError> {
        self.fetch_submissions(&self.project_id, &self.form_id).await
    }

    /// Download the export for `(project, form)` and overwrite its artifact.
    ///
    /// On failure nothing is written and any earlier artifact is left as is.
    pub async fn fetch_submissions(&self, project: &str, form: &str) -> Result<PathBuf, OdkError> {
        let mut attempts = 0u32;
        let mut state = FetchState::NeedsAuth;

        loop {
            state = match state {
                FetchState::NeedsAuth => match self.session.get_valid_token().await {
                    Ok(token) => FetchState::Authenticated(token),
                    Err(e) => FetchState::Failed(e),
                },
                FetchState::Authenticated(token) => FetchState::Fetching {
                    token,
                    retried: false,
                },
                FetchState::Fetching { token, retried } => {
                    attempts += 1;
                    match self.client.export_submissions(&token.token, project, form).await {
                        Ok(ExportResponse::Csv(body)) => FetchState::Success(body),
                        Ok(ExportResponse::Unauthorized) if !retried => {
                            warn!(project, form, "Token rejected, re-authenticating");
                            FetchState::RetryingAuth
                        }
                        Ok(ExportResponse::Unauthorized) => FetchState::Failed(OdkError::fetch(
                            StatusCode::UNAUTHORIZED,
                            "token rejected again after re-authentication",
                        )),
                        Ok(ExportResponse::Rejected { status, body }) => {
                            FetchState::Failed(OdkError::fetch(status, &body))
                        }
                        Err(e) => FetchState::Failed(e),
                    }
                }
                FetchState::RetryingAuth => match self.session.force_refresh().await {
                    Ok(token) => FetchState::Fetching {
                        token,
                        retried: true,
                    },
                    Err(e) => FetchState::Failed(e),
                },
                FetchState::Success(body) => {
                    let path = artifact_path(&self.data_dir, form);
                    write_atomic(&path, &body)?;
                    info!(project, form, attempts, bytes = body.len(), path = ?path, "Submissions downloaded");
                    return Ok(path);
                }
                FetchState::Failed(e) => {
                    debug!(project, form, attempts, error = %e, "Fetch failed");
                    return Err(e);
                }
            };
        }
    }
}
