use thiserror::Error;

#[derive(Error, Debug)]
pub enum OdkError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed ({status}): {body}")]
    Authentication { status: u16, body: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Submission export failed ({status}): {body}")]
    Fetch { status: u16, body: String },

    #[error("Could not parse submissions: {0}")]
    Parse(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl OdkError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn authentication(status: reqwest::StatusCode, body: &str) -> Self {
        OdkError::Authentication {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    pub fn fetch(status: reqwest::StatusCode, body: &str) -> Self {
        OdkError::Fetch {
            status: status.as_u16(),
            body: Self::truncate_body(body),
        }
    }

    /// True when the server rejected our credentials or token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            OdkError::Authentication { status: 401, .. } | OdkError::Fetch { status: 401, .. }
        )
    }
}
