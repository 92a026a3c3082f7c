use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use super::{Credentials, Token};
use crate::api::{OdkClient, OdkError};
use crate::clock::Clock;

/// Exchanges account credentials for a bearer token.
///
/// This is the only place the password leaves the process.
pub struct Authenticator {
    client: OdkClient,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

impl Authenticator {
    pub fn new(
        client: OdkClient,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
    ) -> Self {
        Self {
            client,
            credentials,
            clock,
            lifetime,
        }
    }

    /// Create a session and stamp it with a local expiry.
    ///
    /// The server doesn't tell us how long the token lasts, so the expiry is
    /// `issued + lifetime`. A 401 on a later request overrides this estimate.
    pub async fn authenticate(&self) -> Result<Token, OdkError> {
        let issued_at = self.clock.now();
        match self.client.create_session(&self.credentials).await {
            Ok(token) => {
                let token = Token::issued(token, issued_at, self.lifetime);
                info!(email = %self.credentials.email, expiry = token.expiry, "Authenticated with ODK Central");
                Ok(token)
            }
            Err(e) => {
                warn!(email = %self.credentials.email, error = %e, "Authentication failed");
                Err(e)
            }
        }
    }
}
