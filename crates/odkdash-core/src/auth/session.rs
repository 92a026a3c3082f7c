use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Authenticator, Token, TokenStore};
use crate::api::OdkError;
use crate::clock::Clock;

/// Hands out a token that is valid as far as we know.
///
/// Local expiry is only an estimate. Callers that get a 401 anyway use
/// [`SessionManager::force_refresh`].
pub struct SessionManager {
    authenticator: Authenticator,
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    /// Serializes session requests within this process
    refresh_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(authenticator: Authenticator, store: Arc<dyn TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            authenticator,
            store,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    fn stored_valid_token(&self) -> Option<Token> {
        let token = self.store.load()?;
        let now = self.clock.now();
        if token.is_valid_at(now) {
            debug!(minutes_left = token.minutes_until_expiry(now), "Using stored token");
            Some(token)
        } else {
            debug!(expiry = token.expiry, "Stored token expired");
            None
        }
    }

    /// The stored token if it hasn't expired; otherwise a fresh one.
    pub async fn get_valid_token(&self) -> Result<Token, OdkError> {
        if let Some(token) = self.stored_valid_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited
        if let Some(token) = self.stored_valid_token() {
            return Ok(token);
        }
        self.renew().await
    }

    /// Authenticate again regardless of what the store holds.
    pub async fn force_refresh(&self) -> Result<Token, OdkError> {
        let _guard = self.refresh_lock.lock().await;
        debug!("Forcing token refresh");
        self.renew().await
    }

    async fn renew(&self) -> Result<Token, OdkError> {
        let token = self.authenticator.authenticate().await?;
        // A token we can't persist is still good for this process
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "Failed to persist session token");
        }
        Ok(token)
    }
}
