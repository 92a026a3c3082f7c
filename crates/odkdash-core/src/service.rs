//! Wiring of the fetch pipeline from a [`Config`].

use std::sync::Arc;

use crate::api::{OdkClient, OdkError};
use crate::auth::{Authenticator, FileTokenStore, SessionManager, TokenStore};
use crate::cache::DataLoader;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::fetch::Fetcher;

/// The shared pieces every run mode needs.
pub struct Services {
    pub session: Arc<SessionManager>,
    pub fetcher: Arc<Fetcher>,
    pub loader: Arc<DataLoader>,
}

impl Services {
    /// Interactive wiring: token persisted to `<data_dir>/odk_token.json`.
    pub fn from_config(config: &Config) -> Result<Self, OdkError> {
        let store = Arc::new(FileTokenStore::new(config.token_path()));
        Self::with_store(config, store, Arc::new(SystemClock))
    }

    pub fn with_store(
        config: &Config,
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OdkError> {
        let client = OdkClient::new(&config.credentials.server)?;
        let authenticator = Authenticator::new(
            client.clone(),
            config.credentials.clone(),
            clock.clone(),
            config.token_lifetime,
        );
        let session = Arc::new(SessionManager::new(authenticator, store, clock.clone()));
        let fetcher = Arc::new(Fetcher::new(
            client,
            session.clone(),
            config.data_dir.clone(),
            config.project_id.clone(),
            config.form_id.clone(),
        ));
        let loader = Arc::new(DataLoader::new(fetcher.clone(), config.cache_ttl, clock));

        Ok(Self {
            session,
            fetcher,
            loader,
        })
    }
}
