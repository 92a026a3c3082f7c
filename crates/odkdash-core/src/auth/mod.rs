//! Authentication module for ODK Central sessions.
//!
//! This module provides:
//! - `Token`: a bearer token with a locally estimated expiry
//! - `TokenStore`: where the current token lives (file or memory)
//! - `Authenticator`: trades credentials for a token
//! - `SessionManager`: hands out a valid token, renewing as needed
//! - `CredentialStore`: optional OS keychain storage for the password

pub mod authenticator;
pub mod credentials;
pub mod session;
pub mod store;
pub mod token;

pub use authenticator::Authenticator;
pub use credentials::{CredentialStore, Credentials};
pub use session::SessionManager;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::Token;
