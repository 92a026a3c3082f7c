use keyring::Entry;

use crate::api::OdkError;

const SERVICE_NAME: &str = "odkdash";

/// Account used to sign in to ODK Central.
#[derive(Clone)]
pub struct Credentials {
    /// Server base URL without a trailing slash
    pub server: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// ODK account passwords in the OS keychain.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an account email in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<(), OdkError> {
        Self::entry(email)?
            .set_password(password)
            .map_err(|e| keychain_error("store password in keychain", e))
    }

    /// Retrieve the password for an account email from the OS keychain
    pub fn get_password(email: &str) -> Result<String, OdkError> {
        Self::entry(email)?
            .get_password()
            .map_err(|e| keychain_error("retrieve password from keychain", e))
    }

    /// Delete the stored password for an account email
    pub fn delete(email: &str) -> Result<(), OdkError> {
        Self::entry(email)?
            .delete_credential()
            .map_err(|e| keychain_error("delete credential from keychain", e))
    }

    fn entry(email: &str) -> Result<Entry, OdkError> {
        Entry::new(SERVICE_NAME, email).map_err(|e| keychain_error("create keyring entry", e))
    }
}

fn keychain_error(action: &str, e: keyring::Error) -> OdkError {
    OdkError::Configuration(format!("Failed to {}: {}", action, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            server: "https://x.test".into(),
            email: "a@b.com".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("a@b.com"));
        assert!(!shown.contains("hunter2"));
    }
}
