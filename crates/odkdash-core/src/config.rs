//! Application configuration.
//!
//! Settings come from the process environment (a `.env` file is loaded by the
//! binary before this runs). The five ODK settings are required; everything
//! else has a default. The resulting `Config` is immutable and is passed
//! explicitly to the components that need it.

use std::path::PathBuf;

use chrono::Duration;
use tracing::debug;

use crate::api::OdkError;
use crate::auth::{CredentialStore, Credentials};

/// Application name used for data directory paths
pub const APP_NAME: &str = "odkdash";

/// Token file name in the data directory
const TOKEN_FILE: &str = "odk_token.json";

/// Directory (inside the data directory) that holds export artifacts
const OUTPUT_DIR: &str = "odk_submissions";

/// Default background refresh period.
const DEFAULT_REFRESH_MINUTES: i64 = 10;

/// Default freshness window for interactive loads.
const DEFAULT_CACHE_TTL_MINUTES: i64 = 30;

/// ODK Central does not tell us when a session expires, so assume an hour.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Upper bound for the refresh and cache settings (one year).
const MAX_MINUTES: i64 = 525_600;

/// Upper bound for the assumed token lifetime (one year).
const MAX_TOKEN_LIFETIME_SECS: i64 = 31_536_000;

pub const ENV_SERVER: &str = "ODK_DOMAIN";
pub const ENV_EMAIL: &str = "ODK_EMAIL";
pub const ENV_PASSWORD: &str = "ODK_PASSWORD";
pub const ENV_PROJECT: &str = "PROJECT_ID";
pub const ENV_FORM: &str = "FORM_ID";
pub const ENV_DATA_DIR: &str = "ODKDASH_DATA_DIR";
pub const ENV_REFRESH_MINUTES: &str = "ODKDASH_REFRESH_MINUTES";
pub const ENV_CACHE_TTL_MINUTES: &str = "ODKDASH_CACHE_TTL_MINUTES";
pub const ENV_TOKEN_LIFETIME_SECS: &str = "ODKDASH_TOKEN_LIFETIME_SECS";

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub project_id: String,
    pub form_id: String,
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub cache_ttl: Duration,
    pub token_lifetime: Duration,
}

impl Config {
    /// Load from the process environment, falling back to the OS keychain
    /// for the password.
    pub fn from_env() -> Result<Self, OdkError> {
        Self::from_lookup(
            |key| std::env::var(key).ok(),
            |email| CredentialStore::get_password(email).ok(),
        )
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// `password_fallback` is consulted with the account email only when
    /// `ODK_PASSWORD` is unset. Every missing required key is reported in a
    /// single `Configuration` error.
    pub fn from_lookup<F, P>(lookup: F, password_fallback: P) -> Result<Self, OdkError>
    where
        F: Fn(&str) -> Option<String>,
        P: FnOnce(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server = get(ENV_SERVER).map(|s| s.trim_end_matches('/').to_string());
        let email = get(ENV_EMAIL);
        let project_id = get(ENV_PROJECT);
        let form_id = get(ENV_FORM);
        let password = match get(ENV_PASSWORD) {
            Some(p) => Some(p),
            None => email
                .as_deref()
                .and_then(password_fallback)
                .filter(|p| !p.is_empty()),
        };

        let mut missing = Vec::new();
        if server.as_deref().map_or(true, str::is_empty) {
            missing.push(ENV_SERVER);
        }
        if email.is_none() {
            missing.push(ENV_EMAIL);
        }
        if password.is_none() {
            missing.push(ENV_PASSWORD);
        }
        if project_id.is_none() {
            missing.push(ENV_PROJECT);
        }
        if form_id.is_none() {
            missing.push(ENV_FORM);
        }
        if !missing.is_empty() {
            return Err(OdkError::Configuration(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        }

        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        let refresh_interval = minutes(
            ENV_REFRESH_MINUTES,
            parse_number(&get, ENV_REFRESH_MINUTES, DEFAULT_REFRESH_MINUTES, MAX_MINUTES)?,
        )?;
        let cache_ttl = minutes(
            ENV_CACHE_TTL_MINUTES,
            parse_number(&get, ENV_CACHE_TTL_MINUTES, DEFAULT_CACHE_TTL_MINUTES, MAX_MINUTES)?,
        )?;
        let token_lifetime = parse_number(
            &get,
            ENV_TOKEN_LIFETIME_SECS,
            DEFAULT_TOKEN_LIFETIME_SECS,
            MAX_TOKEN_LIFETIME_SECS,
        )
        .and_then(|n| {
            Duration::try_seconds(n).ok_or_else(|| out_of_range(ENV_TOKEN_LIFETIME_SECS, n))
        })?;

        // All of these were checked above
        let (Some(server), Some(email), Some(password), Some(project_id), Some(form_id)) =
            (server, email, password, project_id, form_id)
        else {
            return Err(OdkError::Configuration("incomplete configuration".to_string()));
        };
        check_path_segment(ENV_PROJECT, &project_id)?;
        check_path_segment(ENV_FORM, &form_id)?;

        let config = Self {
            credentials: Credentials {
                server,
                email,
                password,
            },
            project_id,
            form_id,
            data_dir,
            refresh_interval,
            cache_ttl,
            token_lifetime,
        };
        debug!(
            server = %config.credentials.server,
            project = %config.project_id,
            form = %config.form_id,
            data_dir = ?config.data_dir,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn token_path(&self) -> PathBuf {
        token_path(&self.data_dir)
    }

    /// Path of the export artifact for the configured form.
    pub fn artifact_path(&self) -> PathBuf {
        artifact_path(&self.data_dir, &self.form_id)
    }
}

/// `<data_dir>/odk_submissions/<form>_submissions.csv`
pub fn artifact_path(data_dir: &std::path::Path, form_id: &str) -> PathBuf {
    data_dir
        .join(OUTPUT_DIR)
        .join(format!("{}_submissions.csv", form_id))
}

/// `<data_dir>/odk_token.json`
pub fn token_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(TOKEN_FILE)
}

/// The data directory from `ODKDASH_DATA_DIR` alone. Usable when the rest of
/// the configuration is missing (logging, logout).
pub fn data_dir_from_env() -> PathBuf {
    std::env::var(ENV_DATA_DIR)
        .ok()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir)
}

/// Platform cache directory for the app, or `./cache` when none exists.
pub fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("./cache"))
}

fn parse_number<G>(get: &G, key: &str, default: i64, max: i64) -> Result<i64, OdkError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n > max => Err(out_of_range(key, n)),
            Ok(n) if n > 0 => Ok(n),
            _ => Err(OdkError::Configuration(format!(
                "{} must be a positive whole number, got {:?}",
                key, raw
            ))),
        },
    }
}

fn minutes(key: &str, n: i64) -> Result<Duration, OdkError> {
    Duration::try_minutes(n).ok_or_else(|| out_of_range(key, n))
}

fn out_of_range(key: &str, n: i64) -> OdkError {
    OdkError::Configuration(format!("{} is too large: {}", key, n))
}

/// Project and form ids end up in URL paths and file names, so they must be
/// a single path segment.
fn check_path_segment(key: &str, value: &str) -> Result<(), OdkError> {
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(OdkError::Configuration(format!(
            "{} must not contain path separators or '..', got {:?}",
            key, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_env() -> HashMap<String, String> {
        env(&[
            (ENV_SERVER, "https://central.example.org/"),
            (ENV_EMAIL, "a@b.com"),
            (ENV_PASSWORD, "p"),
            (ENV_PROJECT, "1"),
            (ENV_FORM, "F1"),
            (ENV_DATA_DIR, "/tmp/odkdash-test"),
        ])
    }

    fn load(vars: &HashMap<String, String>) -> Result<Config, OdkError> {
        Config::from_lookup(|k| vars.get(k).cloned(), |_| None)
    }

    #[test]
    fn test_loads_complete_config_with_defaults() {
        let config = load(&full_env()).expect("config should load");
        assert_eq!(config.credentials.server, "https://central.example.org");
        assert_eq!(config.credentials.email, "a@b.com");
        assert_eq!(config.project_id, "1");
        assert_eq!(config.form_id, "F1");
        assert_eq!(config.refresh_interval, Duration::minutes(10));
        assert_eq!(config.cache_ttl, Duration::minutes(30));
        assert_eq!(config.token_lifetime, Duration::hours(1));
        assert_eq!(
            config.artifact_path(),
            PathBuf::from("/tmp/odkdash-test/odk_submissions/F1_submissions.csv")
        );
        assert_eq!(
            config.token_path(),
            PathBuf::from("/tmp/odkdash-test/odk_token.json")
        );
    }

    #[test]
    fn test_reports_all_missing_settings() {
        let vars = env(&[(ENV_SERVER, "https://x.test"), (ENV_FORM, "  ")]);
        let err = load(&vars).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, OdkError::Configuration(_)));
        assert!(msg.contains(ENV_EMAIL));
        assert!(msg.contains(ENV_PASSWORD));
        assert!(msg.contains(ENV_PROJECT));
        assert!(msg.contains(ENV_FORM)); // blank counts as missing
        assert!(!msg.contains(ENV_SERVER));
    }

    #[test]
    fn test_password_fallback_used_only_when_unset() {
        let mut vars = full_env();
        vars.remove(ENV_PASSWORD);
        let config = Config::from_lookup(
            |k| vars.get(k).cloned(),
            |email| {
                assert_eq!(email, "a@b.com");
                Some("from-keychain".to_string())
            },
        )
        .expect("fallback password should satisfy config");
        assert_eq!(config.credentials.password, "from-keychain");

        let vars = full_env();
        let config = Config::from_lookup(
            |k| vars.get(k).cloned(),
            |_| panic!("fallback must not be consulted when ODK_PASSWORD is set"),
        )
        .expect("config should load");
        assert_eq!(config.credentials.password, "p");
    }

    #[test]
    fn test_rejects_invalid_numbers() {
        let mut vars = full_env();
        vars.insert(ENV_REFRESH_MINUTES.to_string(), "soon".to_string());
        assert!(matches!(load(&vars), Err(OdkError::Configuration(_))));

        let mut vars = full_env();
        vars.insert(ENV_CACHE_TTL_MINUTES.to_string(), "0".to_string());
        assert!(matches!(load(&vars), Err(OdkError::Configuration(_))));
    }

    #[test]
    fn test_rejects_oversized_numbers() {
        let mut vars = full_env();
        vars.insert(ENV_REFRESH_MINUTES.to_string(), "200000000000000".to_string());
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, OdkError::Configuration(_)));
        assert!(err.to_string().contains(ENV_REFRESH_MINUTES));

        let mut vars = full_env();
        vars.insert(ENV_CACHE_TTL_MINUTES.to_string(), i64::MAX.to_string());
        assert!(matches!(load(&vars), Err(OdkError::Configuration(_))));

        let mut vars = full_env();
        vars.insert(ENV_TOKEN_LIFETIME_SECS.to_string(), "9000000000000000".to_string());
        assert!(matches!(load(&vars), Err(OdkError::Configuration(_))));

        // The bounds themselves are accepted
        let mut vars = full_env();
        vars.insert(ENV_REFRESH_MINUTES.to_string(), MAX_MINUTES.to_string());
        vars.insert(ENV_TOKEN_LIFETIME_SECS.to_string(), MAX_TOKEN_LIFETIME_SECS.to_string());
        let config = load(&vars).expect("config should load");
        assert_eq!(config.refresh_interval, Duration::days(365));
        assert_eq!(config.token_lifetime, Duration::days(365));
    }

    #[test]
    fn test_rejects_ids_that_escape_the_output_dir() {
        for bad in ["../../etc/x", "a/b", "a\\b", ".."] {
            let mut vars = full_env();
            vars.insert(ENV_FORM.to_string(), bad.to_string());
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, OdkError::Configuration(_)), "form id {:?}", bad);
            assert!(err.to_string().contains(ENV_FORM));
        }

        let mut vars = full_env();
        vars.insert(ENV_PROJECT.to_string(), "1/forms".to_string());
        assert!(matches!(load(&vars), Err(OdkError::Configuration(_))));

        // Dots and dashes inside an id are fine
        let mut vars = full_env();
        vars.insert(ENV_FORM.to_string(), "household.v2-survey".to_string());
        let config = load(&vars).expect("config should load");
        assert_eq!(
            config.artifact_path(),
            PathBuf::from("/tmp/odkdash-test/odk_submissions/household.v2-survey_submissions.csv")
        );
    }

    #[test]
    fn test_custom_intervals() {
        let mut vars = full_env();
        vars.insert(ENV_REFRESH_MINUTES.to_string(), "5".to_string());
        vars.insert(ENV_TOKEN_LIFETIME_SECS.to_string(), "900".to_string());
        let config = load(&vars).expect("config should load");
        assert_eq!(config.refresh_interval, Duration::minutes(5));
        assert_eq!(config.token_lifetime, Duration::seconds(900));
    }
}
