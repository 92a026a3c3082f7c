use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A bearer token and the moment we stop trusting it.
///
/// Serialized as `{"token": "...", "expiry": <unix seconds>}`. Expiry is read
/// as a float so records written with fractional seconds still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    #[serde(deserialize_with = "unix_seconds")]
    pub expiry: i64,
}

fn unix_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() {
        return Err(serde::de::Error::custom("expiry must be a finite number"));
    }
    Ok(secs.floor() as i64)
}

impl Token {
    pub fn new(token: impl Into<String>, expiry: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expiry: expiry.timestamp(),
        }
    }

    /// Token issued at `issued_at`, trusted for `lifetime`. Saturates at the
    /// latest representable time.
    pub fn issued(token: impl Into<String>, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let expiry = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(token, expiry)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.expiry, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Usable only while `now < expiry`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() < self.expiry
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at() - now).num_minutes().max(0)
    }
}
