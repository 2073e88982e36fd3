use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blacklist entry for a session token, keyed by the token's `jti`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedToken {
    #[serde(rename = "_id")]
    pub id: String,
    /// Unix timestamp after which the token is rejected anyway
    #[serde(rename = "exp")]
    pub expiry_date: i64,
    pub revoked_date: DateTime<Utc>,
}

impl RevokedToken {
    pub fn new(jti: impl Into<String>, expiry_date: i64) -> Self {
        Self {
            id: jti.into(),
            expiry_date,
            revoked_date: Utc::now(),
        }
    }
}
