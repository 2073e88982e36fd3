use chrono::Utc;

use crate::database::models::RevokedToken;
use crate::database::store::{DatabaseError, Query};
use crate::database::Db;

pub const REVOKED_TOKENS_COLLECTION: &str = "revoked_tokens";

#[derive(Clone)]
pub struct RevokedTokenRepository {
    db: Db,
}

impl RevokedTokenRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_revoked_token(&self, token: &RevokedToken) -> Result<(), DatabaseError> {
        let document = serde_json::to_value(token)?;
        self.db.insert(REVOKED_TOKENS_COLLECTION, document).await
    }

    pub async fn is_token_revoked(&self, jti: &str) -> Result<bool, DatabaseError> {
        if jti.is_empty() {
            return Ok(false);
        }
        self.db
            .exists(REVOKED_TOKENS_COLLECTION, &Query::by_id(jti))
            .await
    }

    /// Drop entries for tokens that have expired on their own
    pub async fn delete_expired_tokens(&self) -> Result<u64, DatabaseError> {
        self.db
            .remove(
                REVOKED_TOKENS_COLLECTION,
                &Query::new().lt("exp", Utc::now().timestamp()),
            )
            .await
    }
}
