pub mod customers;
pub mod revoked_tokens;
pub mod users;

pub use customers::CustomerRepository;
pub use revoked_tokens::RevokedTokenRepository;
pub use users::UserRepository;

use tracing::debug;

use crate::database::store::{DatabaseError, Index};
use crate::database::Db;

use customers::CUSTOMERS_COLLECTION;
use revoked_tokens::REVOKED_TOKENS_COLLECTION;
use users::USERS_COLLECTION;

/// Indexes the repositories rely on; usernames and emails are unique
pub fn indexes() -> Vec<(&'static str, Index)> {
    vec![
        (USERS_COLLECTION, Index::new(["username"]).unique()),
        (USERS_COLLECTION, Index::new(["email"]).unique()),
        (CUSTOMERS_COLLECTION, Index::new(["owner"])),
        (REVOKED_TOKENS_COLLECTION, Index::new(["exp"])),
    ]
}

pub async fn ensure_indexes(db: &Db) -> Result<(), DatabaseError> {
    for (collection, index) in indexes() {
        db.ensure_index(collection, &index).await?;
        debug!(collection, index = %index.name(), "Index ready");
    }
    Ok(())
}
