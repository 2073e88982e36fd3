pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod store;

use std::sync::Arc;

use tracing::info;

use crate::config::DatabaseConfig;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Condition, DatabaseError, DocumentStore, FindOptions, Index, Query, SortOrder, ID_FIELD};

/// Shared handle to whichever document store backs this process
pub type Db = Arc<dyn DocumentStore>;

/// PostgreSQL when a database URL is configured, otherwise the in-process
/// store. Either way the repositories' indexes exist on return.
pub async fn connect(config: &DatabaseConfig) -> Result<Db, DatabaseError> {
    let db: Db = match config.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            let store =
                PgStore::connect(url, &config.database_name, config.max_connections).await?;
            Arc::new(store)
        }
        None => {
            info!("No database URL configured, using in-memory document store");
            Arc::new(MemoryStore::new())
        }
    };
    repositories::ensure_indexes(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_connection_is_indexed() {
        let mut config = AppConfig::development().database;
        config.url = None;
        let db = connect(&config).await.unwrap();

        db.insert("users", json!({ "_id": "1", "username": "alice" }))
            .await
            .unwrap();
        let err = db
            .insert("users", json!({ "_id": "2", "username": "alice" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }
}
