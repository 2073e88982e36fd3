use chrono::Utc;
use uuid::Uuid;

use crate::database::models::Customer;
use crate::database::store::{DatabaseError, FindOptions, Query, SortOrder};
use crate::database::Db;

pub const CUSTOMERS_COLLECTION: &str = "customers";

#[derive(Clone)]
pub struct CustomerRepository {
    db: Db,
}

impl CustomerRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_customer(&self, customer: &mut Customer) -> Result<(), DatabaseError> {
        let now = Utc::now();
        customer.id = Uuid::new_v4().to_string();
        customer.created_date = now;
        customer.last_modified_date = now;

        let document = serde_json::to_value(&*customer)?;
        self.db.insert(CUSTOMERS_COLLECTION, document).await
    }

    /// All customers, or only those owned by `owner`, oldest first
    pub async fn get_customers(&self, owner: Option<&str>) -> Result<Vec<Customer>, DatabaseError> {
        let query = match owner {
            Some(owner) => Query::new().eq("owner", owner),
            None => Query::new(),
        };
        let options = FindOptions::sorted_by("createdDate", SortOrder::Ascending);

        self.db
            .find_all(CUSTOMERS_COLLECTION, &query, &options)
            .await?
            .into_iter()
            .map(|document| serde_json::from_value(document).map_err(DatabaseError::from))
            .collect()
    }

    pub async fn get_customer(&self, id: &str) -> Result<Customer, DatabaseError> {
        let id = Uuid::parse_str(id)
            .map_err(|_| DatabaseError::InvalidId(id.to_string()))?
            .to_string();

        match self.db.find_one(CUSTOMERS_COLLECTION, &Query::by_id(id)).await? {
            Some(document) => Ok(serde_json::from_value(document)?),
            None => Err(DatabaseError::NotFound("Customer not found".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::database::MemoryStore;

    fn customer(first_name: &str) -> Customer {
        serde_json::from_value(serde_json::json!({
            "firstName": first_name,
            "email": format!("{}@example.com", first_name),
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn customers_are_scoped_by_owner() {
        let repo = CustomerRepository::new(Arc::new(MemoryStore::new()));

        let mut mine = customer("ada");
        mine.owner = "owner-1".into();
        repo.create_customer(&mut mine).await.unwrap();

        let mut theirs = customer("grace");
        theirs.owner = "owner-2".into();
        repo.create_customer(&mut theirs).await.unwrap();

        assert_eq!(repo.get_customers(None).await.unwrap().len(), 2);
        let owned = repo.get_customers(Some("owner-1")).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].first_name, "ada");

        let loaded = repo.get_customer(&mine.id).await.unwrap();
        assert_eq!(loaded.owner, "owner-1");
        assert!(matches!(
            repo.get_customer("bad-id").await,
            Err(DatabaseError::InvalidId(_))
        ));
    }
}
