use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::models::{User, UserUpdate};
use crate::database::store::{DatabaseError, FindOptions, Query};
use crate::database::Db;

pub const USERS_COLLECTION: &str = "users";

/// Stored form of a user: the public fields plus the secrets the API never returns
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    #[serde(flatten)]
    user: User,
    #[serde(default)]
    confirmation_code: String,
    #[serde(default)]
    hashed_password: String,
}

impl From<&User> for StoredUser {
    fn from(user: &User) -> Self {
        Self {
            user: user.clone(),
            confirmation_code: user.confirmation_code.clone(),
            hashed_password: user.hashed_password.clone(),
        }
    }
}

fn decode(document: Value) -> Result<User, DatabaseError> {
    let stored: StoredUser = serde_json::from_value(document)?;
    let mut user = stored.user;
    user.confirmation_code = stored.confirmation_code;
    user.hashed_password = stored.hashed_password;
    Ok(user)
}

fn parse_id(id: &str) -> Result<String, DatabaseError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| DatabaseError::InvalidId(id.to_string()))
}

#[derive(Clone)]
pub struct UserRepository {
    db: Db,
}

impl UserRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_user(&self, user: &mut User) -> Result<(), DatabaseError> {
        let now = Utc::now();
        user.id = Uuid::new_v4().to_string();
        user.created_date = now;
        user.last_modified_date = now;

        let document = serde_json::to_value(StoredUser::from(&*user))?;
        self.db.insert(USERS_COLLECTION, document).await
    }

    /// Every user, or only those whose username contains `search`
    pub async fn get_users(&self, search: Option<&str>, options: &FindOptions) -> Result<Vec<User>, DatabaseError> {
        let query = match search.filter(|s| !s.is_empty()) {
            Some(needle) => Query::new().text("username", needle),
            None => Query::new(),
        };
        self.db
            .find_all(USERS_COLLECTION, &query, options)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    pub async fn count_users(&self) -> Result<u64, DatabaseError> {
        self.db.count(USERS_COLLECTION, &Query::new()).await
    }

    /// Malformed ids are skipped rather than failing the whole batch
    pub async fn delete_users(&self, ids: &[String]) -> Result<u64, DatabaseError> {
        let valid: Vec<String> = ids.iter().filter_map(|id| parse_id(id).ok()).collect();
        if valid.is_empty() {
            return Ok(0);
        }
        self.db
            .remove(USERS_COLLECTION, &Query::new().is_in("_id", valid))
            .await
    }

    pub async fn delete_all_users(&self) -> Result<u64, DatabaseError> {
        self.db.remove_all(USERS_COLLECTION).await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        let id = parse_id(id)?;
        match self.db.find_one(USERS_COLLECTION, &Query::by_id(id)).await? {
            Some(document) => decode(document),
            None => Err(DatabaseError::NotFound("User not found".to_string())),
        }
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        self.db
            .find_one(USERS_COLLECTION, &Query::new().eq("username", username))
            .await?
            .map(decode)
            .transpose()
    }

    pub async fn user_exists_by_username(&self, username: &str) -> Result<bool, DatabaseError> {
        self.db
            .exists(USERS_COLLECTION, &Query::new().eq("username", username))
            .await
    }

    pub async fn user_exists_by_email(&self, email: &str) -> Result<bool, DatabaseError> {
        self.db
            .exists(USERS_COLLECTION, &Query::new().eq("email", email))
            .await
    }

    pub async fn update_user(&self, id: &str, changes: &UserUpdate) -> Result<User, DatabaseError> {
        let id = parse_id(id)?;

        let mut update = Map::new();
        update.insert("lastModifiedDate".into(), serde_json::to_value(Utc::now())?);
        if let Some(email) = changes.email.as_deref().filter(|e| !e.is_empty()) {
            update.insert("email".into(), Value::from(email));
        }
        if let Some(username) = changes.username.as_deref().filter(|u| !u.is_empty()) {
            update.insert("username".into(), Value::from(username));
        }
        if let Some(status) = changes.status {
            update.insert("status".into(), serde_json::to_value(status)?);
        }
        if let Some(roles) = changes.roles.as_ref().filter(|r| !r.is_empty()) {
            update.insert("roles".into(), serde_json::to_value(roles)?);
        }

        match self.db.update(USERS_COLLECTION, &Query::by_id(id), update).await? {
            Some(document) => decode(document),
            None => Err(DatabaseError::NotFound("User not found".to_string())),
        }
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), DatabaseError> {
        let id = parse_id(id)?;
        match self.db.remove(USERS_COLLECTION, &Query::by_id(id)).await? {
            0 => Err(DatabaseError::NotFound("User not found".to_string())),
            _ => Ok(()),
        }
    }
}
