use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Inactive,
    Suspended,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Suspended => "suspended",
            UserStatus::Deleted => "deleted",
        }
    }
}

/// Registration payload accepted by `POST /api/users`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Subset of user fields a client may change; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
}

impl UserUpdate {
    pub fn touches_privileges(&self) -> bool {
        self.status.is_some() || self.roles.is_some()
    }
}

/// REST API user.
///
/// The confirmation code and password hash never appear in API responses;
/// the repository persists them alongside the public fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub status: UserStatus,
    pub last_modified_date: DateTime<Utc>,
    pub created_date: DateTime<Utc>,

    #[serde(skip)]
    pub confirmation_code: String,
    #[serde(skip)]
    pub hashed_password: String,
}

impl User {
    /// A pending user with no roles, a fresh id and a fresh confirmation code
    pub fn pending(username: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            roles: Vec::new(),
            status: UserStatus::Pending,
            last_modified_date: now,
            created_date: now,
            confirmation_code: generate_confirmation_code(),
            hashed_password: String::new(),
        }
    }

    // Anything that looks like an address is accepted; confirmation proves the rest
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty() && self.email.contains('@')
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_code_verified(&self, code: &str) -> bool {
        self.confirmation_code == code
    }

    pub fn set_password(&mut self, password: &str) -> Result<(), bcrypt::BcryptError> {
        self.hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
        Ok(())
    }

    pub fn is_credentials_verified(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.hashed_password).unwrap_or(false)
    }
}

fn generate_confirmation_code() -> String {
    Uuid::new_v4().simple().to_string()
}
