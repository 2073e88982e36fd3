use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "Utc::now")]
    pub last_modified_date: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub created_date: DateTime<Utc>,
}

impl Customer {
    pub fn is_valid(&self) -> bool {
        !self.first_name.is_empty() && !self.email.is_empty()
    }
}
