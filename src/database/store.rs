use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Field every stored document is keyed by
pub const ID_FIELD: &str = "_id";

/// Errors from any [`DocumentStore`] backend
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid id: `{0}`")]
    InvalidId(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    Lt(Value),
    Gt(Value),
    /// Case-insensitive substring match on a string field
    Text(String),
}

impl Condition {
    fn matches(&self, field: Option<&Value>) -> bool {
        match (self, field) {
            (Condition::Eq(expected), Some(actual)) => actual == expected,
            (Condition::Eq(expected), None) => expected.is_null(),
            (Condition::In(options), Some(actual)) => options.contains(actual),
            (Condition::Lt(bound), Some(actual)) => compare(actual, bound) == Some(Ordering::Less),
            (Condition::Gt(bound), Some(actual)) => {
                compare(actual, bound) == Some(Ordering::Greater)
            }
            (Condition::Text(needle), Some(Value::String(haystack))) => {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            }
            _ => false,
        }
    }
}

/// Numbers compare numerically, strings lexically (RFC 3339 timestamps sort correctly)
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of per-field conditions on top-level document fields.
///
/// An empty query matches every document in a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<(String, Condition)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().eq(ID_FIELD, id.into())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Eq(value.into())));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions.push((field.into(), Condition::In(values)));
        self
    }

    pub fn lt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Lt(value.into())));
        self
    }

    pub fn gt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Gt(value.into())));
        self
    }

    pub fn text(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push((field.into(), Condition::Text(needle.into())));
        self
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(document.get(field)))
    }
}

/// Secondary index over top-level fields of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub fields: Vec<String>,
    pub unique: bool,
}

impl Index {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// `username` or `owner_status`
    pub fn name(&self) -> String {
        self.fields.join("_")
    }

    /// The indexed values of `document`, or `None` when any field is missing or null
    pub(crate) fn key(&self, document: &Value) -> Option<Vec<Value>> {
        self.fields
            .iter()
            .map(|field| document.get(field).filter(|v| !v.is_null()).cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Paging and ordering for [`DocumentStore::find_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub limit: Option<usize>,
    pub skip: usize,
    pub sort: Option<(String, SortOrder)>,
}

impl FindOptions {
    pub fn sorted_by(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            sort: Some((field.into(), order)),
            ..Default::default()
        }
    }

    pub(crate) fn apply(&self, mut documents: Vec<Value>) -> Vec<Value> {
        if let Some((field, order)) = &self.sort {
            documents.sort_by(|a, b| {
                let ordering = match (a.get(field), b.get(field)) {
                    (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
        let paged = documents.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => paged.take(limit).collect(),
            None => paged.collect(),
        }
    }
}

/// Collection-oriented JSON document storage.
///
/// Documents are JSON objects carrying a string `_id`. Misses are reported as
/// `Ok(None)` / `Ok(0)`, never as errors.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, document: Value) -> Result<(), DatabaseError>;

    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Value>, DatabaseError>;

    async fn find_all(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>, DatabaseError>;

    /// Merge `changes` into the first matching document and return the result
    async fn update(
        &self,
        collection: &str,
        query: &Query,
        changes: Map<String, Value>,
    ) -> Result<Option<Value>, DatabaseError>;

    /// Remove every matching document, returning how many were removed
    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError>;

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError>;

    async fn drop_collection(&self, collection: &str) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;

    /// Create `index` on `collection` if it does not exist yet. Unique
    /// indexes make later writes that collide fail with `Duplicate`.
    async fn ensure_index(&self, collection: &str, index: &Index) -> Result<(), DatabaseError>;

    async fn exists(&self, collection: &str, query: &Query) -> Result<bool, DatabaseError> {
        Ok(self.find_one(collection, query).await?.is_some())
    }

    async fn remove_all(&self, collection: &str) -> Result<u64, DatabaseError> {
        self.remove(collection, &Query::new()).await
    }
}
