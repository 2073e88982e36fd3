use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use tracing::info;

use super::store::{
    Condition, DatabaseError, DocumentStore, FindOptions, Index, Query, SortOrder, ID_FIELD,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        body JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )
"#;

const BODY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS documents_body_idx ON documents USING GIN (body jsonb_path_ops)";

/// PostgreSQL backend storing every collection in one JSONB table
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_name` on the server named by `base_url` and make
    /// sure the documents table exists.
    pub async fn connect(base_url: &str, database_name: &str, max_connections: u32) -> Result<Self, DatabaseError> {
        let connection_string = build_connection_string(base_url, database_name)?;
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(&connection_string)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!("Connected document store to database: {}", database_name);
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(BODY_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

/// Replace the path of `base_url` with the database name
fn build_connection_string(base_url: &str, database_name: &str) -> Result<String, DatabaseError> {
    if database_name.is_empty()
        || !database_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DatabaseError::InvalidDatabaseUrl);
    }
    let mut url = url::Url::parse(base_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
    url.set_path(&format!("/{}", database_name));
    Ok(url.into())
}

/// `%needle%` with LIKE wildcards in `needle` matched literally
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Collection and field names are spliced into index DDL, which cannot take binds
fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn index_statement(collection: &str, index: &Index) -> Result<String, DatabaseError> {
    if !is_identifier(collection) || index.fields.is_empty() || !index.fields.iter().all(|f| is_identifier(f)) {
        return Err(DatabaseError::QueryError(format!(
            "invalid index {:?} on `{}`",
            index.fields, collection
        )));
    }
    let columns = index
        .fields
        .iter()
        .map(|field| format!("(body ->> '{}')", field))
        .collect::<Vec<_>>()
        .join(", ");
    let (kind, suffix) = if index.unique { ("UNIQUE INDEX", "key") } else { ("INDEX", "idx") };
    Ok(format!(
        "CREATE {} IF NOT EXISTS documents_{}_{}_{} ON documents ({}) WHERE collection = '{}'",
        kind,
        collection,
        index.name(),
        suffix,
        columns,
        collection
    ))
}

/// Unique index collisions surface as `Duplicate`, like the memory store
fn write_error(e: sqlx::Error, collection: &str) -> DatabaseError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return DatabaseError::Duplicate(format!("Duplicate key in `{}`", collection));
        }
    }
    e.into()
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, collection: &str, query: &Query) {
    builder.push(" WHERE collection = ");
    builder.push_bind(collection.to_string());

    for (field, condition) in query.conditions() {
        builder.push(" AND ");
        match condition {
            // Missing fields compare equal to null, as in the memory store
            Condition::Eq(value) => {
                builder.push("COALESCE(body -> ");
                builder.push_bind(field.clone());
                builder.push(", 'null'::jsonb) = ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::In(values) => {
                builder.push("jsonb_build_array(body -> ");
                builder.push_bind(field.clone());
                builder.push(") <@ ");
                builder.push_bind(Json(Value::Array(values.clone())));
            }
            Condition::Lt(value) => {
                builder.push("(body -> ");
                builder.push_bind(field.clone());
                builder.push(") < ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::Gt(value) => {
                builder.push("(body -> ");
                builder.push_bind(field.clone());
                builder.push(") > ");
                builder.push_bind(Json(value.clone()));
            }
            Condition::Text(needle) => {
                builder.push("(body ->> ");
                builder.push_bind(field.clone());
                builder.push(") ILIKE ");
                builder.push_bind(like_pattern(needle));
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, collection: &str, document: Value) -> Result<(), DatabaseError> {
        let id = document
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DatabaseError::QueryError(format!("document has no string `{}`", ID_FIELD))
            })?;

        let result = sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(document))
        .execute(&self.pool)
        .await?;

        // Either the id or a unique index collided
        if result.rows_affected() == 0 {
            return Err(DatabaseError::Duplicate(format!("Duplicate key in `{}`", collection)));
        }
        Ok(())
    }

    async fn find_one(&self, collection: &str, query: &Query) -> Result<Option<Value>, DatabaseError> {
        let mut builder = QueryBuilder::new("SELECT body FROM documents");
        push_filter(&mut builder, collection, query);
        builder.push(" LIMIT 1");

        let row = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(body)| body))
    }

    async fn find_all(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> Result<Vec<Value>, DatabaseError> {
        let mut builder = QueryBuilder::new("SELECT body FROM documents");
        push_filter(&mut builder, collection, query);

        if let Some((field, order)) = &options.sort {
            builder.push(" ORDER BY body -> ");
            builder.push_bind(field.clone());
            builder.push(match order {
                SortOrder::Ascending => " ASC",
                SortOrder::Descending => " DESC",
            });
        }
        if let Some(limit) = options.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        if options.skip > 0 {
            builder.push(" OFFSET ");
            builder.push_bind(options.skip as i64);
        }

        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(body)| body).collect())
    }

    async fn update(
        &self,
        collection: &str,
        query: &Query,
        mut changes: Map<String, Value>,
    ) -> Result<Option<Value>, DatabaseError> {
        changes.remove(ID_FIELD);

        let mut builder = QueryBuilder::new("UPDATE documents SET body = body || ");
        builder.push_bind(Json(Value::Object(changes)));
        builder.push(" WHERE collection = ");
        builder.push_bind(collection.to_string());
        builder.push(" AND id = (SELECT id FROM documents");
        push_filter(&mut builder, collection, query);
        builder.push(" LIMIT 1) RETURNING body");

        let row = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, collection))?;
        Ok(row.map(|Json(body)| body))
    }

    async fn remove(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError> {
        let mut builder = QueryBuilder::new("DELETE FROM documents");
        push_filter(&mut builder, collection, query);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, DatabaseError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM documents");
        push_filter(&mut builder, collection, query);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn ensure_index(&self, collection: &str, index: &Index) -> Result<(), DatabaseError> {
        let statement = index_statement(collection, index)?;
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, collection))?;
        info!("Ensured index {} on collection {}", index.name(), collection);
        Ok(())
    }
}
