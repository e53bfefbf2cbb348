use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::database::manager::DatabaseError;
use crate::tenant::DbCredentials;

/// One row as returned by either backend: column name → JSON value
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            // unique_violation
            if db.code().as_deref() == Some("23505") {
                return StoreError::Conflict(db.message().to_string());
            }
        }
        if matches!(err, sqlx::Error::RowNotFound) {
            return StoreError::NotFound("Record not found".to_string());
        }
        StoreError::Database(DatabaseError::Sqlx(err))
    }
}

/// Fully qualified physical table plus the credentials used to reach it
#[derive(Debug, Clone)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
    pub credentials: Option<DbCredentials>,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<DbCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        for ident in [&self.schema, &self.name] {
            if !is_valid_identifier(ident) {
                return Err(StoreError::InvalidIdentifier(ident.clone()));
            }
        }
        Ok(())
    }

    /// `"schema"."table"`
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_identifier(&self.schema), quote_identifier(&self.name))
    }
}

/// Equality conditions, an optional ordering column and a row limit
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub conditions: Vec<(String, Value)>,
    pub order_by: Option<(String, bool)>,
    pub limit: Option<i64>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn order_asc(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some((column.into(), false));
        self
    }

    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some((column.into(), true));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit.max(0));
        self
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let columns = self
            .conditions
            .iter()
            .map(|(c, _)| c)
            .chain(self.order_by.iter().map(|(c, _)| c));
        for column in columns {
            if !is_valid_identifier(column) {
                return Err(StoreError::InvalidIdentifier(column.clone()));
            }
        }
        Ok(())
    }
}

/// Minimal CRUD surface shared by the Postgres and PostgREST backends
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &TableRef, filter: &RowFilter) -> Result<Vec<Row>, StoreError>;

    /// Inserts one row and returns it as stored (defaults and ids filled in)
    async fn insert(&self, table: &TableRef, row: Row) -> Result<Row, StoreError>;

    /// Applies `patch` to every row matching `filter`, returning the updated rows
    async fn update(&self, table: &TableRef, filter: &RowFilter, patch: Row) -> Result<Vec<Row>, StoreError>;

    /// Returns the number of deleted rows
    async fn delete(&self, table: &TableRef, filter: &RowFilter) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Releases pooled connections on shutdown
    async fn close(&self) {}

    async fn select_one(&self, table: &TableRef, filter: &RowFilter) -> Result<Option<Row>, StoreError> {
        let filter = filter.clone().limit(1);
        Ok(self.select(table, &filter).await?.into_iter().next())
    }
}

/// Deserialize a store row into a typed record
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Serialize a typed record into a store row, dropping nulls so column defaults apply
pub fn to_row<T: serde::Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::Decode(e.to_string()))? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(StoreError::Decode(format!("expected object, got {}", other))),
    }
}

/// Text form used when comparing a column against a filter value
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Accepts `[A-Za-z0-9_]+`, which covers every schema, table and column name we generate
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.len() <= 63 && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote SQL identifier to prevent injection
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
