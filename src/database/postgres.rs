use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row as _};

use crate::database::manager::DatabaseManager;
use crate::database::store::{
    is_valid_identifier, quote_identifier, value_as_text, Row, RowFilter, StoreError, TableRef, TableStore,
};

/// `TableStore` over a direct Postgres connection.
///
/// Rows travel as JSON in both directions (`row_to_json` out,
/// `jsonb_populate_record` in) so column types always come from the table
/// definition rather than from the caller.
#[derive(Clone)]
pub struct PgStore {
    manager: DatabaseManager,
}

/// SQL text plus its positional text parameters
#[derive(Debug, PartialEq)]
struct SqlParts {
    sql: String,
    params: Vec<String>,
}

impl PgStore {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }

    async fn pool(&self, table: &TableRef) -> Result<PgPool, StoreError> {
        Ok(self.manager.pool_for(table.credentials.as_ref()).await?)
    }

    /// `WHERE` clause for equality conditions; parameters start at `$first_param`
    fn where_clause(filter: &RowFilter, alias: Option<&str>, first_param: usize) -> SqlParts {
        let mut params = Vec::new();
        let mut parts = Vec::new();
        for (column, value) in &filter.conditions {
            let column = match alias {
                Some(a) => format!("{}.{}", a, quote_identifier(column)),
                None => quote_identifier(column),
            };
            match value_as_text(value) {
                None => parts.push(format!("{} IS NULL", column)),
                Some(text) => {
                    params.push(text);
                    parts.push(format!("{}::text = ${}", column, first_param + params.len() - 1));
                }
            }
        }
        let sql = if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        };
        SqlParts { sql, params }
    }

    fn select_sql(table: &TableRef, filter: &RowFilter) -> SqlParts {
        let SqlParts { sql: where_sql, params } = Self::where_clause(filter, None, 1);
        let mut inner = format!("SELECT * FROM {}{}", table.qualified(), where_sql);
        if let Some((column, descending)) = &filter.order_by {
            inner.push_str(&format!(
                " ORDER BY {} {}",
                quote_identifier(column),
                if *descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = filter.limit {
            inner.push_str(&format!(" LIMIT {}", limit));
        }
        SqlParts {
            sql: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params,
        }
    }

    fn insert_sql(table: &TableRef, row: &Row) -> String {
        if row.is_empty() {
            return format!(
                "INSERT INTO {} AS r DEFAULT VALUES RETURNING row_to_json(r) AS row",
                table.qualified()
            );
        }
        let columns = row
            .keys()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {table} AS r ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) RETURNING row_to_json(r) AS row",
            table = table.qualified(),
            columns = columns,
        )
    }

    fn update_sql(table: &TableRef, filter: &RowFilter, patch: &Row) -> SqlParts {
        let assignments = patch
            .keys()
            .map(|c| format!("{col} = p.{col}", col = quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let SqlParts { sql: where_sql, params } = Self::where_clause(filter, Some("r"), 2);
        SqlParts {
            sql: format!(
                "UPDATE {table} AS r SET {assignments} FROM jsonb_populate_record(NULL::{table}, $1) AS p{where_sql} RETURNING row_to_json(r) AS row",
                table = table.qualified(),
                assignments = assignments,
                where_sql = where_sql,
            ),
            params,
        }
    }

    fn delete_sql(table: &TableRef, filter: &RowFilter) -> SqlParts {
        let SqlParts { sql: where_sql, params } = Self::where_clause(filter, None, 1);
        SqlParts {
            sql: format!("DELETE FROM {}{}", table.qualified(), where_sql),
            params,
        }
    }

    fn json_rows(rows: Vec<PgRow>) -> Result<Vec<Row>, StoreError> {
        rows.into_iter().map(Self::json_row).collect()
    }

    fn json_row(row: PgRow) -> Result<Row, StoreError> {
        let value: Value = row.try_get("row")?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Decode(format!("expected JSON object row, got {}", other))),
        }
    }
}

#[async_trait]
impl TableStore for PgStore {
    async fn select(&self, table: &TableRef, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        let parts = Self::select_sql(table, filter);
        let pool = self.pool(table).await?;

        let mut q = sqlx::query(&parts.sql);
        for p in parts.params {
            q = q.bind(p);
        }
        let rows = q.fetch_all(&pool).await?;
        Self::json_rows(rows)
    }

    async fn insert(&self, table: &TableRef, row: Row) -> Result<Row, StoreError> {
        table.validate()?;
        for column in row.keys() {
            if !is_valid_identifier(column) {
                return Err(StoreError::InvalidIdentifier(column.clone()));
            }
        }
        let sql = Self::insert_sql(table, &row);
        let pool = self.pool(table).await?;

        let inserted = sqlx::query(&sql)
            .bind(Value::Object(row))
            .fetch_one(&pool)
            .await?;
        Self::json_row(inserted)
    }

    async fn update(&self, table: &TableRef, filter: &RowFilter, patch: Row) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        if patch.is_empty() {
            return self.select(table, filter).await;
        }
        for column in patch.keys() {
            if !is_valid_identifier(column) {
                return Err(StoreError::InvalidIdentifier(column.clone()));
            }
        }
        let parts = Self::update_sql(table, filter, &patch);
        let pool = self.pool(table).await?;

        let mut q = sqlx::query(&parts.sql).bind(Value::Object(patch));
        for p in parts.params {
            q = q.bind(p);
        }
        let rows = q.fetch_all(&pool).await?;
        Self::json_rows(rows)
    }

    async fn delete(&self, table: &TableRef, filter: &RowFilter) -> Result<u64, StoreError> {
        table.validate()?;
        filter.validate()?;
        let parts = Self::delete_sql(table, filter);
        let pool = self.pool(table).await?;

        let mut q = sqlx::query(&parts.sql);
        for p in parts.params {
            q = q.bind(p);
        }
        let result = q.execute(&pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.manager.health_check().await?)
    }

    async fn close(&self) {
        self.manager.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usuarios() -> TableRef {
        TableRef::new("public", "tenant_ucb_usuarios")
    }

    #[test]
    fn select_wraps_rows_in_json() {
        let filter = RowFilter::new().eq("email", "ana@ucb.edu.bo").order_desc("id").limit(1);
        let parts = PgStore::select_sql(&usuarios(), &filter);
        assert_eq!(
            parts.sql,
            "SELECT row_to_json(t) AS row FROM (SELECT * FROM \"public\".\"tenant_ucb_usuarios\" WHERE \"email\"::text = $1 ORDER BY \"id\" DESC LIMIT 1) t"
        );
        assert_eq!(parts.params, vec!["ana@ucb.edu.bo".to_string()]);
    }

    #[test]
    fn null_conditions_do_not_bind() {
        let filter = RowFilter::new().eq("completed_at", Value::Null).eq("student_id", 7);
        let parts = PgStore::where_clause(&filter, None, 1);
        assert_eq!(parts.sql, " WHERE \"completed_at\" IS NULL AND \"student_id\"::text = $1");
        assert_eq!(parts.params, vec!["7".to_string()]);
    }

    #[test]
    fn insert_populates_from_json() {
        let mut row = Row::new();
        row.insert("email".into(), json!("ana@ucb.edu.bo"));
        row.insert("nombre".into(), json!("Ana"));
        let sql = PgStore::insert_sql(&usuarios(), &row);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"tenant_ucb_usuarios\" AS r (\"email\", \"nombre\") SELECT \"email\", \"nombre\" FROM jsonb_populate_record(NULL::\"public\".\"tenant_ucb_usuarios\", $1) RETURNING row_to_json(r) AS row"
        );
    }

    #[test]
    fn update_params_start_after_patch() {
        let mut patch = Row::new();
        patch.insert("rol".into(), json!("Profesor"));
        let filter = RowFilter::new().eq("id", 3);
        let parts = PgStore::update_sql(&usuarios(), &filter, &patch);
        assert!(parts.sql.contains("SET \"rol\" = p.\"rol\""));
        assert!(parts.sql.contains("WHERE r.\"id\"::text = $2"));
        assert_eq!(parts.params, vec!["3".to_string()]);
    }

    #[test]
    fn delete_without_conditions_has_no_where() {
        let parts = PgStore::delete_sql(&usuarios(), &RowFilter::new());
        assert_eq!(parts.sql, "DELETE FROM \"public\".\"tenant_ucb_usuarios\"");
        assert!(parts.params.is_empty());
    }

    #[tokio::test]
    async fn ping_and_close_without_database_url() {
        let store = PgStore::new(DatabaseManager::new(&crate::config::DatabaseConfig {
            url: None,
            max_connections: 1,
            connection_timeout: 1,
        }));
        assert!(matches!(
            store.ping().await,
            Err(StoreError::Database(crate::database::DatabaseError::ConfigMissing("DATABASE_URL")))
        ));
        store.close().await;
    }
}
