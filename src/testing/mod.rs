//! In-memory `TableStore` for unit and router tests.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{self, AtomicUsize};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::database::store::{value_as_text, Row, RowFilter, StoreError, TableRef, TableStore};
use crate::tenant::{TenantContext, TenantDefinition};

/// Context for the built-in `ucb.edu.bo` tenant
pub fn ucb() -> TenantContext {
    TenantDefinition::new("ucb", "ucb.edu.bo", "tenant_ucb")
        .to_context()
        .expect("valid tenant")
}

#[derive(Default)]
struct Table {
    rows: Vec<Row>,
    next_id: i64,
}

/// Tables keyed by `schema.name`. Rows without an `id` get the next integer id;
/// columns registered with `unique` reject duplicates with `StoreError::Conflict`.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Table>>,
    unique: Mutex<Vec<(String, String)>>,
}

fn key(table: &TableRef) -> String {
    format!("{}.{}", table.schema, table.name)
}

fn matches(row: &Row, filter: &RowFilter) -> bool {
    filter.conditions.iter().all(|(column, expected)| {
        let actual = row.get(column).unwrap_or(&Value::Null);
        value_as_text(actual) == value_as_text(expected)
    })
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => value_as_text(x).cmp(&value_as_text(y)),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `column` of `table` as a unique key
    pub fn unique(self, table: &TableRef, column: &str) -> Self {
        self.unique.lock().unwrap().push((key(table), column.to_string()));
        self
    }

    /// Insert fixture rows, assigning ids the same way `insert` does
    pub fn seed(&self, table: &TableRef, rows: Vec<Value>) {
        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(key(table)).or_default();
        for value in rows {
            if let Value::Object(row) = value {
                Self::push(entry, row);
            }
        }
    }

    /// Snapshot of a table's rows in insertion order
    pub fn rows(&self, table: &TableRef) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(&key(table))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn push(table: &mut Table, mut row: Row) -> Row {
        match row.get("id").and_then(Value::as_i64) {
            Some(id) => table.next_id = table.next_id.max(id),
            None if !row.contains_key("id") => {
                table.next_id += 1;
                row.insert("id".to_string(), Value::from(table.next_id));
            }
            None => {}
        }
        table.rows.push(row.clone());
        row
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &TableRef, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Row> = tables
            .get(&key(table))
            .map(|t| t.rows.iter().filter(|r| matches(r, filter)).cloned().collect())
            .unwrap_or_default();

        if let Some((column, descending)) = &filter.order_by {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(column), b.get(column));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        if let Some(limit) = filter.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &TableRef, row: Row) -> Result<Row, StoreError> {
        table.validate()?;
        let table_key = key(table);
        let unique: Vec<String> = self
            .unique
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == table_key)
            .map(|(_, c)| c.clone())
            .collect();

        let mut tables = self.tables.lock().unwrap();
        let entry = tables.entry(table_key).or_default();
        for column in unique {
            let value = row.get(&column).and_then(value_as_text);
            if value.is_some() && entry.rows.iter().any(|r| r.get(&column).and_then(value_as_text) == value) {
                return Err(StoreError::Conflict(format!("duplicate key value violates unique constraint on {}", column)));
            }
        }
        Ok(Self::push(entry, row))
    }

    async fn update(&self, table: &TableRef, filter: &RowFilter, patch: Row) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        let mut tables = self.tables.lock().unwrap();
        let mut updated = Vec::new();
        if let Some(t) = tables.get_mut(&key(table)) {
            for row in t.rows.iter_mut().filter(|r| matches(r, filter)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &TableRef, filter: &RowFilter) -> Result<u64, StoreError> {
        table.validate()?;
        filter.validate()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(t) = tables.get_mut(&key(table)) else {
            return Ok(0);
        };
        let before = t.rows.len();
        t.rows.retain(|r| !matches(r, filter));
        Ok((before - t.rows.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Wraps a `MemoryStore` so selects come back empty for a while, as if another
/// request inserted its row between our read and our write.
pub struct StaleReads {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
    skip: usize,
    misses: usize,
}

impl StaleReads {
    /// The next `misses` selects see nothing
    pub fn new(inner: Arc<MemoryStore>, misses: usize) -> Self {
        Self::after(inner, 0, misses)
    }

    /// The first `skip` selects read normally, the following `misses` see nothing
    pub fn after(inner: Arc<MemoryStore>, skip: usize, misses: usize) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            skip,
            misses,
        }
    }
}

#[async_trait]
impl TableStore for StaleReads {
    async fn select(&self, table: &TableRef, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        let call = self.calls.fetch_add(1, atomic::Ordering::SeqCst);
        if call >= self.skip && call < self.skip + self.misses {
            return Ok(Vec::new());
        }
        self.inner.select(table, filter).await
    }

    async fn insert(&self, table: &TableRef, row: Row) -> Result<Row, StoreError> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &TableRef, filter: &RowFilter, patch: Row) -> Result<Vec<Row>, StoreError> {
        self.inner.update(table, filter, patch).await
    }

    async fn delete(&self, table: &TableRef, filter: &RowFilter) -> Result<u64, StoreError> {
        self.inner.delete(table, filter).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn assigns_ids_and_filters() {
        let store = MemoryStore::new();
        let table = TableRef::new("public", "t_items");
        let mut row = Row::new();
        row.insert("name".into(), json!("a"));
        let first = store.insert(&table, row.clone()).await.unwrap();
        let second = store.insert(&table, row).await.unwrap();
        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));

        let found = store
            .select(&table, &RowFilter::new().eq("id", "2"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let ordered = store
            .select(&table, &RowFilter::new().order_desc("id").limit(1))
            .await
            .unwrap();
        assert_eq!(ordered[0]["id"], json!(2));
    }

    #[tokio::test]
    async fn enforces_registered_unique_columns() {
        let table = TableRef::new("public", "t_users");
        let store = MemoryStore::new().unique(&table, "email");
        let mut row = Row::new();
        row.insert("email".into(), json!("a@b.c"));
        store.insert(&table, row.clone()).await.unwrap();
        assert!(matches!(
            store.insert(&table, row).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn nulls_sort_before_values() {
        let table = TableRef::new("public", "t_threads");
        let store = MemoryStore::new();
        store.seed(
            &table,
            vec![
                json!({"id": 1, "last_activity": "2024-05-02"}),
                json!({"id": 2, "last_activity": null}),
                json!({"id": 3}),
                json!({"id": 4, "last_activity": "2024-05-03"}),
            ],
        );

        let ids = |rows: Vec<Row>| rows.iter().map(|r| r["id"].as_i64().unwrap()).collect::<Vec<_>>();
        let asc = store
            .select(&table, &RowFilter::new().order_asc("last_activity"))
            .await
            .unwrap();
        assert_eq!(&ids(asc)[2..], &[1, 4]);

        let desc = store
            .select(&table, &RowFilter::new().order_desc("last_activity"))
            .await
            .unwrap();
        assert_eq!(&ids(desc)[..2], &[4, 1]);
    }

    #[tokio::test]
    async fn stale_reads_hide_existing_rows_once() {
        let table = TableRef::new("public", "t_items");
        let inner = Arc::new(MemoryStore::new());
        inner.seed(&table, vec![json!({"id": 1})]);
        let store = StaleReads::new(inner, 1);

        assert!(store.select_one(&table, &RowFilter::new()).await.unwrap().is_none());
        assert!(store.select_one(&table, &RowFilter::new()).await.unwrap().is_some());
    }
}
