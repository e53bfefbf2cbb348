use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::database::store::{value_as_text, Row, RowFilter, StoreError, TableRef, TableStore};

/// `TableStore` over a hosted PostgREST endpoint (`<base>/rest/v1/<table>`).
///
/// Authenticates with the service key; the tenant schema is selected with the
/// `Accept-Profile` / `Content-Profile` headers when it is not `public`.
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &TableRef) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name)
    }

    /// PostgREST horizontal filtering: `col=eq.value`, `col=is.null`, `order=col.desc`, `limit=n`
    fn query_pairs(filter: &RowFilter) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = filter
            .conditions
            .iter()
            .map(|(column, value)| match value_as_text(value) {
                Some(text) => (column.clone(), format!("eq.{}", text)),
                None => (column.clone(), "is.null".to_string()),
            })
            .collect();
        if let Some((column, descending)) = &filter.order_by {
            let direction = if *descending { "desc" } else { "asc" };
            pairs.push(("order".to_string(), format!("{}.{}", column, direction)));
        }
        if let Some(limit) = filter.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    fn request(&self, method: Method, table: &TableRef) -> RequestBuilder {
        let is_read = method == Method::GET;
        let mut builder = self
            .client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key));

        if table.schema != "public" {
            let profile_header = if is_read { "Accept-Profile" } else { "Content-Profile" };
            builder = builder.header(profile_header, &table.schema);
        }
        builder
    }

    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);

        Err(match status {
            StatusCode::CONFLICT => StoreError::Conflict(message),
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            _ => StoreError::Upstream {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let value: Value = response.json().await?;
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(StoreError::Decode(format!("expected object, got {}", other))),
                })
                .collect(),
            Value::Object(map) => Ok(vec![map]),
            other => Err(StoreError::Decode(format!("expected array, got {}", other))),
        }
    }
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, table: &TableRef, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(Self::query_pairs(filter));

        debug!("REST select {} {:?}", table.name, pairs);
        let response = self.request(Method::GET, table).query(&pairs).send().await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn insert(&self, table: &TableRef, row: Row) -> Result<Row, StoreError> {
        table.validate()?;
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        Self::rows(Self::check(response).await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert returned no representation".to_string()))
    }

    async fn update(&self, table: &TableRef, filter: &RowFilter, patch: Row) -> Result<Vec<Row>, StoreError> {
        table.validate()?;
        filter.validate()?;
        let response = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&Self::query_pairs(filter))
            .json(&patch)
            .send()
            .await?;
        Self::rows(Self::check(response).await?).await
    }

    async fn delete(&self, table: &TableRef, filter: &RowFilter) -> Result<u64, StoreError> {
        table.validate()?;
        filter.validate()?;
        let response = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(&Self::query_pairs(filter))
            .send()
            .await?;
        let deleted = Self::rows(Self::check(response).await?).await?;
        Ok(deleted.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(format!("{}/rest/v1/", self.base_url))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await?;
        Self::check(response).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_postgrest_filters() {
        let filter = RowFilter::new()
            .eq("curso_id", 4)
            .eq("is_active", true)
            .eq("completed_at", Value::Null)
            .order_desc("created_at")
            .limit(10);
        let pairs = RestStore::query_pairs(&filter);
        assert_eq!(
            pairs,
            vec![
                ("curso_id".to_string(), "eq.4".to_string()),
                ("is_active".to_string(), "eq.true".to_string()),
                ("completed_at".to_string(), "is.null".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn table_url_uses_bare_table_name() {
        let store = RestStore::new("https://example.supabase.co/", "key", Duration::from_secs(1)).unwrap();
        let table = TableRef::new("tenant_ucb", "tenant_ucb_usuarios");
        assert_eq!(
            store.table_url(&table),
            "https://example.supabase.co/rest/v1/tenant_ucb_usuarios"
        );
    }

    mod against_stub {
        use super::*;
        use axum::{
            extract::RawQuery,
            http::HeaderMap,
            routing::get,
            Json, Router,
        };
        use serde_json::json;

        /// Echoes the request back as a single PostgREST row
        async fn echo(method: Method, headers: HeaderMap, RawQuery(query): RawQuery) -> Json<Value> {
            let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
            Json(json!([{
                "id": 1,
                "method": method.as_str(),
                "apikey": header("apikey"),
                "accept_profile": header("accept-profile"),
                "content_profile": header("content-profile"),
                "query": query,
            }]))
        }

        async fn stub() -> RestStore {
            let app = Router::new()
                .route("/rest/v1/tenant_ucb_usuarios", get(echo).post(echo).patch(echo))
                .route(
                    "/rest/v1/tenant_ucb_dupes",
                    get(echo).post(|| async {
                        (StatusCode::CONFLICT, Json(json!({"message": "duplicate key value violates unique constraint"})))
                    }),
                )
                .route(
                    "/rest/v1/tenant_ucb_missing",
                    get(|| async { (StatusCode::NOT_FOUND, Json(json!({"message": "relation does not exist"}))) }),
                )
                .route(
                    "/rest/v1/tenant_ucb_broken",
                    get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
                );

            let port = portpicker::pick_unused_port().expect("free port");
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            RestStore::new(&format!("http://127.0.0.1:{}", port), "service-key", Duration::from_secs(5)).unwrap()
        }

        #[tokio::test]
        async fn reads_send_accept_profile_for_tenant_schemas() {
            let store = stub().await;
            let filter = RowFilter::new().eq("rol", "Profesor").limit(5);

            let rows = store
                .select(&TableRef::new("ucb", "tenant_ucb_usuarios"), &filter)
                .await
                .unwrap();
            assert_eq!(rows[0]["method"], "GET");
            assert_eq!(rows[0]["apikey"], "service-key");
            assert_eq!(rows[0]["accept_profile"], "ucb");
            assert!(rows[0]["content_profile"].is_null());
            let query = rows[0]["query"].as_str().unwrap();
            assert!(query.contains("rol=eq.Profesor"), "{}", query);
            assert!(query.contains("limit=5"), "{}", query);

            let rows = store
                .select(&TableRef::new("public", "tenant_ucb_usuarios"), &RowFilter::new())
                .await
                .unwrap();
            assert!(rows[0]["accept_profile"].is_null());
        }

        #[tokio::test]
        async fn writes_send_content_profile() {
            let store = stub().await;
            let table = TableRef::new("ucb", "tenant_ucb_usuarios");

            let mut patch = Row::new();
            patch.insert("rol".into(), json!("Director"));
            let updated = store
                .update(&table, &RowFilter::new().eq("id", 1), patch.clone())
                .await
                .unwrap();
            assert_eq!(updated[0]["method"], "PATCH");
            assert_eq!(updated[0]["content_profile"], "ucb");
            assert!(updated[0]["accept_profile"].is_null());

            let inserted = store.insert(&table, patch).await.unwrap();
            assert_eq!(inserted["method"], "POST");
            assert_eq!(inserted["content_profile"], "ucb");
        }

        #[tokio::test]
        async fn maps_error_statuses() {
            let store = stub().await;

            let dupes = TableRef::new("public", "tenant_ucb_dupes");
            match store.insert(&dupes, Row::new()).await {
                Err(StoreError::Conflict(msg)) => assert!(msg.contains("duplicate key")),
                other => panic!("expected conflict, got {:?}", other),
            }

            let missing = TableRef::new("public", "tenant_ucb_missing");
            match store.select(&missing, &RowFilter::new()).await {
                Err(StoreError::NotFound(msg)) => assert_eq!(msg, "relation does not exist"),
                other => panic!("expected not found, got {:?}", other),
            }

            let broken = TableRef::new("public", "tenant_ucb_broken");
            match store.select(&broken, &RowFilter::new()).await {
                Err(StoreError::Upstream { status, message }) => {
                    assert_eq!(status, 500);
                    assert_eq!(message, "boom");
                }
                other => panic!("expected upstream error, got {:?}", other),
            }
        }
    }
}
