use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::database::store::{from_row, RowFilter, TableRef, TableStore};
use crate::tenant::{domain_of, TenantContext, TenantDefinition, TenantError, TenantSummary};

/// Maps email domains and tenant keys to tenant contexts.
///
/// Every lookup either yields a context or a defined error; nothing is cached
/// between requests.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    async fn resolve_domain(&self, domain: &str) -> Result<TenantContext, TenantError>;

    async fn resolve_key(&self, key: &str) -> Result<TenantContext, TenantError>;

    async fn list(&self) -> Result<Vec<TenantSummary>, TenantError>;

    async fn resolve(&self, email: &str) -> Result<TenantContext, TenantError> {
        let domain = domain_of(email)?;
        let tenant = self.resolve_domain(&domain).await?;
        debug!("Resolved {} to tenant {}", domain, tenant.key);
        Ok(tenant)
    }
}

/// In-process mapping loaded from configuration
#[derive(Debug, Clone)]
pub struct StaticTenants {
    by_domain: HashMap<String, TenantDefinition>,
}

impl StaticTenants {
    pub fn new(definitions: Vec<TenantDefinition>) -> Result<Self, TenantError> {
        let mut by_domain = HashMap::new();
        for definition in definitions {
            definition.validate()?;
            by_domain.insert(definition.domain.to_lowercase(), definition);
        }
        Ok(Self { by_domain })
    }
}

#[async_trait]
impl TenantResolver for StaticTenants {
    async fn resolve_domain(&self, domain: &str) -> Result<TenantContext, TenantError> {
        let domain = domain.trim().to_lowercase();
        self.by_domain
            .get(&domain)
            .ok_or(TenantError::UnsupportedDomain(domain))?
            .to_context()
    }

    async fn resolve_key(&self, key: &str) -> Result<TenantContext, TenantError> {
        self.by_domain
            .values()
            .find(|d| d.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| TenantError::UnknownTenant(key.to_string()))?
            .to_context()
    }

    async fn list(&self) -> Result<Vec<TenantSummary>, TenantError> {
        let mut tenants: Vec<_> = self.by_domain.values().map(TenantDefinition::summary).collect();
        tenants.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(tenants)
    }
}

/// One row of the `tenants` table
#[derive(Debug, Deserialize)]
struct TenantRow {
    key: String,
    domain: String,
    #[serde(default)]
    schema_name: Option<String>,
    table_prefix: String,
    #[serde(default)]
    db_user: Option<String>,
    #[serde(default)]
    db_password_env: Option<String>,
    #[serde(default = "default_active")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

impl From<TenantRow> for TenantDefinition {
    fn from(row: TenantRow) -> Self {
        let mut definition = TenantDefinition::new(&row.key, &row.domain, &row.table_prefix);
        if let Some(schema) = row.schema_name.filter(|s| !s.is_empty()) {
            definition.schema = schema;
        }
        definition.db_user = row.db_user;
        definition.db_password_env = row.db_password_env;
        definition
    }
}

/// Mapping read from the `tenants` table through any `TableStore`
#[derive(Clone)]
pub struct StoredTenants {
    store: Arc<dyn TableStore>,
    table: TableRef,
}

impl StoredTenants {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self::with_table(store, TableRef::new("public", "tenants"))
    }

    pub fn with_table(store: Arc<dyn TableStore>, table: TableRef) -> Self {
        Self { store, table }
    }

    async fn find(&self, column: &str, value: &str) -> Result<Option<TenantDefinition>, TenantError> {
        let filter = RowFilter::new().eq(column, value);
        let rows = self.store.select(&self.table, &filter).await?;
        for row in rows {
            let row: TenantRow = from_row(row)?;
            if row.is_active {
                return Ok(Some(row.into()));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl TenantResolver for StoredTenants {
    async fn resolve_domain(&self, domain: &str) -> Result<TenantContext, TenantError> {
        let domain = domain.trim().to_lowercase();
        match self.find("domain", &domain).await? {
            Some(definition) => definition.to_context(),
            None => Err(TenantError::UnsupportedDomain(domain)),
        }
    }

    async fn resolve_key(&self, key: &str) -> Result<TenantContext, TenantError> {
        match self.find("key", key).await? {
            Some(definition) => definition.to_context(),
            None => Err(TenantError::UnknownTenant(key.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<TenantSummary>, TenantError> {
        let rows = self
            .store
            .select(&self.table, &RowFilter::new().order_asc("key"))
            .await?;
        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            let row: TenantRow = from_row(row)?;
            if row.is_active {
                tenants.push(TenantDefinition::from(row).summary());
            }
        }
        Ok(tenants)
    }
}
