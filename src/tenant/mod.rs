//! Tenant resolution: email domain → schema, table prefix and database credentials.

pub mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::database::store::{is_valid_identifier, StoreError, TableRef};

pub use resolver::{StaticTenants, StoredTenants, TenantResolver};

#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Domain not supported: {0}")]
    UnsupportedDomain(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Invalid tenant definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Database role a tenant's queries run as
#[derive(Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub user: String,
    pub password: Option<String>,
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// One row of the domain → tenant mapping, as configured or stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantDefinition {
    pub key: String,
    pub domain: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    pub table_prefix: String,
    #[serde(default)]
    pub db_user: Option<String>,
    /// Name of the env var holding the role's password
    #[serde(default)]
    pub db_password_env: Option<String>,
}

fn default_schema() -> String {
    "public".to_string()
}

impl TenantDefinition {
    pub fn new(key: &str, domain: &str, table_prefix: &str) -> Self {
        Self {
            key: key.to_string(),
            domain: domain.to_string(),
            schema: default_schema(),
            table_prefix: table_prefix.to_string(),
            db_user: None,
            db_password_env: None,
        }
    }

    /// Institutions served out of the box
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("ucb", "ucb.edu.bo", "tenant_ucb"),
            Self::new("upb", "upb.edu.bo", "tenant_upb"),
            Self::new("gmail", "gmail.com", "tenant_gmail"),
        ]
    }

    pub fn validate(&self) -> Result<(), TenantError> {
        if self.domain.trim().is_empty() || self.domain.contains('@') {
            return Err(TenantError::InvalidDefinition(format!("bad domain '{}'", self.domain)));
        }
        for (label, ident) in [("key", &self.key), ("schema", &self.schema), ("table_prefix", &self.table_prefix)] {
            if !is_valid_identifier(ident) {
                return Err(TenantError::InvalidDefinition(format!("bad {} '{}'", label, ident)));
            }
        }
        Ok(())
    }

    /// Build the request-scoped context, reading the password from the environment
    pub fn to_context(&self) -> Result<TenantContext, TenantError> {
        self.validate()?;
        let credentials = self.db_user.as_ref().map(|user| DbCredentials {
            user: user.clone(),
            password: self
                .db_password_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok()),
        });
        Ok(TenantContext {
            key: self.key.clone(),
            domain: self.domain.to_lowercase(),
            schema: self.schema.clone(),
            table_prefix: self.table_prefix.clone(),
            credentials,
        })
    }

    pub fn summary(&self) -> TenantSummary {
        TenantSummary {
            key: self.key.clone(),
            domain: self.domain.clone(),
            schema: self.schema.clone(),
            table_prefix: self.table_prefix.clone(),
        }
    }
}

/// Public view of a tenant, safe to return from the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantSummary {
    pub key: String,
    pub domain: String,
    pub schema: String,
    pub table_prefix: String,
}

/// Resolved tenant threaded through every query of a request
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub key: String,
    pub domain: String,
    pub schema: String,
    pub table_prefix: String,
    pub credentials: Option<DbCredentials>,
}

impl TenantContext {
    /// Physical table for an entity, e.g. `usuarios` → `"public"."tenant_ucb_usuarios"`
    pub fn table(&self, entity: &str) -> TableRef {
        TableRef::new(&self.schema, format!("{}_{}", self.table_prefix, entity))
            .with_credentials(self.credentials.clone())
    }

    /// Whether an email address belongs to this tenant
    pub fn owns_email(&self, email: &str) -> bool {
        domain_of(email).map(|d| d == self.domain).unwrap_or(false)
    }
}

/// Lowercased domain after the last `@`
pub fn domain_of(email: &str) -> Result<String, TenantError> {
    let email = email.trim().to_lowercase();
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains(char::is_whitespace) => {
            Ok(domain.to_string())
        }
        _ => Err(TenantError::InvalidEmail(email)),
    }
}
