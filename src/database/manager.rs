use sha2::{Digest, Sha256};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::tenant::DbCredentials;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Lazily created connection pools, one per database role.
///
/// Tenants that carry their own credentials get a pool connected as that
/// role; everything else shares the pool built from `DATABASE_URL` as-is.
#[derive(Clone)]
pub struct DatabaseManager {
    base_url: Option<String>,
    max_connections: u32,
    connect_timeout: Duration,
    pools: Arc<RwLock<HashMap<String, PgPool>>>,
}

impl DatabaseManager {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            base_url: config.url.clone(),
            max_connections: config.max_connections,
            connect_timeout: Duration::from_secs(config.connection_timeout),
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Pool for the default role
    pub async fn main_pool(&self) -> Result<PgPool, DatabaseError> {
        self.pool_for(None).await
    }

    /// Pool for the given credentials, or the default role when `None`
    pub async fn pool_for(&self, credentials: Option<&DbCredentials>) -> Result<PgPool, DatabaseError> {
        let key = Self::pool_key(credentials);

        // Fast path: try read lock
        {
            let pools = self.pools.read().await;
            if let Some(pool) = pools.get(&key) {
                return Ok(pool.clone());
            }
        }

        let connection_string = self.build_connection_string(credentials)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(&connection_string)
            .await?;

        // Another task may have raced us here; keep whichever landed first
        let mut pools = self.pools.write().await;
        let pool = pools.entry(key).or_insert(pool).clone();

        info!(
            "Created database pool for role: {}",
            credentials.map(|c| c.user.as_str()).unwrap_or("default")
        );
        Ok(pool)
    }

    /// Swap the tenant role and password into DATABASE_URL
    fn build_connection_string(&self, credentials: Option<&DbCredentials>) -> Result<String, DatabaseError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if let Some(credentials) = credentials {
            url.set_username(&credentials.user)
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
            url.set_password(credentials.password.as_deref())
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        Ok(url.into())
    }

    /// Cache key that changes when the password does, without holding the password itself
    fn pool_key(credentials: Option<&DbCredentials>) -> String {
        match credentials {
            None => "default".to_string(),
            Some(c) => {
                let mut hasher = Sha256::new();
                hasher.update(c.user.as_bytes());
                hasher.update([0u8]);
                hasher.update(c.password.as_deref().unwrap_or("").as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                format!("{}:{}", c.user, &digest[..16])
            }
        }
    }

    /// Pings the default pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        let pool = self.main_pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Close and remove all pools (e.g., on shutdown)
    pub async fn close_all(&self) {
        let mut pools = self.pools.write().await;
        for (name, pool) in pools.drain() {
            pool.close().await;
            info!("Closed database pool: {}", name.split(':').next().unwrap_or("default"));
        }
    }
}
