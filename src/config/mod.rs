use anyhow::Context;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

use crate::tenant::TenantDefinition;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub backend: BackendConfig,
    pub identity: IdentityConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base connection string; tenant credentials are swapped into it
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Where rows live and where the domain→tenant table lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSource {
    /// Built-in table or TENANTS_FILE
    Static,
    /// `tenants` table read through the configured store
    Store,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub store: StoreBackend,
    pub tenant_source: TenantSource,
    pub tenants: Vec<TenantDefinition>,
    /// YAML file replacing `tenants`; read by `load_tenants`
    pub tenants_file: Option<String>,
    pub http_timeout_secs: u64,
}

impl BackendConfig {
    /// Static tenant table: the file named by TENANTS_FILE when set, else the built-in list.
    /// A file that cannot be read or validated is an error, never a silent fallback.
    pub fn load_tenants(&self) -> anyhow::Result<Vec<TenantDefinition>> {
        match &self.tenants_file {
            Some(path) => {
                let tenants =
                    load_tenants_file(path).with_context(|| format!("invalid TENANTS_FILE {}", path))?;
                if tenants.is_empty() {
                    anyhow::bail!("TENANTS_FILE {} defines no tenants", path);
                }
                Ok(tenants)
            }
            None => Ok(self.tenants.clone()),
        }
    }
}

/// Identity provider and hosted REST backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub anon_key: Option<String>,
    #[serde(skip_serializing)]
    pub service_role_key: Option<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Some(port) = env::var("CAMPUS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Database
        self.database.url = non_empty_var("DATABASE_URL");
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Backend selection
        match env::var("STORE_BACKEND").as_deref() {
            Ok("rest") | Ok("supabase") => self.backend.store = StoreBackend::Rest,
            Ok("postgres") | Ok("pg") => self.backend.store = StoreBackend::Postgres,
            _ => {}
        }
        match env::var("TENANT_SOURCE").as_deref() {
            Ok("store") | Ok("database") | Ok("rest") => self.backend.tenant_source = TenantSource::Store,
            Ok("static") => self.backend.tenant_source = TenantSource::Static,
            _ => {}
        }
        if let Ok(v) = env::var("HTTP_TIMEOUT_SECS") {
            self.backend.http_timeout_secs = v.parse().unwrap_or(self.backend.http_timeout_secs);
        }
        self.backend.tenants_file = non_empty_var("TENANTS_FILE");

        // Identity provider
        self.identity.url = non_empty_var("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());
        self.identity.anon_key = non_empty_var("SUPABASE_ANON_KEY");
        self.identity.service_role_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY");
        self.identity.jwt_secret = non_empty_var("SUPABASE_JWT_SECRET").or_else(|| non_empty_var("JWT_SECRET"));
        if let Some(aud) = non_empty_var("JWT_AUDIENCE") {
            self.identity.jwt_audience = Some(aud);
        }
        self.identity.jwt_issuer = non_empty_var("JWT_ISSUER")
            .or_else(|| self.identity.url.as_ref().map(|u| format!("{}/auth/v1", u)));

        // Security
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Logging
        if let Ok(v) = env::var("RUST_LOG") {
            self.logging.filter = v;
        }
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => self.logging.json = true,
            Ok("text") => self.logging.json = false,
            _ => {}
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            backend: BackendConfig {
                store: StoreBackend::Postgres,
                tenant_source: TenantSource::Static,
                tenants: TenantDefinition::defaults(),
                tenants_file: None,
                http_timeout_secs: 10,
            },
            identity: IdentityConfig {
                jwt_audience: Some("authenticated".to_string()),
                ..Default::default()
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string(), "http://localhost:3000".to_string()],
            },
            logging: LoggingConfig {
                filter: "campus_api=debug,tower_http=debug".to_string(),
                json: false,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            logging: LoggingConfig {
                filter: "campus_api=info,tower_http=info".to_string(),
                json: true,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec![],
            },
            logging: LoggingConfig {
                filter: "campus_api=info,tower_http=warn".to_string(),
                json: true,
            },
            ..Self::development()
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Reads a YAML list of tenant definitions
pub fn load_tenants_file(path: &str) -> anyhow::Result<Vec<TenantDefinition>> {
    let raw = std::fs::read_to_string(path)?;
    parse_tenants_yaml(&raw)
}

pub fn parse_tenants_yaml(raw: &str) -> anyhow::Result<Vec<TenantDefinition>> {
    let tenants: Vec<TenantDefinition> = serde_yaml::from_str(raw)?;
    for tenant in &tenants {
        tenant.validate()?;
    }
    Ok(tenants)
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
