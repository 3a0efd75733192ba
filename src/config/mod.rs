use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub storage: StorageBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Which backend holds the tenant directory and partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub master_database: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub token_ttl_minutes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set outside development")]
    MissingJwtSecret,
    #[error("DATABASE_URL must be set for the postgres storage backend")]
    MissingDatabaseUrl,
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Longest accepted token lifetime: one year
pub const MAX_TOKEN_TTL_MINUTES: u64 = 60 * 24 * 365;

/// Secret used only when running in development without JWT_SECRET
const DEVELOPMENT_JWT_SECRET: &str = "development-only-secret-change-me";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_storage(None)
    }

    /// Like `from_env`, but a command-line storage choice wins over STORAGE_BACKEND
    pub fn from_env_with_storage(storage: Option<StorageBackend>) -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()?;

        if let Some(storage) = storage {
            config.storage = storage;
        }

        config.validate()?;
        Ok(config)
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("MASTER_DB") {
            self.database.master_database = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Ok(v) = env::var("API_BIND_ADDR") {
            self.api.bind_addr = v;
        }
        if let Some(v) = env::var("ORG_API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ALGORITHM") {
            self.security.jwt_algorithm = v;
        }
        if let Ok(v) = env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.security.token_ttl_minutes = v.parse().unwrap_or(self.security.token_ttl_minutes);
        }

        // Storage backend
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            self.storage = StorageBackend::parse(&v).ok_or(ConfigError::InvalidValue {
                key: "STORAGE_BACKEND",
                value: v,
            })?;
        }

        Ok(self)
    }

    /// Reject configurations that cannot serve requests
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }
        if self.storage == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        let ttl = self.security.token_ttl_minutes;
        if ttl == 0 || ttl > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::InvalidValue {
                key: "ACCESS_TOKEN_EXPIRE_MINUTES",
                value: ttl.to_string(),
            });
        }
        Ok(())
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                master_database: "org_master".to_string(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8000,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                jwt_algorithm: "HS256".to_string(),
                token_ttl_minutes: 60,
            },
            storage: StorageBackend::Postgres,
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                master_database: "org_master".to_string(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8000,
                enable_request_logging: true,
                max_request_size_bytes: 512 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_algorithm: "HS256".to_string(),
                token_ttl_minutes: 60,
            },
            storage: StorageBackend::Postgres,
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: None,
                master_database: "org_master".to_string(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8000,
                enable_request_logging: false,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                jwt_secret: String::new(),
                jwt_algorithm: "HS256".to_string(),
                token_ttl_minutes: 30,
            },
            storage: StorageBackend::Postgres,
        }
    }

    /// Development defaults backed by in-memory storage
    pub fn in_memory() -> Self {
        Self {
            storage: StorageBackend::Memory,
            ..Self::development()
        }
    }
}

impl StorageBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(StorageBackend::Postgres),
            "memory" | "in-memory" | "mem" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}
