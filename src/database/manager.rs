use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the directory and partition backends
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid partition name: {0}")]
    InvalidPartitionName(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Translate a unique-constraint violation into `Conflict`, keep anything else
    pub fn from_write(err: sqlx::Error, what: impl Into<String>) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => DatabaseError::Conflict(what.into()),
            _ => DatabaseError::Sqlx(err),
        }
    }
}

/// Directory tables. Uniqueness is enforced here, not by application checks.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS admins (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        organization_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'admin',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS admins_email_key ON admins (email)",
    r#"
    CREATE TABLE IF NOT EXISTS organizations (
        id UUID PRIMARY KEY,
        organization_name TEXT NOT NULL,
        collection_name TEXT NOT NULL,
        admin_user_id UUID NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_name_key ON organizations (organization_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_collection_key ON organizations (collection_name)",
    "CREATE UNIQUE INDEX IF NOT EXISTS organizations_admin_key ON organizations (admin_user_id)",
];

/// Advisory lock key serializing schema bootstrap across processes
const SCHEMA_LOCK_KEY: i64 = 0x6f72_675f_6d67_72;

/// Owns the connection pool for the master database, which holds both the
/// directory tables and every tenant partition table
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Connect to the configured master database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let base = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let connection_string = Self::build_connection_string(base, &config.master_database)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&connection_string)
            .await?;

        info!("Created database pool for: {}", config.master_database);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn build_connection_string(base: &str, database_name: &str) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        // Replace the path to the database name (ensure leading slash)
        url.set_path(&format!("/{}", database_name));
        Ok(url.into())
    }

    /// Create directory tables and unique indexes if they are missing.
    ///
    /// Concurrent `CREATE ... IF NOT EXISTS` can still collide in the catalog,
    /// so bootstrap holds a transaction-scoped advisory lock.
    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("Directory schema ready");
        Ok(())
    }

    /// Quote SQL identifier to prevent injection
    pub(crate) fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
