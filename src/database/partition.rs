//! Tenant partitions: one schema-less document container per organization.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::services::naming::is_valid_partition_name;

/// Opaque tenant document. Only its identifying key is ever inspected.
pub type Document = Map<String, Value>;

/// System-assigned identifying key, stripped when documents are copied
pub const ID_FIELD: &str = "_id";

#[async_trait]
pub trait PartitionManager: Send + Sync {
    /// Create the partition. An existing partition is not an error.
    async fn create_partition(&self, partition: &str) -> Result<(), DatabaseError>;

    /// Remove the partition and all of its documents. No-op if absent.
    async fn drop_partition(&self, partition: &str) -> Result<(), DatabaseError>;

    async fn exists(&self, partition: &str) -> Result<bool, DatabaseError>;

    /// Insert documents, assigning each a fresh identifying key
    async fn insert_documents(&self, partition: &str, docs: Vec<Document>) -> Result<u64, DatabaseError>;

    /// Every document with its identifying key. A missing partition is empty.
    async fn find_all(&self, partition: &str) -> Result<Vec<Document>, DatabaseError>;

    /// Copy every document from `src` into `dst` without identifying keys.
    ///
    /// `dst` is created if needed; the insert is skipped when `src` is empty.
    /// Writes to `src` during the copy may be missed.
    async fn copy_all(&self, src: &str, dst: &str) -> Result<u64, DatabaseError> {
        validate(src)?;
        validate(dst)?;

        let docs: Vec<Document> = self.find_all(src).await?.into_iter().map(strip_id).collect();

        self.create_partition(dst).await?;
        if docs.is_empty() {
            debug!("Partition {} is empty, nothing to copy into {}", src, dst);
            return Ok(0);
        }

        let copied = self.insert_documents(dst, docs).await?;
        info!("Copied {} documents {} -> {}", copied, src, dst);
        Ok(copied)
    }
}

pub fn strip_id(mut doc: Document) -> Document {
    doc.remove(ID_FIELD);
    doc
}

pub(crate) fn validate(partition: &str) -> Result<(), DatabaseError> {
    if is_valid_partition_name(partition) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidPartitionName(partition.to_string()))
    }
}

/// Partitions stored as tables in the master database:
/// `(_id BIGSERIAL, doc JSONB, created_at TIMESTAMPTZ)`
#[derive(Clone)]
pub struct PgPartitionManager {
    pool: PgPool,
}

impl PgPartitionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Postgres reports a lost `CREATE TABLE IF NOT EXISTS` race as
    /// duplicate_table or a unique violation on the catalog
    fn is_already_exists(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db) => db.is_unique_violation() || db.code().as_deref() == Some("42P07"),
            _ => false,
        }
    }
}

#[async_trait]
impl PartitionManager for PgPartitionManager {
    async fn create_partition(&self, partition: &str) -> Result<(), DatabaseError> {
        validate(partition)?;

        let query = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                _id BIGSERIAL PRIMARY KEY,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            DatabaseManager::quote_identifier(partition)
        );

        match sqlx::query(&query).execute(&self.pool).await {
            Ok(_) => {
                info!("Partition ready: {}", partition);
                Ok(())
            }
            Err(e) if Self::is_already_exists(&e) => {
                debug!("Partition {} already exists", partition);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_partition(&self, partition: &str) -> Result<(), DatabaseError> {
        validate(partition)?;

        let query = format!("DROP TABLE IF EXISTS {}", DatabaseManager::quote_identifier(partition));
        sqlx::query(&query).execute(&self.pool).await?;

        info!("Dropped partition: {}", partition);
        Ok(())
    }

    async fn exists(&self, partition: &str) -> Result<bool, DatabaseError> {
        validate(partition)?;

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )
            "#,
        )
        .bind(partition)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_documents(&self, partition: &str, docs: Vec<Document>) -> Result<u64, DatabaseError> {
        validate(partition)?;
        if docs.is_empty() {
            return Ok(0);
        }
        self.create_partition(partition).await?;

        let payload = Value::Array(docs.into_iter().map(|doc| Value::Object(strip_id(doc))).collect());
        let query = format!(
            "INSERT INTO {} (doc) SELECT value FROM jsonb_array_elements($1)",
            DatabaseManager::quote_identifier(partition)
        );

        let result = sqlx::query(&query).bind(Json(payload)).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn find_all(&self, partition: &str) -> Result<Vec<Document>, DatabaseError> {
        if !self.exists(partition).await? {
            return Ok(Vec::new());
        }

        let query = format!(
            "SELECT doc || jsonb_build_object('{}', _id) AS doc FROM {} ORDER BY _id",
            ID_FIELD,
            DatabaseManager::quote_identifier(partition)
        );

        let mut rows = sqlx::query(&query).fetch(&self.pool);
        let mut docs = Vec::new();
        while let Some(row) = rows.try_next().await? {
            let Json(value): Json<Value> = row.try_get("doc")?;
            match value {
                Value::Object(doc) => docs.push(doc),
                other => {
                    return Err(DatabaseError::QueryError(format!(
                        "non-object document in {}: {}",
                        partition, other
                    )))
                }
            }
        }

        Ok(docs)
    }
}
