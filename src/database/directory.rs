//! Tenant directory: the mapping from canonical organization name to its
//! admin and storage partition.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{Admin, Organization};

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Organization>, DatabaseError>;

    /// Organization owned by `admin_id`
    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<Organization>, DatabaseError>;

    async fn find_admin(&self, admin_id: Uuid) -> Result<Option<Admin>, DatabaseError>;

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, DatabaseError>;

    /// Fails with `Conflict` if the email is already registered
    async fn insert_admin(&self, admin: &Admin) -> Result<(), DatabaseError>;

    /// Fails with `Conflict` if the name, partition, or admin is already taken
    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError>;

    async fn update_admin_credentials(
        &self,
        admin_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<(), DatabaseError>;

    /// Rename the organization and its admin's denormalized name together
    async fn rename(&self, org_id: Uuid, new_name: &str, new_partition: &str) -> Result<(), DatabaseError>;

    /// Remove the organization row and its owning admin row together
    async fn remove(&self, org_id: Uuid) -> Result<(), DatabaseError>;

    async fn remove_admin(&self, admin_id: Uuid) -> Result<(), DatabaseError>;

    async fn ping(&self) -> Result<(), DatabaseError>;
}

const ORG_COLUMNS: &str = "id, organization_name, collection_name, admin_user_id, created_at";
const ADMIN_COLUMNS: &str = "id, email, password_hash, organization_name, role, created_at";

/// Postgres-backed directory over the `organizations` and `admins` tables
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Organization>, DatabaseError> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE organization_name = $1",
            ORG_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let org = sqlx::query_as::<_, Organization>(&format!(
            "SELECT {} FROM organizations WHERE admin_user_id = $1",
            ORG_COLUMNS
        ))
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(org)
    }

    async fn find_admin(&self, admin_id: Uuid) -> Result<Option<Admin>, DatabaseError> {
        let admin = sqlx::query_as::<_, Admin>(&format!("SELECT {} FROM admins WHERE id = $1", ADMIN_COLUMNS))
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(admin)
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, DatabaseError> {
        let admin = sqlx::query_as::<_, Admin>(&format!("SELECT {} FROM admins WHERE email = $1", ADMIN_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(admin)
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO admins (id, email, password_hash, organization_name, role, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(admin.id)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(&admin.organization_name)
        .bind(&admin.role)
        .bind(admin.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, format!("admin email '{}' already registered", admin.email)))?;

        Ok(())
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, organization_name, collection_name, admin_user_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(org.id)
        .bind(&org.organization_name)
        .bind(&org.collection_name)
        .bind(org.admin_user_id)
        .bind(org.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DatabaseError::from_write(e, format!("organization '{}' already exists", org.organization_name))
        })?;

        Ok(())
    }

    async fn update_admin_credentials(
        &self,
        admin_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE admins SET email = $2, password_hash = $3 WHERE id = $1")
            .bind(admin_id)
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_write(e, format!("admin email '{}' already registered", email)))?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("admin {}", admin_id)));
        }
        Ok(())
    }

    async fn rename(&self, org_id: Uuid, new_name: &str, new_partition: &str) -> Result<(), DatabaseError> {
        let conflict = || format!("organization '{}' already exists", new_name);
        let mut tx = self.pool.begin().await?;

        let admin_id: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE organizations SET organization_name = $2, collection_name = $3
            WHERE id = $1
            RETURNING admin_user_id
            "#,
        )
        .bind(org_id)
        .bind(new_name)
        .bind(new_partition)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DatabaseError::from_write(e, conflict()))?;

        let (admin_id,) = admin_id.ok_or_else(|| DatabaseError::NotFound(format!("organization {}", org_id)))?;

        sqlx::query("UPDATE admins SET organization_name = $2 WHERE id = $1")
            .bind(admin_id)
            .bind(new_name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, org_id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let admin_id: Option<(Uuid,)> = sqlx::query_as("SELECT admin_user_id FROM organizations WHERE id = $1")
            .bind(org_id)
            .fetch_optional(&mut *tx)
            .await?;
        let (admin_id,) = admin_id.ok_or_else(|| DatabaseError::NotFound(format!("organization {}", org_id)))?;

        sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(admin_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(org_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn remove_admin(&self, admin_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(admin_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
