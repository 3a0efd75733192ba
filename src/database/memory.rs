//! In-memory directory and partitions for development and tests.
//!
//! Both enforce the same uniqueness rules as the Postgres schema, checked and
//! applied under a single write lock.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::directory::TenantDirectory;
use crate::database::manager::DatabaseError;
use crate::database::models::{Admin, Organization};
use crate::database::partition::{strip_id, validate, Document, PartitionManager, ID_FIELD};

#[derive(Default)]
struct DirectoryTables {
    organizations: HashMap<Uuid, Organization>,
    admins: HashMap<Uuid, Admin>,
}

impl DirectoryTables {
    fn org_conflict(&self, org: &Organization) -> Option<String> {
        self.organizations
            .values()
            .filter(|existing| existing.id != org.id)
            .find_map(|existing| {
                if existing.organization_name == org.organization_name {
                    Some(format!("organization '{}' already exists", org.organization_name))
                } else if existing.collection_name == org.collection_name {
                    Some(format!("partition '{}' already in use", org.collection_name))
                } else if existing.admin_user_id == org.admin_user_id {
                    Some(format!("admin {} already owns an organization", org.admin_user_id))
                } else {
                    None
                }
            })
    }

    fn email_taken(&self, email: &str, except: Uuid) -> bool {
        self.admins.values().any(|a| a.id != except && a.email == email)
    }
}

#[derive(Default)]
pub struct InMemoryTenantDirectory {
    tables: RwLock<DirectoryTables>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Organization>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .values()
            .find(|org| org.organization_name == name)
            .cloned())
    }

    async fn find_by_admin(&self, admin_id: Uuid) -> Result<Option<Organization>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .organizations
            .values()
            .find(|org| org.admin_user_id == admin_id)
            .cloned())
    }

    async fn find_admin(&self, admin_id: Uuid) -> Result<Option<Admin>, DatabaseError> {
        Ok(self.tables.read().await.admins.get(&admin_id).cloned())
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<Admin>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.admins.values().find(|a| a.email == email).cloned())
    }

    async fn insert_admin(&self, admin: &Admin) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.admins.contains_key(&admin.id) || tables.email_taken(&admin.email, admin.id) {
            return Err(DatabaseError::Conflict(format!(
                "admin email '{}' already registered",
                admin.email
            )));
        }
        tables.admins.insert(admin.id, admin.clone());
        Ok(())
    }

    async fn insert_organization(&self, org: &Organization) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(conflict) = tables.org_conflict(org) {
            return Err(DatabaseError::Conflict(conflict));
        }
        if tables.organizations.contains_key(&org.id) {
            return Err(DatabaseError::Conflict(format!("organization id {} already exists", org.id)));
        }
        tables.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn update_admin_credentials(
        &self,
        admin_id: Uuid,
        email: &str,
        password_hash: &str,
    ) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if tables.email_taken(email, admin_id) {
            return Err(DatabaseError::Conflict(format!("admin email '{}' already registered", email)));
        }

        let admin = tables
            .admins
            .get_mut(&admin_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("admin {}", admin_id)))?;
        admin.email = email.to_string();
        admin.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn rename(&self, org_id: Uuid, new_name: &str, new_partition: &str) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;

        let mut renamed = tables
            .organizations
            .get(&org_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("organization {}", org_id)))?;
        renamed.organization_name = new_name.to_string();
        renamed.collection_name = new_partition.to_string();

        if let Some(conflict) = tables.org_conflict(&renamed) {
            return Err(DatabaseError::Conflict(conflict));
        }

        if let Some(admin) = tables.admins.get_mut(&renamed.admin_user_id) {
            admin.organization_name = new_name.to_string();
        }
        tables.organizations.insert(org_id, renamed);
        Ok(())
    }

    async fn remove(&self, org_id: Uuid) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        let org = tables
            .organizations
            .remove(&org_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("organization {}", org_id)))?;
        tables.admins.remove(&org.admin_user_id);
        Ok(())
    }

    async fn remove_admin(&self, admin_id: Uuid) -> Result<(), DatabaseError> {
        self.tables.write().await.admins.remove(&admin_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Partitions held as vectors of documents keyed by partition name
#[derive(Default)]
pub struct InMemoryPartitionManager {
    partitions: RwLock<HashMap<String, Vec<Document>>>,
}

impl InMemoryPartitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every partition currently present
    pub async fn partition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl PartitionManager for InMemoryPartitionManager {
    async fn create_partition(&self, partition: &str) -> Result<(), DatabaseError> {
        validate(partition)?;
        self.partitions
            .write()
            .await
            .entry(partition.to_string())
            .or_default();
        Ok(())
    }

    async fn drop_partition(&self, partition: &str) -> Result<(), DatabaseError> {
        validate(partition)?;
        self.partitions.write().await.remove(partition);
        Ok(())
    }

    async fn exists(&self, partition: &str) -> Result<bool, DatabaseError> {
        validate(partition)?;
        Ok(self.partitions.read().await.contains_key(partition))
    }

    async fn insert_documents(&self, partition: &str, docs: Vec<Document>) -> Result<u64, DatabaseError> {
        validate(partition)?;
        if docs.is_empty() {
            return Ok(0);
        }

        let mut partitions = self.partitions.write().await;
        let stored = partitions.entry(partition.to_string()).or_default();
        let count = docs.len() as u64;
        for doc in docs {
            let mut doc = strip_id(doc);
            doc.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
            stored.push(doc);
        }
        Ok(count)
    }

    async fn find_all(&self, partition: &str) -> Result<Vec<Document>, DatabaseError> {
        validate(partition)?;
        Ok(self
            .partitions
            .read()
            .await
            .get(partition)
            .cloned()
            .unwrap_or_default())
    }
}
