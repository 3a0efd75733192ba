use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Directory record for a tenant, keyed by its canonical name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Organization {
    #[serde(skip_serializing)]
    pub id: Uuid,
    pub organization_name: String,
    /// Partition identifier, always `org_<organization_name>`
    pub collection_name: String,
    pub admin_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(organization_name: impl Into<String>, collection_name: impl Into<String>, admin_user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_name: organization_name.into(),
            collection_name: collection_name.into(),
            admin_user_id,
            created_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> OrganizationSummary {
        OrganizationSummary {
            organization_name: self.organization_name.clone(),
            collection_name: self.collection_name.clone(),
        }
    }
}

/// Name and partition pair returned by create and rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub organization_name: String,
    pub collection_name: String,
}
