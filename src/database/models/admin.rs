use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Role stored on every admin row; there is no other role
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Denormalized from the owning organization, kept in sync on rename
    pub organization_name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>, organization_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: password_hash.into(),
            organization_name: organization_name.into(),
            role: ADMIN_ROLE.to_string(),
            created_at: Utc::now(),
        }
    }
}
