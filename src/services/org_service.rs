use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::{AdminClaims, CredentialError, CredentialStore, TokenError, TokenService};
use crate::database::directory::TenantDirectory;
use crate::database::manager::DatabaseError;
use crate::database::models::{Admin, Organization, OrganizationSummary};
use crate::database::partition::PartitionManager;
use crate::services::naming::{canonicalize, partition_name, MAX_CANONICAL_LEN};

/// Same message for unknown email and wrong password
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const NOT_YOUR_ORGANIZATION: &str = "Forbidden: not your organization";
const ORGANIZATION_NOT_FOUND: &str = "Organization not found";

#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    /// Organization without its admin or the reverse
    #[error("Inconsistent directory state: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Database(DatabaseError),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<DatabaseError> for OrgError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => OrgError::Conflict(msg),
            other => OrgError::Database(other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganization {
    pub organization_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrganization {
    pub organization_name: String,
    #[serde(default)]
    pub new_organization_name: Option<String>,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub organization: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Credentials changed, name unchanged
    Updated,
    Renamed(OrganizationSummary),
}

/// Orchestrates the organization lifecycle over the directory, the
/// partitions, and the credential and token services.
///
/// Multi-step mutations are not transactional. Steps run in a fixed order so
/// that a partial failure leaves a predictable state, and every such state is
/// logged at `error`.
#[derive(Clone)]
pub struct OrgService {
    directory: Arc<dyn TenantDirectory>,
    partitions: Arc<dyn PartitionManager>,
    credentials: CredentialStore,
    tokens: TokenService,
}

impl OrgService {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        partitions: Arc<dyn PartitionManager>,
        credentials: CredentialStore,
        tokens: TokenService,
    ) -> Self {
        Self {
            directory,
            partitions,
            credentials,
            tokens,
        }
    }

    pub fn directory(&self) -> &Arc<dyn TenantDirectory> {
        &self.directory
    }

    pub fn partitions(&self) -> &Arc<dyn PartitionManager> {
        &self.partitions
    }

    /// Create an organization, its admin, and its partition
    pub async fn create(&self, request: CreateOrganization) -> Result<OrganizationSummary, OrgError> {
        let name = canonical(&request.organization_name)?;

        if self.directory.find_by_name(&name).await?.is_some() {
            return Err(OrgError::Conflict("Organization already exists".to_string()));
        }

        let password_hash = self.hash_password(&request.password).await?;
        let admin = Admin::new(&request.email, password_hash, &name);
        self.directory.insert_admin(&admin).await?;

        let partition = partition_name(&name);
        if let Err(e) = self.partitions.create_partition(&partition).await {
            self.discard_admin(admin.id, &name).await;
            return Err(e.into());
        }

        let org = Organization::new(&name, &partition, admin.id);
        if let Err(e) = self.directory.insert_organization(&org).await {
            // A concurrent create won the unique index; its partition is shared, keep it
            self.discard_admin(admin.id, &name).await;
            return Err(e.into());
        }

        info!("Created organization {} with partition {}", name, partition);
        Ok(org.summary())
    }

    /// Check admin credentials and mint a token for the admin's organization
    pub async fn login(&self, request: AdminLogin) -> Result<LoginResponse, OrgError> {
        let admin = self
            .directory
            .find_admin_by_email(&request.email)
            .await?
            .ok_or_else(|| OrgError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !self.verify_password(&request.password, &admin.password_hash).await? {
            warn!("Failed login for admin {}", admin.id);
            return Err(OrgError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let org = self.directory.find_by_admin(admin.id).await?.ok_or_else(|| {
            error!("Admin {} has no organization", admin.id);
            OrgError::NotFound(ORGANIZATION_NOT_FOUND.to_string())
        })?;

        let access_token = self.tokens.issue(admin.id, &org.organization_name)?;
        debug!("Issued token for admin {} of {}", admin.id, org.organization_name);

        Ok(LoginResponse {
            access_token,
            token_type: "bearer".to_string(),
            organization: org.organization_name,
            expires_in: self.tokens.ttl_seconds(),
        })
    }

    /// Validate a bearer token. Expired and invalid tokens are both unauthorized.
    pub fn authenticate(&self, token: &str) -> Result<AdminClaims, OrgError> {
        self.tokens.validate(token).map_err(|e| {
            debug!("Rejected token: {}", e);
            match e {
                TokenError::Expired => OrgError::Unauthorized("Token expired".to_string()),
                _ => OrgError::Unauthorized("Invalid token".to_string()),
            }
        })
    }

    pub async fn get(&self, organization_name: &str) -> Result<Organization, OrgError> {
        let name = canonical(organization_name)?;
        self.find(&name).await
    }

    /// Replace the admin's credentials and optionally rename the organization.
    ///
    /// Renaming copies the partition and drops the old one before the
    /// directory is updated.
    pub async fn update(&self, claims: &AdminClaims, request: UpdateOrganization) -> Result<UpdateOutcome, OrgError> {
        let name = canonical(&request.organization_name)?;
        ensure_owner(claims, &name)?;

        let org = self.find(&name).await?;
        ensure_admin(claims, &org)?;

        // A malformed new name must not leave the credentials half-updated
        let new_name = match request.new_organization_name.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(canonical(raw)?),
            _ => None,
        };

        let password_hash = self.hash_password(&request.password).await?;
        self.directory
            .update_admin_credentials(org.admin_user_id, &request.email, &password_hash)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => {
                    error!("Organization {} has no admin row {}", name, org.admin_user_id);
                    OrgError::Inconsistent(format!("admin for organization '{}' is missing", name))
                }
                other => other.into(),
            })?;
        info!("Updated admin credentials for {}", name);

        let Some(new_name) = new_name else {
            return Ok(UpdateOutcome::Updated);
        };

        if new_name == name || self.directory.find_by_name(&new_name).await?.is_some() {
            return Err(OrgError::Conflict("New name already exists".to_string()));
        }

        let new_partition = partition_name(&new_name);
        self.partitions.copy_all(&org.collection_name, &new_partition).await?;

        if let Err(e) = self.partitions.drop_partition(&org.collection_name).await {
            error!(
                "Rename {} -> {}: copied into {} but failed to drop {}: {}",
                name, new_name, new_partition, org.collection_name, e
            );
            return Err(e.into());
        }

        if let Err(e) = self.directory.rename(org.id, &new_name, &new_partition).await {
            error!(
                "Rename {} -> {}: partition moved to {} but directory still points at dropped {}: {}",
                name, new_name, new_partition, org.collection_name, e
            );
            return Err(e.into());
        }

        info!("Renamed organization {} -> {} ({})", name, new_name, new_partition);
        Ok(UpdateOutcome::Renamed(OrganizationSummary {
            organization_name: new_name,
            collection_name: new_partition,
        }))
    }

    /// Drop the organization's partition, then its admin and directory rows
    pub async fn delete(&self, claims: &AdminClaims, organization_name: &str) -> Result<(), OrgError> {
        let name = canonical(organization_name)?;
        ensure_owner(claims, &name)?;

        let org = self.find(&name).await?;
        ensure_admin(claims, &org)?;

        self.partitions.drop_partition(&org.collection_name).await?;

        if let Err(e) = self.directory.remove(org.id).await {
            error!(
                "Delete {}: partition {} dropped but directory rows remain: {}",
                name, org.collection_name, e
            );
            return Err(e.into());
        }

        info!("Deleted organization {} and partition {}", name, org.collection_name);
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<Organization, OrgError> {
        self.directory
            .find_by_name(name)
            .await?
            .ok_or_else(|| OrgError::NotFound(ORGANIZATION_NOT_FOUND.to_string()))
    }

    /// Remove an admin row whose organization was never recorded
    async fn discard_admin(&self, admin_id: Uuid, name: &str) {
        match self.directory.remove_admin(admin_id).await {
            Ok(()) => warn!("Discarded admin {} after failed create of {}", admin_id, name),
            Err(e) => error!("Admin {} for {} left without organization: {}", admin_id, name, e),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, OrgError> {
        let credentials = self.credentials.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| OrgError::Task(e.to_string()))?
            .map_err(OrgError::from)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, OrgError> {
        let credentials = self.credentials.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || credentials.verify(&password, &hash))
            .await
            .map_err(|e| OrgError::Task(e.to_string()))
    }
}

fn canonical(raw: &str) -> Result<String, OrgError> {
    let name = canonicalize(raw);
    if name.is_empty() {
        return Err(OrgError::Validation(format!(
            "Organization name '{}' has no letters or digits",
            raw.trim()
        )));
    }
    if name.len() > MAX_CANONICAL_LEN {
        return Err(OrgError::Validation(format!(
            "Organization name must be at most {} characters once normalized",
            MAX_CANONICAL_LEN
        )));
    }
    Ok(name)
}

/// A token only authorizes action on the organization named in it
fn ensure_owner(claims: &AdminClaims, name: &str) -> Result<(), OrgError> {
    if claims.organization != name {
        warn!(
            "Admin {} of {} attempted to modify {}",
            claims.admin_id, claims.organization, name
        );
        return Err(OrgError::Forbidden(NOT_YOUR_ORGANIZATION.to_string()));
    }
    Ok(())
}

/// Reject tokens minted for a previous owner of a recreated name
fn ensure_admin(claims: &AdminClaims, org: &Organization) -> Result<(), OrgError> {
    if claims.admin_id != org.admin_user_id {
        warn!(
            "Token admin {} does not own {} (owner {})",
            claims.admin_id, org.organization_name, org.admin_user_id
        );
        return Err(OrgError::Forbidden(NOT_YOUR_ORGANIZATION.to_string()));
    }
    Ok(())
}
