//! Credential hashing and bearer-token issuance for organization admins.

pub mod password;
pub mod token;

pub use password::{CredentialError, CredentialStore};
pub use token::{AdminClaims, TokenError, TokenService};
