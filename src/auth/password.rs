//! Admin password hashing using Argon2id.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// One-way salted password hashing.
///
/// Hashes are PHC strings, so the salt and parameters travel with the hash
/// and two calls on the same password produce different blobs.
#[derive(Clone, Default)]
pub struct CredentialStore {
    argon2: Argon2<'static>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Argon2id with explicit cost parameters
    pub fn with_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// True iff `password` matches `hash`. A malformed hash never matches.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!("Stored password hash is malformed: {}", e);
                return false;
            }
        };

        self.argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    }
}
