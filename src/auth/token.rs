//! Signed, expiring admin tokens.
//!
//! Tokens are stateless: there is no revocation list, expiry is the only
//! bound on a token's lifetime.

use std::str::FromStr;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;

/// Claims carried by every admin token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminClaims {
    pub admin_id: Uuid,
    /// Canonical name of the organization the admin owned at login
    pub organization: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Token encoding failed: {0}")]
    Encoding(String),
    #[error("JWT secret not configured")]
    MissingSecret,
    #[error("Unsupported JWT algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Token lifetime out of range: {0} minutes")]
    InvalidTtl(u64),
}

/// Issues and validates HMAC-signed admin tokens
#[derive(Clone)]
pub struct TokenService {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, algorithm: &str, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        // Only shared-secret algorithms make sense with a single configured secret
        let algorithm = Algorithm::from_str(algorithm)
            .ok()
            .filter(|alg| matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512))
            .ok_or_else(|| TokenError::UnsupportedAlgorithm(algorithm.to_string()))?;

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, TokenError> {
        let ttl = i64::try_from(config.token_ttl_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .ok_or(TokenError::InvalidTtl(config.token_ttl_minutes))?;
        Self::new(&config.jwt_secret, &config.jwt_algorithm, ttl)
    }

    /// Token lifetime in seconds, as reported to clients
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Mint a token for `admin_id` expiring one TTL from now
    pub fn issue(&self, admin_id: Uuid, organization: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AdminClaims {
            admin_id,
            organization: organization.to_string(),
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.ttl)
                .ok_or_else(|| TokenError::Encoding("token expiry out of range".to_string()))?
                .timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign an arbitrary claim set with the configured key
    pub fn sign(&self, claims: &AdminClaims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded claims
    pub fn validate(&self, token: &str) -> Result<AdminClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<AdminClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
