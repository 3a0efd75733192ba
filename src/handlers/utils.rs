// handlers/utils.rs - Shared request validation and response payloads

use std::collections::HashMap;

use axum::extract::rejection::QueryRejection;
use serde::{Deserialize, Serialize};

use crate::database::models::OrganizationSummary;
use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// `?organization_name=` query shared by get and delete
#[derive(Debug, Deserialize)]
pub struct OrganizationQuery {
    pub organization_name: String,
}

/// `{"organization": ...}` payload for create and get
#[derive(Debug, Serialize)]
pub struct OrganizationEnvelope<T: Serialize> {
    pub organization: T,
}

impl<T: Serialize> OrganizationEnvelope<T> {
    pub fn new(organization: T) -> Self {
        Self { organization }
    }
}

/// `{"message": ...}` payload returned by mutation endpoints
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<OrganizationSummary>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            organization: None,
        }
    }

    pub fn with_organization(message: impl Into<String>, organization: OrganizationSummary) -> Self {
        Self {
            message: message.into(),
            organization: Some(organization),
        }
    }
}

/// Collects per-field problems and turns them into one validation error
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: HashMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors
                .insert(field.to_string(), "This field is required".to_string());
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if let Err(msg) = validate_email_format(value) {
            self.errors.insert(field.to_string(), msg);
        }
        self
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        if value.chars().count() < MIN_PASSWORD_LENGTH {
            self.errors.insert(
                field.to_string(),
                format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
            );
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ApiError::validation_error(
            "Invalid request payload",
            Some(std::mem::take(&mut self.errors)),
        ))
    }
}

/// Basic structural email check: one `@`, a local part, a dotted domain
pub fn validate_email_format(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| "Invalid email format".to_string())?;

    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Missing or malformed query strings become 400s with the JSON error body
pub fn query_rejection(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}
