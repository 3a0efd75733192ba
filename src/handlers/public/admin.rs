// handlers/public/admin.rs - POST /admin/login

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::handlers::utils::FieldErrors;
use crate::services::{AdminLogin, LoginResponse};

/**
 * POST /admin/login - exchange admin credentials for a bearer token
 *
 * Input: `{"email": "...", "password": "..."}`
 *
 * Output: `{"access_token", "token_type": "bearer", "organization", "expires_in"}`
 *
 * Unknown email and wrong password both answer 401 "Invalid credentials".
 */
pub async fn login_post(
    State(state): State<AppState>,
    payload: Result<Json<AdminLogin>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;

    FieldErrors::new()
        .email("email", &request.email)
        .password("password", &request.password)
        .finish()?;

    let response = state.orgs.login(request).await?;
    tracing::info!("Admin logged in for organization '{}'", response.organization);

    Ok(Json(response))
}
