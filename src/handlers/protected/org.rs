// handlers/protected/org.rs - PUT /org/update and DELETE /org/delete

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};

use crate::app::AppState;
use crate::handlers::utils::{query_rejection, FieldErrors, MessageResponse, OrganizationQuery};
use crate::middleware::{ApiResponse, ApiResult, AuthAdmin};
use crate::services::{UpdateOrganization, UpdateOutcome};

/**
 * PUT /org/update - replace admin credentials, optionally renaming
 *
 * Input: `{"organization_name", "new_organization_name"?, "email", "password"}`
 *
 * A rename copies every document into the new partition before the old one
 * is dropped; the response then carries the new summary.
 */
pub async fn org_update(
    State(state): State<AppState>,
    Extension(AuthAdmin(claims)): Extension<AuthAdmin>,
    payload: Result<Json<UpdateOrganization>, JsonRejection>,
) -> ApiResult<MessageResponse> {
    let Json(request) = payload?;

    // A blank new_organization_name means "no rename"
    FieldErrors::new()
        .require_non_empty("organization_name", &request.organization_name)
        .email("email", &request.email)
        .password("password", &request.password)
        .finish()?;

    let response = match state.orgs.update(&claims, request).await? {
        UpdateOutcome::Updated => MessageResponse::new("Admin updated successfully"),
        UpdateOutcome::Renamed(summary) => {
            MessageResponse::with_organization("Organization renamed successfully", summary)
        }
    };

    Ok(ApiResponse::success(response))
}

/// DELETE /org/delete?organization_name= - remove the caller's organization
pub async fn org_delete(
    State(state): State<AppState>,
    Extension(AuthAdmin(claims)): Extension<AuthAdmin>,
    query: Result<Query<OrganizationQuery>, QueryRejection>,
) -> ApiResult<MessageResponse> {
    let Query(query) = query.map_err(query_rejection)?;
    state.orgs.delete(&claims, &query.organization_name).await?;
    Ok(ApiResponse::success(MessageResponse::new("Organization deleted")))
}
