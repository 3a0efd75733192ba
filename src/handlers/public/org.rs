// handlers/public/org.rs - POST /org/create and GET /org/get

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    Query, State,
};

use crate::app::AppState;
use crate::database::models::{Organization, OrganizationSummary};
use crate::handlers::utils::{query_rejection, FieldErrors, OrganizationEnvelope, OrganizationQuery};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::CreateOrganization;

/**
 * POST /org/create - register an organization and its admin
 *
 * Input: `{"organization_name", "email", "password"}`
 *
 * Output: `{"status": "success", "organization": {"organization_name", "collection_name"}}`
 *
 * The name is canonicalized before use, so "Acme Corp" is stored as
 * `acme_corp` with partition `org_acme_corp`.
 */
pub async fn org_create(
    State(state): State<AppState>,
    payload: Result<axum::Json<CreateOrganization>, JsonRejection>,
) -> ApiResult<OrganizationEnvelope<OrganizationSummary>> {
    let axum::Json(request) = payload?;

    FieldErrors::new()
        .require_non_empty("organization_name", &request.organization_name)
        .email("email", &request.email)
        .password("password", &request.password)
        .finish()?;

    let summary = state.orgs.create(request).await?;
    Ok(ApiResponse::success(OrganizationEnvelope::new(summary)))
}

/// GET /org/get?organization_name= - public directory lookup
pub async fn org_get(
    State(state): State<AppState>,
    query: Result<Query<OrganizationQuery>, QueryRejection>,
) -> ApiResult<OrganizationEnvelope<Organization>> {
    let Query(query) = query.map_err(query_rejection)?;
    let organization = state.orgs.get(&query.organization_name).await?;
    Ok(ApiResponse::success(OrganizationEnvelope::new(organization)))
}
