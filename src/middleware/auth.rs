use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::AdminClaims;
use crate::error::ApiError;

/// Authenticated admin context extracted from the bearer token
#[derive(Clone, Debug)]
pub struct AuthAdmin(pub AdminClaims);

/// Validates the bearer token and injects `AuthAdmin` into the request
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(&headers).map_err(ApiError::unauthorized)?;

    let claims = state.orgs.authenticate(token)?;
    request.extensions_mut().insert(AuthAdmin(claims));

    Ok(next.run(request).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    let (scheme, token) = auth_str
        .split_once(' ')
        .ok_or_else(|| "Authorization header must use Bearer token format".to_string())?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err("Authorization header must use Bearer token format".to_string());
    }

    let token = token.trim();
    if token.is_empty() {
        return Err("Empty bearer token".to_string());
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_bearer_token(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers("bearer   abc ")), Ok("abc"));
    }

    #[test]
    fn rejects_missing_or_malformed_headers() {
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
        assert!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")).is_err());
        assert!(extract_bearer_token(&headers("Bearer ")).is_err());
        assert!(extract_bearer_token(&headers("Bearer")).is_err());
    }
}
