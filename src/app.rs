// app.rs - Router assembly and shared application state

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::{CredentialStore, TokenService};
use crate::config::{AppConfig, StorageBackend};
use crate::database::{
    DatabaseManager, InMemoryPartitionManager, InMemoryTenantDirectory, PartitionManager, PgPartitionManager,
    PgTenantDirectory, TenantDirectory,
};
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::services::OrgService;

/// Everything handlers need, cloned into each request
#[derive(Clone)]
pub struct AppState {
    pub orgs: Arc<OrgService>,
    pub config: Arc<AppConfig>,
    database: Option<DatabaseManager>,
}

impl AppState {
    /// Connect the configured backend and wire up the service
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        Self::with_credentials(config, CredentialStore::new()).await
    }

    /// Same as `from_config` with caller-chosen password hashing costs
    pub async fn with_credentials(config: AppConfig, credentials: CredentialStore) -> anyhow::Result<Self> {
        let tokens = TokenService::from_config(&config.security).context("Invalid token configuration")?;

        let (directory, partitions, database) = match config.storage {
            StorageBackend::Postgres => {
                let manager = DatabaseManager::connect(&config.database)
                    .await
                    .context("Failed to connect to the master database")?;
                manager
                    .ensure_schema()
                    .await
                    .context("Failed to prepare the directory schema")?;
                tracing::info!("Using Postgres master database '{}'", config.database.master_database);

                let directory: Arc<dyn TenantDirectory> = Arc::new(PgTenantDirectory::new(manager.pool().clone()));
                let partitions: Arc<dyn PartitionManager> = Arc::new(PgPartitionManager::new(manager.pool().clone()));
                (directory, partitions, Some(manager))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; all data is lost on shutdown");

                let directory: Arc<dyn TenantDirectory> = Arc::new(InMemoryTenantDirectory::new());
                let partitions: Arc<dyn PartitionManager> = Arc::new(InMemoryPartitionManager::new());
                (directory, partitions, None)
            }
        };

        let orgs = OrgService::new(directory, partitions, credentials, tokens);
        Ok(Self {
            orgs: Arc::new(orgs),
            config: Arc::new(config),
            database,
        })
    }

    /// Release database connections, if any
    pub async fn close(&self) {
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}

/// Full HTTP surface with global middleware
pub fn app(state: AppState) -> Router {
    let api = &state.config.api;
    let security = &state.config.security;

    let mut router = Router::new()
        .route("/", get(public::root_get))
        .route("/health", get(public::health_get))
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .layer(RequestBodyLimitLayer::new(api.max_request_size_bytes));

    if security.enable_cors {
        router = router.layer(cors_layer(&security.cors_origins));
    }
    if api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(public::login_post))
        .route("/org/create", post(public::org_create))
        .route("/org/get", get(public::org_get))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/org/update", put(protected::org_update))
        .route("/org/delete", delete(protected::org_delete))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::Params;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let credentials = CredentialStore::with_params(Params::new(1024, 1, 1, None).unwrap());
        let state = AppState::with_credentials(AppConfig::in_memory(), credentials)
            .await
            .unwrap();
        app(state)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_reports_service_banner() {
        let app = test_app().await;
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "Org Management Service Running"}));
    }

    #[tokio::test]
    async fn health_is_ok_for_memory_backend() {
        let app = test_app().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token() {
        let app = test_app().await;
        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/org/delete?organization_name=acme")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn create_rejects_short_password() {
        let app = test_app().await;
        let request = json_request(
            Method::POST,
            "/org/create",
            json!({"organization_name": "Acme", "email": "a@x.com", "password": "123"}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["field_errors"]["password"].is_string());
    }

    #[tokio::test]
    async fn blank_new_name_only_updates_credentials() {
        let app = test_app().await;
        let request = json_request(
            Method::POST,
            "/org/create",
            json!({"organization_name": "Acme", "email": "a@x.com", "password": "secret1"}),
        );
        assert_eq!(send(&app, request).await.0, StatusCode::OK);

        let request = json_request(
            Method::POST,
            "/admin/login",
            json!({"email": "a@x.com", "password": "secret1"}),
        );
        let (_, body) = send(&app, request).await;
        let token = body["access_token"].as_str().unwrap().to_string();

        let request = Request::builder()
            .method(Method::PUT)
            .uri("/org/update")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(
                json!({
                    "organization_name": "acme",
                    "new_organization_name": "",
                    "email": "b@x.com",
                    "password": "secret2"
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body, json!({"status": "success", "message": "Admin updated successfully"}));

        let request = Request::builder()
            .uri("/org/get?organization_name=acme")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["organization"]["collection_name"], "org_acme");
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let app = test_app().await;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/admin/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_JSON");
    }

    #[tokio::test]
    async fn get_without_query_is_a_bad_request() {
        let app = test_app().await;
        let request = Request::builder().uri("/org/get").body(Body::empty()).unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let app = test_app().await;
        let request = json_request(
            Method::POST,
            "/org/create",
            json!({"organization_name": "Acme Corp", "email": "a@x.com", "password": "secret1"}),
        );
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["organization"]["organization_name"], "acme_corp");
        assert_eq!(body["organization"]["collection_name"], "org_acme_corp");

        let request = Request::builder()
            .uri("/org/get?organization_name=ACME%20corp")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["organization"]["organization_name"], "acme_corp");
        assert!(body["organization"]["admin_user_id"].is_string());
        assert!(body["organization"].get("password_hash").is_none());
    }
}
