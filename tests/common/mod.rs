#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use argon2::Params;
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::task::JoinHandle;

use org_manager::auth::{CredentialStore, TokenService};
use org_manager::database::{DatabaseManager, PgPartitionManager, PgTenantDirectory};
use org_manager::services::OrgService;
use org_manager::{app, AppConfig, AppState};

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Serve the router in-process on a free port with in-memory storage.
    ///
    /// Each test gets its own server so organizations never leak between tests.
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut config = AppConfig::in_memory();
        config.api.port = port;
        config.api.enable_request_logging = false;

        let state = AppState::with_credentials(config, fast_credentials()?).await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind {}", base_url))?;

        let router = app(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("test server stopped: {}", e);
            }
        });

        let server = Self {
            port,
            base_url,
            client: reqwest::Client::new(),
            handle,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create_org(&self, name: &str, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url("/org/create"))
            .json(&json!({"organization_name": name, "email": email, "password": password}))
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .post(self.url("/admin/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    /// Log in and return the bearer token, failing the test on any error
    pub async fn token(&self, email: &str, password: &str) -> Result<String> {
        let (status, body) = self.login(email, password).await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed with {}: {}", status, body);
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .context("login response has no access_token")
    }

    pub async fn get_org(&self, name: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .get(self.url("/org/get"))
            .query(&[("organization_name", name)])
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn update_org(&self, token: &str, payload: Value) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .put(self.url("/org/update"))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn delete_org(&self, token: &str, name: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .delete(self.url("/org/delete"))
            .bearer_auth(token)
            .query(&[("organization_name", name)])
            .send()
            .await?;
        Ok((res.status(), res.json().await?))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Cheap hashing keeps the suite fast; hashes are still real Argon2id
pub fn fast_credentials() -> Result<CredentialStore> {
    let params = Params::new(1024, 1, 1, None).map_err(|e| anyhow::anyhow!("argon2 params: {}", e))?;
    Ok(CredentialStore::with_params(params))
}

/// Pool on DATABASE_URL (used as-is) with the directory schema in place.
///
/// Returns `None` when DATABASE_URL is unset so Postgres tests skip.
pub async fn postgres_pool() -> Result<Option<PgPool>> {
    let _ = dotenvy::dotenv();
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set; skipping Postgres test");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    DatabaseManager::from_pool(pool.clone()).ensure_schema().await?;
    Ok(Some(pool))
}

/// `OrgService` over the Postgres directory and partitions
pub fn postgres_service(pool: &PgPool) -> Result<OrgService> {
    let tokens = TokenService::new("postgres-test-secret", "HS256", chrono::Duration::minutes(5))?;
    Ok(OrgService::new(
        Arc::new(PgTenantDirectory::new(pool.clone())),
        Arc::new(PgPartitionManager::new(pool.clone())),
        fast_credentials()?,
        tokens,
    ))
}

/// Short random tag so reruns and parallel tests never share names
pub fn unique_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
