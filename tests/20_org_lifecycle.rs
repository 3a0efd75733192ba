mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::TestServer;

#[tokio::test]
async fn create_canonicalizes_name() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.create_org("  My Org!! ", "admin@my.org", "secret1").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "success");
    assert_eq!(body["organization"]["organization_name"], "my_org");
    assert_eq!(body["organization"]["collection_name"], "org_my_org");

    // Lookups canonicalize the same way
    let (status, body) = server.get_org("MY ORG").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["organization"]["collection_name"], "org_my_org");
    assert!(body["organization"].get("password_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn duplicate_name_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, _) = server.create_org("Acme", "a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.create_org("ACME", "b@x.com", "secret2").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Organization already exists");
    Ok(())
}

#[tokio::test]
async fn create_validates_payload() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.create_org("", "not-an-email", "123").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["organization_name"].is_string());
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["password"].is_string());

    // Punctuation-only names canonicalize to nothing
    let (status, body) = server.create_org("!!!", "a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn get_unknown_organization_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.get_org("ghost").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Organization not found");
    Ok(())
}

#[tokio::test]
async fn login_issues_bearer_token() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;

    let (status, body) = server.login("a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["organization"], "acme");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["expires_in"], 3600);
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;

    let (wrong_password, body_a) = server.login("a@x.com", "wrong-password").await?;
    let (unknown_email, body_b) = server.login("nobody@x.com", "secret1").await?;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a["message"], "Invalid credentials");
    assert_eq!(body_a, body_b);
    Ok(())
}

#[tokio::test]
async fn update_replaces_credentials() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;
    let token = server.token("a@x.com", "secret1").await?;

    let (status, body) = server
        .update_org(
            &token,
            json!({"organization_name": "Acme", "email": "new@x.com", "password": "secret2"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, json!({"status": "success", "message": "Admin updated successfully"}));

    let (status, _) = server.login("a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = server.login("new@x.com", "secret2").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rename_moves_organization() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;
    let token = server.token("a@x.com", "secret1").await?;

    let (status, body) = server
        .update_org(
            &token,
            json!({
                "organization_name": "acme",
                "new_organization_name": "Acme Two",
                "email": "a@x.com",
                "password": "secret1"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Organization renamed successfully");
    assert_eq!(body["organization"]["organization_name"], "acme_two");
    assert_eq!(body["organization"]["collection_name"], "org_acme_two");

    let (status, _) = server.get_org("acme").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = server.get_org("acme_two").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["organization"]["collection_name"], "org_acme_two");

    // A fresh login reflects the new name
    let (_, body) = server.login("a@x.com", "secret1").await?;
    assert_eq!(body["organization"], "acme_two");
    Ok(())
}

#[tokio::test]
async fn rename_to_taken_name_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;
    server.create_org("Globex", "g@x.com", "secret1").await?;
    let token = server.token("a@x.com", "secret1").await?;

    let (status, body) = server
        .update_org(
            &token,
            json!({
                "organization_name": "acme",
                "new_organization_name": "GLOBEX",
                "email": "a@x.com",
                "password": "secret1"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "New name already exists");

    let (status, _) = server.get_org("acme").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admins_cannot_touch_other_organizations() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;
    server.create_org("Globex", "g@x.com", "secret1").await?;
    let token = server.token("a@x.com", "secret1").await?;

    let (status, body) = server
        .update_org(
            &token,
            json!({"organization_name": "globex", "email": "evil@x.com", "password": "secret9"}),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Forbidden: not your organization");

    let (status, _) = server.delete_org(&token, "globex").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.login("g@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_bad_tokens() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;

    let res = server
        .client
        .delete(server.url("/org/delete"))
        .query(&[("organization_name", "acme")])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let (status, body) = server.delete_org("not.a.jwt", "acme").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = server.get_org("acme").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn delete_removes_organization_and_admin() -> Result<()> {
    let server = TestServer::start().await?;
    server.create_org("Acme", "a@x.com", "secret1").await?;
    let token = server.token("a@x.com", "secret1").await?;

    let (status, body) = server.delete_org(&token, "Acme").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, json!({"status": "success", "message": "Organization deleted"}));

    let (status, _) = server.get_org("acme").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.login("a@x.com", "secret1").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The name is free again, and the old token does not grant the new owner's org
    server.create_org("Acme", "b@x.com", "secret2").await?;
    let (status, _) = server.delete_org(&token, "acme").await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
