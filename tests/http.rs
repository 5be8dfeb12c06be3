use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{
            CACHE_CONTROL, CONTENT_TYPE, COOKIE, ETAG, IF_NONE_MATCH, LAST_MODIFIED, SET_COOKIE,
        },
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;
use tessera::{
    api,
    auth::{
        ApiKeyRecord, AuthWorkflow, FailureDelay, MemoryOutbox, MemoryStore, UserRecord,
        WorkflowConfig,
    },
    cookies::CookieManager,
    passwd,
    tokens::{Issuer, TokenConfig},
    verification::TokenSigner,
};
use tower::ServiceExt;
use ulid::Ulid;

const PASSWORD: &str = "correct horse battery staple";

struct Fixture {
    app: Router,
    issuer: Arc<Issuer>,
    outbox: Arc<MemoryOutbox>,
}

async fn build_fixture(verified: bool) -> Result<Fixture> {
    let config = TokenConfig {
        audience: vec![
            "https://app.example.test".to_string(),
            "https://admin.example.test".to_string(),
        ],
        issuer: "https://id.example.test".to_string(),
        access_ttl: Duration::seconds(60),
        refresh_ttl: Duration::seconds(3600),
        token_overlap: Duration::seconds(-60),
        ..TokenConfig::default()
    };
    let issuer = Arc::new(Issuer::new(&config)?);
    issuer.generate_key()?;

    let store = Arc::new(MemoryStore::new());
    store
        .insert_user(UserRecord {
            id: Ulid::new(),
            email: "alice@example.test".to_string(),
            name: Some("Alice".to_string()),
            role: Some("admin".to_string()),
            permissions: vec!["keys:read".to_string()],
            password: passwd::create(PASSWORD)?,
            verified,
            last_login: None,
        })
        .await?;
    store
        .insert_api_key(ApiKeyRecord {
            id: Ulid::new(),
            client_id: "ci-runner".to_string(),
            secret: passwd::create("runner-secret")?,
            name: None,
            role: None,
            permissions: Vec::new(),
            last_seen: None,
        })
        .await?;

    let outbox = Arc::new(MemoryOutbox::new());
    let workflow = AuthWorkflow::new(
        Arc::clone(&issuer),
        CookieManager::default(),
        store,
        TokenSigner::new("integration-secret".to_string().into())?,
        outbox.clone(),
        WorkflowConfig::new()
            .with_resend_cooldown_seconds(0)
            .with_failure_delay(FailureDelay::none()),
    );

    Ok(Fixture {
        app: api::router(Arc::new(workflow)),
        issuer,
        outbox,
    })
}

fn post_json(uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::post(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

async fn send(app: &Router, request: Request<Body>) -> Result<Response> {
    Ok(app.clone().oneshot(request).await?)
}

async fn body_json(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn body_text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn jwks_supports_conditional_requests() -> Result<()> {
    let fixture = build_fixture(true).await?;

    let response = send(
        &fixture.app,
        Request::get("/.well-known/jwks.json").body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response
        .headers()
        .get(ETAG)
        .context("missing ETag")?
        .to_str()?
        .to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert!(response.headers().contains_key(LAST_MODIFIED));
    assert!(response
        .headers()
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("max-age=")));

    let document = body_json(response).await?;
    let keys = document["keys"].as_array().context("keys array")?;
    assert_eq!(keys.len(), 1);
    assert_eq!(
        keys[0]["kid"].as_str(),
        fixture.issuer.current_key_id().map(|kid| kid.to_string()).as_deref()
    );
    assert_eq!(keys[0]["kty"], "OKP");

    let response = send(
        &fixture.app,
        Request::get("/.well-known/jwks.json")
            .header(IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    // rotation changes the validator
    fixture.issuer.generate_key()?;
    let response = send(
        &fixture.app,
        Request::get("/.well-known/jwks.json")
            .header(IF_NONE_MATCH, etag.as_str())
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_ne!(
        response.headers().get(ETAG).and_then(|v| v.to_str().ok()),
        Some(etag.as_str())
    );
    Ok(())
}

#[tokio::test]
async fn discovery_and_health() -> Result<()> {
    let fixture = build_fixture(true).await?;

    let response = send(
        &fixture.app,
        Request::get("/.well-known/openid-configuration").body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let document = body_json(response).await?;
    assert_eq!(document["issuer"], "https://id.example.test");
    assert_eq!(
        document["jwks_uri"],
        "https://id.example.test/.well-known/jwks.json"
    );
    assert_eq!(document["id_token_signing_alg_values_supported"], json!(["EdDSA"]));

    let response = send(&fixture.app, Request::get("/health").body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));
    let health = body_json(response).await?;
    assert_eq!(health["keys"], 1);

    let response = send(&fixture.app, Request::get("/openapi.json").body(Body::empty())?).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await?;
    assert!(doc["paths"]["/v1/login"].is_object());
    Ok(())
}

#[tokio::test]
async fn login_issues_tokens_and_cookies() -> Result<()> {
    let fixture = build_fixture(true).await?;

    let response = send(
        &fixture.app,
        post_json(
            "/v1/login",
            &json!({"email": "Alice@Example.test", "password": PASSWORD}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 4);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("access_token=") && c.contains("Domain=app.example.test")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("refresh_token=") && c.contains("Domain=admin.example.test")));
    assert!(cookies.iter().all(|c| c.contains("Secure")));

    let body = body_json(response).await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 60);
    let access = fixture
        .issuer
        .verify(body["access_token"].as_str().context("access token")?)?;
    assert_eq!(access.email.as_deref(), Some("alice@example.test"));
    assert_eq!(access.permissions, vec!["keys:read"]);
    let refresh = fixture
        .issuer
        .verify_refresh(body["refresh_token"].as_str().context("refresh token")?)?;
    assert_eq!(refresh.jti, access.jti);
    Ok(())
}

#[tokio::test]
async fn failed_logins_are_indistinguishable() -> Result<()> {
    let fixture = build_fixture(true).await?;

    for body in [
        json!({"email": "alice@example.test", "password": "wrong"}),
        json!({"email": "nobody@example.test", "password": PASSWORD}),
    ] {
        let response = send(&fixture.app, post_json("/v1/login", &body)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(body_text(response).await?, "failed authentication");
    }

    let unverified = build_fixture(false).await?;
    let response = send(
        &unverified.app,
        post_json(
            "/v1/login",
            &json!({"email": "alice@example.test", "password": PASSWORD}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_text(response).await?, "failed authentication");

    let response = send(
        &fixture.app,
        post_json("/v1/login", &json!({"email": "not-an-email", "password": "x"}))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn api_key_then_reauthenticate_with_cookies() -> Result<()> {
    let fixture = build_fixture(true).await?;

    let response = send(
        &fixture.app,
        post_json(
            "/v1/authenticate",
            &json!({"client_id": "ci-runner", "client_secret": "runner-secret"}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let access_token = body["access_token"].as_str().context("access token")?;
    let refresh_token = body["refresh_token"].as_str().context("refresh token")?;

    let response = send(
        &fixture.app,
        Request::post("/v1/reauthenticate")
            .header(
                COOKIE,
                format!("access_token={access_token}; refresh_token={refresh_token}"),
            )
            .body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 4);
    let renewed = body_json(response).await?;
    let claims = fixture
        .issuer
        .verify(renewed["access_token"].as_str().context("access token")?)?;
    assert_eq!(claims.client_id.as_deref(), Some("ci-runner"));

    // an access token is not accepted as a refresh token
    let response = send(
        &fixture.app,
        post_json("/v1/reauthenticate", &json!({"refresh_token": access_token}))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &fixture.app,
        Request::post("/v1/reauthenticate").body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn logout_expires_cookies() -> Result<()> {
    let fixture = build_fixture(true).await?;
    let response = send(
        &fixture.app,
        Request::post("/v1/logout").body(Body::empty())?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 4);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
    Ok(())
}

#[tokio::test]
async fn email_verification_is_single_use() -> Result<()> {
    let fixture = build_fixture(false).await?;

    let response = send(
        &fixture.app,
        post_json(
            "/v1/request-verification",
            &json!({"email": "alice@example.test", "purpose": "verify_email"}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // unknown identities get the same answer and nothing is sent
    let response = send(
        &fixture.app,
        post_json(
            "/v1/request-verification",
            &json!({"email": "nobody@example.test", "purpose": "verify_email"}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let sent = fixture.outbox.sent();
    assert_eq!(sent.len(), 1);
    let token = sent[0].token.clone();

    let response = send(
        &fixture.app,
        post_json("/v1/verify-email", &json!({"token": token}))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &fixture.app,
        post_json("/v1/verify-email", &json!({"token": token}))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await?, "verification denied");

    let response = send(
        &fixture.app,
        post_json(
            "/v1/login",
            &json!({"email": "alice@example.test", "password": PASSWORD}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn password_reset_replaces_the_password() -> Result<()> {
    let fixture = build_fixture(true).await?;

    let response = send(
        &fixture.app,
        post_json(
            "/v1/request-verification",
            &json!({"email": "alice@example.test", "purpose": "reset_password"}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let token = fixture.outbox.sent().pop().context("no message sent")?.token;

    // a reset token cannot verify an email
    let response = send(
        &fixture.app,
        post_json("/v1/verify-email", &json!({"token": token}))?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &fixture.app,
        post_json(
            "/v1/reset-password",
            &json!({"token": token, "password": "a brand new password"}),
        )?,
    )
    .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let old = send(
        &fixture.app,
        post_json(
            "/v1/login",
            &json!({"email": "alice@example.test", "password": PASSWORD}),
        )?,
    )
    .await?;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);

    let new = send(
        &fixture.app,
        post_json(
            "/v1/login",
            &json!({"email": "alice@example.test", "password": "a brand new password"}),
        )?,
    )
    .await?;
    assert_eq!(new.status(), StatusCode::OK);
    Ok(())
}
