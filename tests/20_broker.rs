mod common;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use brokerlink_api::database::models::UPSTOX;
use brokerlink_api::database::Store;
use common::{
    TestApp, BAD_CODE, EXTENDED_CODE, REDIRECT_URI, SLOW_CODE, SLOW_RESPONSE, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET,
};

async fn user_id(app: &TestApp, token: &str) -> Result<Uuid> {
    let me: Value = app.get("/auth/me", token).send().await?.json().await?;
    Ok(me["userId"].as_str().unwrap_or_default().parse()?)
}

/// Save credentials, request the consent URL and complete the callback.
async fn connect(app: &TestApp, token: &str, code: &str) -> Result<reqwest::Response> {
    app.save_credentials(token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;
    let auth: Value = app.get("/broker/upstox/auth-url", token).send().await?.json().await?;

    Ok(app
        .post("/broker/upstox/callback", token)
        .json(&json!({ "code": code, "state": auth["state"] }))
        .send()
        .await?)
}

#[tokio::test]
async fn broker_routes_require_a_session() -> Result<()> {
    let app = TestApp::spawn().await?;

    for (method, path) in [
        (reqwest::Method::POST, "/broker/upstox/credentials"),
        (reqwest::Method::GET, "/broker/upstox/auth-url"),
        (reqwest::Method::POST, "/broker/upstox/callback"),
        (reqwest::Method::GET, "/broker/upstox/status"),
        (reqwest::Method::DELETE, "/broker/upstox/disconnect"),
    ] {
        let res = app.client.request(method, app.url(path)).send().await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{}", path);
    }
    Ok(())
}

#[tokio::test]
async fn status_without_connection() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("status@example.com").await?;

    let res = app.get("/broker/upstox/status", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["isConnected"], false);
    assert_eq!(body["hasCredentials"], false);
    assert!(body["message"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn credentials_upsert_keeps_connection_and_clears_tokens() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("upsert@example.com").await?;
    let user_id = user_id(&app, &token).await?;

    let res = connect(&app, &token, "first-code").await?;
    assert_eq!(res.status(), StatusCode::OK);

    let before = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");
    assert!(before.access_token_encrypted.is_some());

    let res = app.save_credentials(&token, "rotated-key", "rotated-secret").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["connectionId"], before.connection_id.to_string());

    let after = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");
    assert_eq!(after.connection_id, before.connection_id);
    assert!(after.access_token_encrypted.is_none());
    assert!(after.refresh_token_encrypted.is_none());
    assert!(after.token_valid_until.is_none());
    assert_eq!(app.store.connection_count().await, 1);

    let status: Value = app.get("/broker/upstox/status", &token).send().await?.json().await?;
    assert_eq!(status["isConnected"], false);
    assert_eq!(status["hasCredentials"], true);
    Ok(())
}

#[tokio::test]
async fn first_credentials_save_is_created() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("create@example.com").await?;

    let res = app.save_credentials(&token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert!(body["connectionId"].as_str().is_some());

    let res = app
        .post("/broker/upstox/credentials", &token)
        .json(&json!({ "apiKey": "", "apiSecret": "s", "redirectUri": "not-a-uri" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert!(body["fieldErrors"]["apiKey"].as_str().is_some());
    assert!(body["fieldErrors"]["redirectUri"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn auth_url_requires_credentials() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("authurl@example.com").await?;

    let res = app.get("/broker/upstox/auth-url", &token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    app.save_credentials(&token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;
    let res = app.get("/broker/upstox/auth-url", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["expiresIn"], 300);
    let url = url::Url::parse(body["authUrl"].as_str().unwrap_or_default())?;
    assert_eq!(url.path(), "/v2/login/authorization/dialog");
    let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(query["client_id"], UPSTOX_CLIENT_ID);
    assert_eq!(query["redirect_uri"], REDIRECT_URI);
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["state"], body["state"].as_str().unwrap_or_default());
    Ok(())
}

#[tokio::test]
async fn callback_stores_tokens_until_next_session_reset() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("callback@example.com").await?;
    let user_id = user_id(&app, &token).await?;

    let res = connect(&app, &token, "good-code").await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["hasExtendedToken"], false);
    let valid_until: DateTime<Utc> = body["tokenValidUntil"].as_str().unwrap_or_default().parse()?;
    let now = Utc::now();
    assert!(valid_until > now);
    assert!(valid_until <= now + Duration::hours(48));

    let conn = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");
    let access = conn.access_token_encrypted.expect("access token stored");
    assert_ne!(access, "access-good-code");
    assert!(conn.refresh_token_encrypted.is_some());

    let status: Value = app.get("/broker/upstox/status", &token).send().await?.json().await?;
    assert_eq!(status["isConnected"], true);
    assert_eq!(status["hasCredentials"], true);
    assert_eq!(status["isActive"], true);
    assert_eq!(status["connectionId"], conn.connection_id.to_string());
    Ok(())
}

#[tokio::test]
async fn callback_reports_extended_token() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("extended@example.com").await?;

    let res = connect(&app, &token, EXTENDED_CODE).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["hasExtendedToken"], true);
    Ok(())
}

#[tokio::test]
async fn rejected_code_leaves_tokens_unchanged() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("rejected@example.com").await?;
    let user_id = user_id(&app, &token).await?;

    assert_eq!(connect(&app, &token, "good-code").await?.status(), StatusCode::OK);
    let before = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");

    let res = app
        .post("/broker/upstox/callback", &token)
        .json(&json!({ "code": BAD_CODE }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "Failed to exchange authorization code for token");

    let after = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");
    assert_eq!(after.access_token_encrypted, before.access_token_encrypted);
    assert_eq!(after.refresh_token_encrypted, before.refresh_token_encrypted);
    assert_eq!(after.token_valid_until, before.token_valid_until);
    Ok(())
}

#[tokio::test]
async fn slow_upstream_times_out_and_leaves_tokens_unchanged() -> Result<()> {
    let app = TestApp::spawn_with_upstox_timeout(1).await?;
    let token = app.token_for("slow@example.com").await?;
    let user_id = user_id(&app, &token).await?;

    assert_eq!(connect(&app, &token, "good-code").await?.status(), StatusCode::OK);
    let before = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");

    let started = std::time::Instant::now();
    let res = app
        .post("/broker/upstox/callback", &token)
        .json(&json!({ "code": SLOW_CODE }))
        .send()
        .await?;
    let elapsed = started.elapsed();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(elapsed < SLOW_RESPONSE / 3, "callback took {:?}", elapsed);

    let after = app.store.find_connection(user_id, UPSTOX).await?.expect("connection");
    assert_eq!(after.access_token_encrypted, before.access_token_encrypted);
    assert_eq!(after.token_valid_until, before.token_valid_until);
    Ok(())
}

#[tokio::test]
async fn empty_state_is_accepted_like_a_missing_one() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("emptystate@example.com").await?;

    app.save_credentials(&token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;
    let res = app
        .post("/broker/upstox/callback", &token)
        .json(&json!({ "code": "good-code", "state": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn wrong_client_credentials_are_a_bad_request() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("wrongclient@example.com").await?;

    app.save_credentials(&token, "unknown-key", "unknown-secret").await?;
    let res = app
        .post("/broker/upstox/callback", &token)
        .json(&json!({ "code": "good-code" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn callback_rejects_forged_or_foreign_state() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.token_for("alice@example.com").await?;
    let bob = app.token_for("bob@example.com").await?;

    for token in [&alice, &bob] {
        app.save_credentials(token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;
    }

    let res = app
        .post("/broker/upstox/callback", &alice)
        .json(&json!({ "code": "good-code", "state": "forged" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let bobs: Value = app.get("/broker/upstox/auth-url", &bob).send().await?.json().await?;
    let res = app
        .post("/broker/upstox/callback", &alice)
        .json(&json!({ "code": "good-code", "state": bobs["state"] }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn callback_without_connection_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("noconn@example.com").await?;

    let res = app
        .post("/broker/upstox/callback", &token)
        .json(&json!({ "code": "good-code" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn disconnect_then_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for("disconnect@example.com").await?;

    let created: Value = app
        .save_credentials(&token, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET)
        .await?
        .json()
        .await?;

    let res = app.delete("/broker/upstox/disconnect", &token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["disconnectedConnectionId"], created["connectionId"]);

    let res = app.delete("/broker/upstox/disconnect", &token).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let status: Value = app.get("/broker/upstox/status", &token).send().await?.json().await?;
    assert_eq!(status["hasCredentials"], false);
    Ok(())
}

#[tokio::test]
async fn connections_are_isolated_per_user() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.token_for("alice2@example.com").await?;
    let bob = app.token_for("bob2@example.com").await?;

    app.save_credentials(&alice, UPSTOX_CLIENT_ID, UPSTOX_CLIENT_SECRET).await?;

    let status: Value = app.get("/broker/upstox/status", &bob).send().await?.json().await?;
    assert_eq!(status["hasCredentials"], false);

    let res = app.delete("/broker/upstox/disconnect", &bob).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.connection_count().await, 1);
    Ok(())
}
