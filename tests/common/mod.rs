#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{http::StatusCode, response::IntoResponse, routing::post, Form, Json, Router};
use serde_json::{json, Value};

use brokerlink_api::config::AppConfig;
use brokerlink_api::database::MemoryStore;
use brokerlink_api::{app, AppState};

pub const UPSTOX_CLIENT_ID: &str = "upstox-key";
pub const UPSTOX_CLIENT_SECRET: &str = "upstox-secret";
pub const REDIRECT_URI: &str = "https://example.com/upstox/callback";

/// Code the mock token endpoint rejects with 400.
pub const BAD_CODE: &str = "bad-code";
/// Code for which the mock also returns an extended token.
pub const EXTENDED_CODE: &str = "extended-code";
/// Code the mock answers only after `SLOW_RESPONSE`.
pub const SLOW_CODE: &str = "slow-code";
pub const SLOW_RESPONSE: Duration = Duration::from_secs(30);

/// The API router on a real socket, backed by a fresh in-memory store and
/// pointed at a mock Upstox token endpoint.
pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_upstox_timeout(5).await
    }

    pub async fn spawn_with_upstox_timeout(timeout_secs: u64) -> Result<Self> {
        let upstox_url = spawn_mock_upstox().await?;

        let mut config = AppConfig::development();
        config.security.jwt_secret = "integration-jwt-secret".to_string();
        config.security.credential_key = "integration-credential-key".to_string();
        config.upstox.api_base_url = upstox_url;
        config.upstox.request_timeout_secs = timeout_secs;

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone())?;

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            client: reqwest::Client::new(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/auth/signup"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?)
    }

    /// Sign up and log in, returning the session token.
    pub async fn token_for(&self, email: &str) -> Result<String> {
        let res = self.signup(email, "password1").await?;
        anyhow::ensure!(res.status() == StatusCode::CREATED, "signup failed: {}", res.status());

        let body: Value = self.login(email, "password1").await?.json().await?;
        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response missing token")
    }

    pub fn get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    pub async fn save_credentials(&self, token: &str, api_key: &str, api_secret: &str) -> Result<reqwest::Response> {
        Ok(self
            .post("/broker/upstox/credentials", token)
            .json(&json!({
                "apiKey": api_key,
                "apiSecret": api_secret,
                "redirectUri": REDIRECT_URI,
            }))
            .send()
            .await?)
    }
}

async fn spawn_mock_upstox() -> Result<String> {
    let router = Router::new().route("/v2/login/authorization/token", post(mock_token));

    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(format!("http://127.0.0.1:{}", port))
}

async fn mock_token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

    if field("grant_type") != "authorization_code" || field("redirect_uri") != REDIRECT_URI {
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": "error", "errors": ["bad request"] })));
    }
    if field("client_id") != UPSTOX_CLIENT_ID || field("client_secret") != UPSTOX_CLIENT_SECRET {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "status": "error", "errors": ["invalid client"] })));
    }
    if field("code") == SLOW_CODE {
        tokio::time::sleep(SLOW_RESPONSE).await;
    }
    if field("code") == BAD_CODE {
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": "error", "errors": ["invalid code"] })));
    }

    let mut body = json!({
        "email": "trader@example.com",
        "user_id": "AB1234",
        "access_token": format!("access-{}", field("code")),
        "refresh_token": "refresh-token",
    });
    if field("code") == EXTENDED_CODE {
        body["extended_token"] = json!("extended-token");
    }
    (StatusCode::OK, Json(body))
}
