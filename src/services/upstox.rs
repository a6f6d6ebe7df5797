//! HTTP client for the Upstox OAuth endpoints.

use chrono::{DateTime, Days, Duration, NaiveTime, TimeZone, Utc};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use url::Url;

use crate::config::UpstoxConfig;

// Relative so they resolve under any path prefix on the base URL
const AUTHORIZATION_DIALOG_PATH: &str = "v2/login/authorization/dialog";
const TOKEN_PATH: &str = "v2/login/authorization/token";

/// Upstox sessions are reset daily at 03:30 India Standard Time (UTC+05:30).
const SESSION_UTC_OFFSET_MINUTES: i64 = 5 * 60 + 30;
const SESSION_RESET_MINUTES: i64 = 3 * 60 + 30;

#[derive(Debug, thiserror::Error)]
pub enum UpstoxError {
    #[error("invalid Upstox URL: {0}")]
    InvalidUrl(String),

    #[error("Upstox rejected the request with status {status}")]
    Rejected { status: u16, body: String },

    #[error("Upstox request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Form fields for the authorization-code grant.
#[derive(Debug)]
pub struct TokenExchange<'a> {
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

/// Token endpoint response; fields we do not store are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub extended_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpstoxClient {
    http: reqwest::Client,
    base_url: Url,
}

impl UpstoxClient {
    pub fn new(config: &UpstoxConfig) -> Result<Self, UpstoxError> {
        let mut base_url = Url::parse(&config.api_base_url)
            .map_err(|e| UpstoxError::InvalidUrl(format!("{}: {}", config.api_base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstoxError> {
        self.base_url
            .join(path)
            .map_err(|e| UpstoxError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Build the consent dialog URL the user is redirected to.
    pub fn authorization_url(&self, client_id: &str, redirect_uri: &str, state: &str) -> Result<Url, UpstoxError> {
        let mut url = self.endpoint(AUTHORIZATION_DIALOG_PATH)?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for tokens. Non-2xx responses are
    /// returned as `Rejected` with the upstream body for logging.
    pub async fn exchange_code(&self, request: &TokenExchange<'_>) -> Result<TokenGrant, UpstoxError> {
        let form = [
            ("code", request.code),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
            ("redirect_uri", request.redirect_uri),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(self.endpoint(TOKEN_PATH)?)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstoxError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<TokenGrant>().await?)
    }
}

/// Next 03:30 IST strictly after the current IST calendar day.
pub fn next_session_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = Duration::minutes(SESSION_UTC_OFFSET_MINUTES);
    let local_date = (now + offset).date_naive() + Days::new(1);
    let reset_local = local_date.and_time(NaiveTime::MIN) + Duration::minutes(SESSION_RESET_MINUTES);
    Utc.from_utc_datetime(&(reset_local - offset))
}
