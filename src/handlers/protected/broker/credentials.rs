// handlers/protected/broker/credentials.rs - POST /broker/upstox/credentials

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::validate::{is_valid_uri, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Validate, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    pub api_key: String,
    pub api_secret: String,
    pub redirect_uri: String,
}

impl Validate for CredentialsRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require("apiKey", !self.api_key.is_empty(), "Must not be empty");
        errors.require("apiSecret", !self.api_secret.is_empty(), "Must not be empty");
        errors.require("redirectUri", is_valid_uri(&self.redirect_uri), "Must be an absolute URI");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsResponse {
    pub message: &'static str,
    pub connection_id: Uuid,
}

/**
 * POST /broker/upstox/credentials - Save or replace Upstox API credentials
 *
 * Expected Input:
 * ```json
 * { "apiKey": "...", "apiSecret": "...", "redirectUri": "https://..." }
 * ```
 *
 * 201 when a connection is created, 200 when the existing one is updated.
 * Updating clears stored tokens, so the user must authorize again.
 */
pub async fn credentials_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CredentialsRequest>,
) -> ApiResult<CredentialsResponse> {
    let outcome = state
        .broker
        .upsert_credentials(user.user_id, &body.api_key, &body.api_secret, &body.redirect_uri)
        .await?;

    if outcome.created {
        Ok(ApiResponse::created(CredentialsResponse {
            message: "Upstox credentials saved successfully",
            connection_id: outcome.connection_id,
        }))
    } else {
        Ok(ApiResponse::success(CredentialsResponse {
            message: "Upstox credentials updated successfully",
            connection_id: outcome.connection_id,
        }))
    }
}
