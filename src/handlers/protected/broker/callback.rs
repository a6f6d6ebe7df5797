// handlers/protected/broker/callback.rs - POST /broker/upstox/callback

use axum::{extract::State, Extension};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::validate::FieldErrors;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, Validate, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    #[serde(default)]
    pub state: Option<String>,
}

impl Validate for CallbackRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require("code", !self.code.is_empty(), "Must not be empty");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    pub message: &'static str,
    pub token_valid_until: DateTime<Utc>,
    pub has_extended_token: bool,
}

/**
 * POST /broker/upstox/callback - Exchange the authorization code for tokens
 *
 * Expected Input:
 * ```json
 * { "code": "auth-code", "state": "optional, from /auth-url" }
 * ```
 *
 * Expected Output:
 * ```json
 * { "message": "...", "tokenValidUntil": "2024-01-10T22:00:00Z", "hasExtendedToken": false }
 * ```
 *
 * 400 when Upstox rejects the code or the state is invalid; stored tokens are unchanged.
 */
pub async fn callback_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(body): ValidatedJson<CallbackRequest>,
) -> ApiResult<CallbackResponse> {
    let outcome = state
        .broker
        .exchange_code(user.user_id, &body.code, body.state.as_deref())
        .await?;

    Ok(ApiResponse::success(CallbackResponse {
        message: "Upstox connection established successfully",
        token_valid_until: outcome.token_valid_until,
        has_extended_token: outcome.has_extended_token,
    }))
}
