// handlers/public/auth/signup.rs - POST /auth/signup handler

use axum::extract::State;
use serde::Deserialize;

use crate::middleware::validate::{is_valid_email, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult, Validate, ValidatedJson};
use crate::services::auth_service::SignupResult;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

impl Validate for SignupRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require("email", is_valid_email(&self.email), "Must be a valid email address");
        errors.require(
            "password",
            self.password.chars().count() >= MIN_PASSWORD_LEN,
            "Must be at least 8 characters",
        );
    }
}

/**
 * POST /auth/signup - Register a platform user
 *
 * Expected Input:
 * ```json
 * { "email": "a@b.com", "password": "password1" }
 * ```
 *
 * Expected Output (201):
 * ```json
 * { "userId": "uuid", "email": "a@b.com" }
 * ```
 *
 * Errors: 400 invalid body, 409 email already registered (case-insensitive).
 */
pub async fn signup_post(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<SignupRequest>,
) -> ApiResult<SignupResult> {
    let created = state.auth.signup(&body.email, &body.password).await?;
    Ok(ApiResponse::created(created))
}
