// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::middleware::validate::{is_valid_email, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult, Validate, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self, errors: &mut FieldErrors) {
        errors.require("email", is_valid_email(&self.email), "Must be a valid email address");
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/**
 * POST /auth/login - Authenticate and receive a session JWT
 *
 * Expected Input:
 * ```json
 * { "email": "a@b.com", "password": "password1" }
 * ```
 *
 * Expected Output:
 * ```json
 * { "token": "eyJhbGciOiJIUzI1NiI..." }
 * ```
 *
 * Unknown email and wrong password both answer 403 with the same message.
 */
pub async fn login_post(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let token = state.auth.login(&body.email, &body.password).await?;
    Ok(ApiResponse::success(LoginResponse { token }))
}
