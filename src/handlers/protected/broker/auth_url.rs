use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::broker_service::AuthorizationUrl;
use crate::state::AppState;

/// GET /broker/upstox/auth-url - Build the Upstox consent dialog URL.
///
/// The returned `state` is signed and expires after `expiresIn` seconds;
/// the callback rejects it afterwards.
pub async fn auth_url_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<AuthorizationUrl> {
    let url = state.broker.build_authorization_url(user.user_id).await?;
    Ok(ApiResponse::success(url))
}
