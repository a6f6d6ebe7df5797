use axum::Extension;
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
}

/// GET /auth/me - Return the identity embedded in the bearer token.
///
/// Claims are trusted as signed; the store is not consulted.
pub async fn me_get(Extension(user): Extension<AuthUser>) -> ApiResult<MeResponse> {
    Ok(ApiResponse::success(MeResponse {
        user_id: user.user_id,
        email: user.email,
    }))
}
