use axum::{extract::State, Extension};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::broker_service::ConnectionStatus;
use crate::state::AppState;

/// GET /broker/upstox/status
pub async fn status_get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<ConnectionStatus> {
    let status = state.broker.get_status(user.user_id).await?;
    Ok(ApiResponse::success(status))
}
