use axum::{extract::State, Extension};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponse {
    pub message: &'static str,
    pub disconnected_connection_id: Uuid,
}

/// DELETE /broker/upstox/disconnect - Delete the user's Upstox connection, 404 if none.
pub async fn disconnect_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<DisconnectResponse> {
    let connection_id = state.broker.disconnect(user.user_id).await?;
    Ok(ApiResponse::success(DisconnectResponse {
        message: "Upstox connection disconnected successfully",
        disconnected_connection_id: connection_id,
    }))
}
