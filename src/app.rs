use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Public auth routes
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(&state))
        // Global middleware
        .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use handlers::public::auth;

    Router::new()
        .route("/auth/signup", post(auth::signup_post))
        .route("/auth/login", post(auth::login_post))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected::{auth, broker};

    Router::new()
        .route("/auth/me", get(auth::me_get))
        .route("/broker/upstox/credentials", post(broker::credentials_post))
        .route("/broker/upstox/auth-url", get(broker::auth_url_get))
        .route("/broker/upstox/callback", post(broker::callback_post))
        .route("/broker/upstox/status", get(broker::status_get))
        .route("/broker/upstox/disconnect", delete(broker::disconnect_delete))
        // route_layer so unmatched paths still 404 instead of 401
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let db_status = match state.store.health_check().await {
        Ok(_) => "Connected",
        Err(_) => "Connection Failed",
    };

    Json(json!({
        "status": "Server Running",
        "dbStatus": db_status,
        "name": "brokerlink-api",
        "version": version,
        "endpoints": {
            "auth": "/auth/signup, /auth/login (public), /auth/me (bearer)",
            "broker": "/broker/upstox/{credentials,auth-url,callback,status,disconnect} (bearer)",
            "health": "/health (public)",
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Database unavailable")
    })?;

    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
        "database": "ok"
    })))
}
