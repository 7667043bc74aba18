//! Route definitions for the API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::auth::auth_middleware;
use super::middleware::rate_limit::quota_headers_middleware;
use super::middleware::security_headers::security_headers_middleware;
use super::middleware::tracing::correlation_id_middleware;
use super::SharedState;
use crate::formats::thumbnail::THUMBNAIL_MAX_BYTES;
use crate::formats::MAX_GAME_FILE_BYTES;
use crate::services::metrics_service;

/// Room for text fields and multipart framing on top of the two file parts.
const FORM_SLACK_BYTES: u64 = 256 * 1024;

/// Largest request body `POST /api/games` accepts.
pub const SUBMISSION_BODY_LIMIT: usize =
    (MAX_GAME_FILE_BYTES + THUMBNAIL_MAX_BYTES + FORM_SLACK_BYTES) as usize;

/// Create the application router with every middleware layer applied.
pub fn create_router(state: SharedState) -> Router {
    // OpenAPI document is built once at startup
    let openapi = super::openapi::build_openapi();

    // Quota headers sit outside auth so 401s still report the allowance.
    let submit_routes = Router::new()
        .route("/api/games", post(handlers::games::submit_game))
        .layer(DefaultBodyLimit::max(SUBMISSION_BODY_LIMIT))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.quota.clone(),
            quota_headers_middleware,
        ));

    Router::new()
        // Health endpoints (no auth required)
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api/openapi.json", get(move || async move { Json(openapi) }))
        .route("/api/libs", get(handlers::libs::list_libs))
        .route("/files/{*key}", get(handlers::files::serve_file))
        .merge(handlers::games::router())
        .merge(submit_routes)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(middleware::from_fn(metrics_service::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
