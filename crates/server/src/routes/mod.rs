//! API routes

pub mod auth;
pub mod health;
pub mod messages;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{state::AppState, ws};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Public API routes (no auth required) - under /api/v1
    let public_api_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // Protected API routes (bearer auth via the AuthUser extractor)
    let protected_api_routes = Router::new().route("/messages", get(messages::get_messages));

    let cors = match state.config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
        Err(_) => {
            tracing::warn!(
                origin = %state.config.cors_origin,
                "Invalid CORS_ORIGIN; falling back to permissive CORS"
            );
            CorsLayer::permissive()
        }
    };

    Router::new()
        .merge(health_routes)
        .route("/ws", get(ws::handler::ws_handler))
        .nest("/api/v1", public_api_routes.merge(protected_api_routes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
