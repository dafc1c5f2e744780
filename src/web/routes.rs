use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::auth::auth_middleware;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(handlers::health_check));

    // Any authenticated session; role checks happen per action
    let user_routes = Router::new()
        .route("/auth/check", get(handlers::auth_check))
        .route("/robot/status", get(handlers::robot::robot_status));

    let api_routes = Router::new().merge(public_routes).merge(user_routes);

    let robot_routes = Router::new()
        .route("/move/:token", post(handlers::robot::move_robot))
        .route("/control", post(handlers::robot::control))
        .route("/video_feed", get(handlers::stream::video_feed))
        .route("/snapshot", get(handlers::stream::snapshot));

    Router::new()
        .nest("/api", api_routes)
        .merge(robot_routes)
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
