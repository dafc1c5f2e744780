pub mod robot;
pub mod stream;

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{Role, Session};
use crate::state::AppState;

// ============================================================================
// Health & Auth
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime().as_secs(),
    })
}

#[derive(Serialize)]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    pub user: String,
    pub role: Role,
}

pub async fn auth_check(Extension(session): Extension<Session>) -> Json<AuthCheckResponse> {
    Json(AuthCheckResponse {
        authenticated: true,
        user: session.username,
        role: session.role,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::actuation::{ActuationBackend, CommandDispatcher, Simulated};
    use crate::auth::{Role, Session, SessionStore};
    use crate::config::AppConfig;
    use crate::state::AppState;
    use crate::stream::MjpegStreamHandler;

    pub fn simulated_state() -> Arc<AppState> {
        let dispatcher = CommandDispatcher::new(ActuationBackend::Simulated(Simulated::new()));
        AppState::new(
            AppConfig::default(),
            SessionStore::new(),
            Arc::new(dispatcher),
            Arc::new(MjpegStreamHandler::new()),
        )
    }

    pub fn session(role: Role) -> Session {
        Session {
            username: format!("{}-user", role),
            role,
        }
    }
}
