use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "rover_session";

/// Extract session token from request
pub fn extract_session_id(cookies: &CookieJar, headers: &axum::http::HeaderMap) -> Option<String> {
    // First try cookie
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    // Then try Authorization header (Bearer token)
    if let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    None
}

/// Authentication middleware
///
/// Resolves the caller's session and stores it in request extensions.
/// Role checks happen further down (the command dispatcher gates every
/// actuation request itself).
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(session_id) = extract_session_id(&cookies, request.headers()) else {
        return AppError::Unauthorized("not authenticated".to_string()).into_response();
    };

    match state.sessions.get(&session_id) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => AppError::Unauthorized("unknown session".to_string()).into_response(),
    }
}

/// Check if endpoint is public (no auth required)
fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/api/health")
}
