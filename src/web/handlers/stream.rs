//! Camera feed endpoints

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Extension,
};
use std::sync::Arc;

use crate::auth::{allowed, Action, Session};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::stream::{viewer_stream, MULTIPART_CONTENT_TYPE};

fn require_view(session: &Session) -> Result<()> {
    if allowed(session.role, Action::ViewStream) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' may not view the camera",
            session.role
        )))
    }
}

fn build(builder: axum::http::response::Builder, body: Body) -> Result<Response> {
    builder
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}

/// GET /video_feed
pub async fn video_feed(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    require_view(&session)?;

    let viewer_id = format!("{}-{}", session.username, uuid::Uuid::new_v4());
    let body = viewer_stream(state.mjpeg.clone(), viewer_id, state.keepalive());

    build(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE)
            .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(header::PRAGMA, "no-cache")
            .header(header::EXPIRES, "0")
            .header(header::CONNECTION, "keep-alive"),
        Body::from_stream(body),
    )
}

/// GET /snapshot
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Response> {
    require_view(&session)?;

    match state.mjpeg.current_frame() {
        Some(frame) if frame.is_valid_jpeg() => build(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "image/jpeg")
                .header(header::CACHE_CONTROL, "no-cache"),
            Body::from(frame.data_bytes()),
        ),
        _ => Err(AppError::ServiceUnavailable(
            "No frame available".to_string(),
        )),
    }
}
