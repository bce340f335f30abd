//! services/api/src/web/middleware.rs
//!
//! Session middleware for routes that need a browser session.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::web::state::AppState;

/// The name of the cookie carrying the browser session id.
pub const SESSION_COOKIE: &str = "tutor_session";

/// Finds the browser session id in a `Cookie` header value.
pub fn session_id_from_cookies(cookie_header: &str) -> Option<Uuid> {
    cookie_header.split(';').find_map(|c| {
        let (name, value) = c.trim().split_once('=')?;
        if name == SESSION_COOKIE {
            Uuid::parse_str(value).ok()
        } else {
            None
        }
    })
}

/// The session id carried by a request's `Cookie` header, if any.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_id_from_cookies)
}

/// Middleware that resolves the session cookie to a live `BrowserSession`.
///
/// If valid, inserts the session into request extensions for handlers to use.
/// If missing or unknown, returns 401 Unauthorized.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session_id = session_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let session = state.sessions.get(session_id).await.ok_or_else(|| {
        warn!(%session_id, "Request carried an unknown session id.");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
