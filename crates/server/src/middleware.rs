use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::ORIGIN};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{Instrument, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Refuse browser calls from origins outside the allow-list.
///
/// Requests without an `Origin` header (same-origin navigations, curl) pass.
pub(crate) async fn origin_guard(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(origin) = request.headers().get(ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !state.config.allows_origin(origin) {
            warn!(origin, "request from disallowed origin");
            return AppError::ForbiddenOrigin(origin.to_owned()).into_response();
        }
    }
    next.run(request).await
}

pub(crate) async fn request_tracing(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 64)
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);

    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
