//! Request IDs and response logging.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;
use tracing::{Instrument, debug, info_span, warn};

static REQUEST_ID: &str = "x-request-id";

/// Runs the request inside a span keyed by its ID and echoes the ID back.
///
/// A caller-supplied `X-Request-Id` is reused; otherwise a ULID is generated.
pub async fn request_id(req: Request, next: Next) -> Response {
    let req_id = req
        .headers()
        .get(REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(String::from)
        .unwrap_or_else(|| ulid::Ulid::new().to_string());

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", req_id = %req_id);

    async move {
        let start = Instant::now();
        let mut response = next.run(req).await;
        let status = response.status().as_u16();
        let duration_ms = start.elapsed().as_millis() as u64;

        if response.status().is_server_error() {
            warn!(method = %method, path, status, duration_ms, "Response");
        } else {
            debug!(method = %method, path, status, duration_ms, "Response");
        }

        if let Ok(value) = HeaderValue::from_str(&req_id) {
            response.headers_mut().insert(REQUEST_ID, value);
        }
        response
    }
    .instrument(span)
    .await
}
