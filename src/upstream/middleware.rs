//! HTTP middleware for the upstream client.

use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::utils::fmt_duration;

const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(10);

/// Logs every outbound request with its status and latency.
pub struct RequestLogger;

#[async_trait::async_trait]
impl Middleware for RequestLogger {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let method = req.method().clone();
        let path = req.url().path().to_string();
        let start = Instant::now();

        let result = next.run(req, extensions).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) if response.status().is_success() => {
                trace!(
                    method = %method,
                    path,
                    status = response.status().as_u16(),
                    duration = fmt_duration(elapsed),
                    "Upstream request completed"
                );
            }
            Ok(response) => {
                debug!(
                    method = %method,
                    path,
                    status = response.status().as_u16(),
                    duration = fmt_duration(elapsed),
                    "Upstream request returned error status"
                );
            }
            Err(e) => {
                debug!(
                    method = %method,
                    path,
                    duration = fmt_duration(elapsed),
                    error = ?e,
                    "Upstream request failed"
                );
            }
        }

        if elapsed > SLOW_REQUEST_THRESHOLD {
            warn!(method = %method, path, duration = fmt_duration(elapsed), "Slow upstream request");
        }

        result
    }
}
