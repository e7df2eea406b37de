//! Web API router construction.

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;
use crate::web::middleware::request_id::request_id;
use crate::web::{equivalencies, refresh, status};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let read_router = Router::new()
        .route("/health", get(status::health))
        .route("/ledger", get(status::ledger))
        .route(
            "/equivalencies/{school_id}",
            get(equivalencies::get_equivalencies),
        )
        .route(
            "/equivalencies/{school_id}/electives",
            get(equivalencies::get_electives),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(app_state.clone());

    // A refresh run lasts as long as its batch; no request timeout here.
    let job_router = Router::new()
        .route(
            "/refresh",
            get(refresh::trigger_refresh).post(refresh::trigger_refresh),
        )
        .with_state(app_state);

    Router::new()
        .nest("/api", read_router.merge(job_router))
        .layer(axum::middleware::from_fn(request_id))
}
