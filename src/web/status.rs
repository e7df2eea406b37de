//! Health and ledger status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use tracing::trace;

use crate::data::models::LedgerEntry;
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    commit: &'static str,
    timestamp: String,
}

/// Health check endpoint
pub(super) async fn health() -> Json<HealthResponse> {
    trace!("health check requested");
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        commit: env!("GIT_COMMIT_SHORT"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Current cursor and claimed period of the refresh job.
pub(super) async fn ledger(State(state): State<AppState>) -> Result<Json<LedgerEntry>, ApiError> {
    let job_name = state.job.job_name();
    state
        .ledger
        .read(job_name)
        .await
        .map_err(|e| db_error("Ledger read failed", e))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{job_name} has not run yet")))
}
