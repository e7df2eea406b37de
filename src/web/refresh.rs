//! Manual trigger for the equivalency refresh job.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use tracing::error;

use crate::state::AppState;
use crate::sync::SyncError;
use crate::sync::scheduler::log_run_result;

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run the refresh job once and report whether it succeeded.
///
/// The run is spawned so that a client hanging up does not cancel it midway
/// through a batch.
pub(super) async fn trigger_refresh(
    State(state): State<AppState>,
) -> (StatusCode, Json<RefreshResponse>) {
    let job = state.job.clone();
    let result = match tokio::spawn(async move { job.trigger().await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Refresh task aborted");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RefreshResponse {
                    success: false,
                    error: Some("Refresh run aborted".to_string()),
                }),
            );
        }
    };

    log_run_result(&result);

    match result {
        Ok(_) => (
            StatusCode::OK,
            Json(RefreshResponse {
                success: true,
                error: None,
            }),
        ),
        Err(e) => {
            let status = match e {
                SyncError::AdmissionDenied { .. } => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(RefreshResponse {
                    success: false,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
