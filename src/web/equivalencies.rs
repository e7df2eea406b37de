//! Read path over stored equivalency records.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::models::{CourseEquivalency, EquivalencyRecord, elective_groups};
use crate::state::AppState;
use crate::web::error::{ApiError, db_error};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquivalencyParams {
    /// Only keep entries mapping onto this home course.
    pub home: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectivesResponse {
    pub school_id: String,
    pub term: String,
    pub departments: IndexMap<String, Vec<CourseEquivalency>>,
}

async fn load_record(state: &AppState, school_id: &str) -> Result<EquivalencyRecord, ApiError> {
    state
        .records
        .get(school_id)
        .await
        .map_err(|e| db_error("Equivalency lookup failed", e))?
        .ok_or_else(|| ApiError::not_found(format!("No equivalencies stored for {school_id}")))
}

/// `GET /api/equivalencies/{school_id}`
pub(super) async fn get_equivalencies(
    State(state): State<AppState>,
    Path(school_id): Path<String>,
    Query(params): Query<EquivalencyParams>,
) -> Result<Json<EquivalencyRecord>, ApiError> {
    let mut record = load_record(&state, &school_id).await?;

    if let Some(home) = params.home.as_deref() {
        if home.trim().is_empty() {
            return Err(ApiError::bad_request("home must not be empty"));
        }
        record.equivalents.retain(|e| e.matches_home_course(home));
    }

    Ok(Json(record))
}

/// `GET /api/equivalencies/{school_id}/electives`
pub(super) async fn get_electives(
    State(state): State<AppState>,
    Path(school_id): Path<String>,
) -> Result<Json<ElectivesResponse>, ApiError> {
    let record = load_record(&state, &school_id).await?;

    let departments = elective_groups(&record.equivalents)
        .into_iter()
        .map(|(dept, entries)| (dept.to_string(), entries.into_iter().cloned().collect()))
        .collect();

    Ok(Json(ElectivesResponse {
        school_id: record.school_id,
        term: record.term,
        departments,
    }))
}
