mod helpers;

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use helpers::{FakeSource, Harness, equivalency, schools, settings};
use serde_json::Value;
use tower::ServiceExt;
use transfer_sync::data::models::EquivalencyRecord;
use transfer_sync::state::AppState;
use transfer_sync::web::create_router;

fn harness() -> Harness {
    Harness::new(
        settings(10, 4, Duration::from_secs(5)),
        schools(25),
        FakeSource::default(),
    )
}

fn state(h: &Harness) -> AppState {
    AppState::new(h.job.clone(), h.ledger.clone(), h.records.clone())
}

async fn call(state: AppState, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = create_router(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_refresh_then_denied() {
    let h = harness();

    let (status, body) = call(state(&h), Method::GET, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "success": true }));
    assert_eq!(h.records.len(), 10);

    let (status, body) = call(state(&h), Method::POST, "/api/refresh").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("once per period"));
    assert_eq!(h.records.len(), 10);
}

#[tokio::test]
async fn test_refresh_reports_persistence_failure() {
    let h = harness();
    h.records.fail_commits.store(true, Ordering::SeqCst);

    let (status, body) = call(state(&h), Method::POST, "/api/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    // The cause stays in the logs
    assert!(!body["error"].as_str().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn test_refresh_reports_entity_source_failure() {
    let h = harness();
    h.entities.fail.store(true, Ordering::SeqCst);

    let (status, body) = call(state(&h), Method::GET, "/api/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_equivalency_lookup() {
    let h = harness();
    h.records.insert(EquivalencyRecord {
        school_id: "S0007".to_string(),
        school_name: "School 7".to_string(),
        term: "202508".to_string(),
        equivalents: vec![
            equivalency("MATH 1551", "MATH 2413", "4.0"),
            equivalency("CS 1301", "COSC 1436", "3.0"),
            equivalency("1X1XXX", "MATH 0310", "0.0"),
            equivalency("MATH 1552", "MATH 2414", "4.0"),
        ],
    });

    let (status, body) = call(state(&h), Method::GET, "/api/equivalencies/S0007").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schoolId"], "S0007");
    assert_eq!(body["equivalents"].as_array().unwrap().len(), 4);
    assert_eq!(body["equivalents"][2]["creditHours"], "0.0");

    let (status, body) = call(
        state(&h),
        Method::GET,
        "/api/equivalencies/S0007?home=cs%201301",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let filtered = body["equivalents"].as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["externalCourse"], "COSC 1436");

    let (status, body) = call(
        state(&h),
        Method::GET,
        "/api/equivalencies/S0007/electives",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let departments = body["departments"].as_object().unwrap();
    assert_eq!(departments["MATH"].as_array().unwrap().len(), 2);
    assert_eq!(departments["COSC"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_equivalency_lookup_missing() {
    let h = harness();

    let (status, body) = call(state(&h), Method::GET, "/api/equivalencies/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_ledger_status() {
    let h = harness();

    let (status, _) = call(state(&h), Method::GET, "/api/ledger").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    call(state(&h), Method::GET, "/api/refresh").await;
    let (status, body) = call(state(&h), Method::GET, "/api/ledger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cursor"], 10);
    assert_eq!(body["jobName"], helpers::JOB);
}

#[tokio::test]
async fn test_request_id_echoed() {
    let h = harness();
    let response = create_router(state(&h))
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}

#[tokio::test]
async fn test_request_id_generated_when_absent() {
    let h = harness();
    let response = create_router(state(&h))
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert_eq!(id.len(), 26);
}
