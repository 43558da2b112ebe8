use axum::body::Body;
use axum::http::{Request, StatusCode};
use cashflow_risk_forecaster::{
    api::create_router,
    classifier::{RiskClassifier, ThresholdConfig},
    forecast::TrendForecaster,
    narrative::TemplateNarrator,
    orchestrator::{Orchestrator, Timeouts},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SAMPLE: &str = include_str!("fixtures/sample_cashflow.csv");

fn router() -> axum::Router {
    let orchestrator = Orchestrator::new(
        Arc::new(TrendForecaster),
        Arc::new(TemplateNarrator),
        RiskClassifier::new(ThresholdConfig::default()).unwrap(),
        Timeouts::default(),
    );
    create_router(Arc::new(orchestrator))
}

async fn post_json(path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(path, body.to_string()).await
}

async fn post_raw(path: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_healthy() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn csv_forecast_returns_classified_months() {
    let (status, body) = post_json("/api/forecast", json!({ "csv": SAMPLE, "months": 6 })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["message"], "6-month forecast generated successfully.");

    let report = &body["data"]["report"];
    let months = report["classified_months"].as_array().unwrap();
    assert_eq!(months.len(), 6);
    assert_eq!(months[0]["forecast_point"]["month"], "2025-01");
    assert_eq!(months[5]["forecast_point"]["month"], "2025-06");
    assert_eq!(report["history_months"], 12);
    assert_eq!(report["narrator"], "template");

    // Sample business is sliding into deficit
    assert_eq!(months[5]["risk_level"], "critical");
}

#[tokio::test]
async fn legacy_predict_route_defaults_to_three_months() {
    let (status, body) = post_json("/predict", json!({ "csv": SAMPLE })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["report"]["horizon"], 3);
}

#[tokio::test]
async fn horizon_out_of_range_is_bad_request() {
    for months in [2, 13] {
        let (status, body) = post_json("/api/forecast", json!({ "csv": SAMPLE, "months": months })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["stage"], "validation");
    }
}

#[tokio::test]
async fn header_only_csv_is_empty_history() {
    let (status, body) = post_json(
        "/api/forecast",
        json!({ "csv": "Month,Revenue,Expenses\n", "months": 3 }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("History is empty"));
}

#[tokio::test]
async fn inverted_thresholds_rejected() {
    let (status, body) = post_json(
        "/api/forecast",
        json!({
            "csv": SAMPLE,
            "months": 3,
            "thresholds": { "basis": "absolute", "critical": "1000", "warning": "500" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["stage"], "configuration");
}

#[tokio::test]
async fn records_with_absolute_thresholds() {
    let records: Vec<Value> = (1..=6)
        .map(|m| json!({ "month": format!("2024-{:02}", m), "revenue": 3000, "expenses": 1000 }))
        .collect();

    let (status, body) = post_json(
        "/api/forecast",
        json!({
            "records": records,
            "months": 3,
            "thresholds": { "basis": "absolute", "critical": "0", "warning": "1000" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let months = body["data"]["report"]["classified_months"].as_array().unwrap();
    assert!(months.iter().all(|m| m["risk_level"] == "safe"));
    assert_eq!(body["data"]["report"]["risk_counts"]["safe"], 3);
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let bodies = [
        "{not json".to_string(),
        json!({ "csv": SAMPLE, "months": -3 }).to_string(),
        json!({ "records": [{ "month": "someday", "revenue": 1 }] }).to_string(),
    ];

    for body in bodies {
        let (status, response) = post_raw("/api/forecast", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(response["success"], false);
        assert_eq!(response["stage"], "validation");
        assert!(response["error"].as_str().unwrap().starts_with("Invalid request body"));
    }
}

#[tokio::test]
async fn oversized_csv_amounts_are_rejected() {
    let csv = "Month,Revenue,Receivables\n\
               2024-01,79228162514264337593543950335,79228162514264337593543950335\n\
               2024-02,1,1\n2024-03,1,1\n";
    let (status, body) = post_json("/api/forecast", json!({ "csv": csv, "months": 3 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["stage"], "ingestion");
}

#[tokio::test]
async fn oversized_record_amounts_are_rejected() {
    let records: Vec<Value> = (1..=3)
        .map(|m| json!({ "month": format!("2024-{:02}", m), "revenue": "79228162514264337593543950335" }))
        .collect();
    let (status, body) = post_json("/api/forecast", json!({ "records": records, "months": 3 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["stage"], "validation");
}

#[tokio::test]
async fn extreme_relative_thresholds_still_answer() {
    let (status, body) = post_json(
        "/api/forecast",
        json!({
            "csv": SAMPLE,
            "months": 3,
            "thresholds": { "basis": "average_expenses", "critical": "-10000000000000000000000000", "warning": "10000000000000000000000000" }
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let months = body["data"]["report"]["classified_months"].as_array().unwrap();
    assert!(months.iter().all(|m| m["risk_level"] == "warning"));
}
