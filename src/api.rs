//! REST API Server for the cash-flow forecaster
//!
//! Exposes the orchestrator via HTTP endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::classifier::{RiskClassifier, ThresholdConfig};
use crate::error::{ForecastError, Stage};
use crate::ingest;
use crate::models::{ForecastReport, MonthlyRecord};
use crate::orchestrator::Orchestrator;

/// =============================
/// Request Models
/// =============================

fn default_months() -> u32 {
    3
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ForecastRequest {
    /// Raw CSV text with Month/Revenue/Expenses/Receivables/Payables columns
    pub csv: Option<String>,
    /// Already-parsed records, as an alternative to `csv`
    pub records: Option<Vec<MonthlyRecord>>,
    #[serde(default = "default_months")]
    pub months: u32,
    /// Per-request threshold override
    pub thresholds: Option<ThresholdConfig>,
}

#[derive(Debug, Serialize)]
struct ForecastPayload {
    message: String,
    report: ForecastReport,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            stage: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            stage: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Body that could not be decoded into a request
    fn rejected(rejection: &JsonRejection) -> Self {
        Self {
            stage: Some(Stage::Validation.to_string()),
            ..Self::error(format!("Invalid request body: {}", rejection.body_text()))
        }
    }

    fn from_forecast_error(err: &ForecastError) -> Self {
        Self {
            stage: Some(err.stage().to_string()),
            ..Self::error(err.to_string())
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Helpers
/// =============================

fn status_for(err: &ForecastError) -> StatusCode {
    match err.stage() {
        Stage::Validation | Stage::Ingestion => StatusCode::BAD_REQUEST,
        Stage::Configuration => match err {
            ForecastError::InvalidThresholdConfig(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        },
        Stage::Forecast | Stage::Narrative if err.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        Stage::Forecast | Stage::Narrative => StatusCode::BAD_GATEWAY,
    }
}

fn load_history(req: &mut ForecastRequest) -> crate::Result<Vec<MonthlyRecord>> {
    match (req.csv.take(), req.records.take()) {
        (Some(csv), None) => ingest::parse_csv(csv.as_bytes()),
        (None, Some(mut records)) => {
            records.sort_by_key(|r| r.month);
            Ok(records)
        }
        (Some(_), Some(_)) => Err(ForecastError::InvalidHistory(
            "provide either 'csv' or 'records', not both".to_string(),
        )),
        (None, None) => Err(ForecastError::EmptyHistory),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Forecast Endpoint
/// =============================

async fn forecast_for(state: &ApiState, mut req: ForecastRequest) -> crate::Result<ForecastReport> {
    let history = load_history(&mut req)?;

    match req.thresholds.take() {
        Some(thresholds) => {
            let classifier = RiskClassifier::new(thresholds)?;
            state
                .orchestrator
                .run_with(&history, req.months, &classifier)
                .await
        }
        None => state.orchestrator.run(&history, req.months).await,
    }
}

async fn run_forecast(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<ForecastRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected forecast request body");
            return (StatusCode::BAD_REQUEST, Json(ApiResponse::rejected(&rejection)));
        }
    };

    info!(months = req.months, "Received forecast request");

    let result = forecast_for(&state, req).await;

    match result {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(ForecastPayload {
                message: format!("{}-month forecast generated successfully.", report.horizon),
                report,
            })),
        ),
        Err(e) => {
            warn!(stage = %e.stage(), error = %e, "Forecast request failed");
            (status_for(&e), Json(ApiResponse::from_forecast_error(&e)))
        }
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/forecast", post(run_forecast))
        .route("/predict", post(run_forecast))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
