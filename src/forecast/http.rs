//! HTTP-backed forecast engine
//!
//! Delegates projection to an external forecasting service
//! (e.g. a Prophet sidecar) reachable at `FORECAST_API_BASE_URL`.

use crate::error::CollaboratorError;
use crate::forecast::Forecaster;
use crate::models::{ForecastPoint, MonthlyRecord, YearMonth};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct SeriesPoint {
    month: YearMonth,
    net_cash_flow: Decimal,
}

#[derive(Debug, Serialize)]
struct ForecastRequest {
    series: Vec<SeriesPoint>,
    horizon: usize,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    points: Vec<ForecastPoint>,
}

#[derive(Clone)]
pub struct HttpForecaster {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpForecaster {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(request_timeout)
            .build()
            .map_err(|e| CollaboratorError::Failed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn build_request(history: &[MonthlyRecord], horizon: usize) -> ForecastRequest {
        ForecastRequest {
            series: history
                .iter()
                .map(|r| SeriesPoint {
                    month: r.month,
                    net_cash_flow: r.net_cash_flow(),
                })
                .collect(),
            horizon,
        }
    }
}

#[async_trait]
impl Forecaster for HttpForecaster {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn forecast(
        &self,
        history: &[MonthlyRecord],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, CollaboratorError> {
        let url = format!("{}/forecast", self.base_url);
        let body = Self::build_request(history, horizon);

        debug!(%url, points = body.series.len(), horizon, "Requesting external forecast");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let err = CollaboratorError::from_transport(e, self.request_timeout);
                error!("Forecast API request failed: {}", err);
                err
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::RateLimited(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Forecast API returned {}: {}", status, text);
            return Err(CollaboratorError::Failed(format!(
                "forecast API returned {}: {}",
                status, text
            )));
        }

        let parsed: ForecastResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::from_transport(e, self.request_timeout))?;

        Ok(parsed.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::tests::history_from_net;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_request_body() {
        let history = history_from_net(&[100, -50]);
        let json = serde_json::to_value(HttpForecaster::build_request(&history, 4)).unwrap();

        assert_eq!(json["horizon"], 4);
        assert_eq!(json["series"][0]["month"], "2024-01");
        assert_eq!(json["series"][1]["net_cash_flow"], "-50");
    }

    #[tokio::test]
    async fn test_round_trip_against_service() {
        let router = Router::new().route(
            "/forecast",
            post(|Json(body): Json<serde_json::Value>| async move {
                let horizon = body["horizon"].as_u64().unwrap_or(0);
                let points: Vec<_> = (1..=horizon)
                    .map(|i| {
                        serde_json::json!({
                            "month": format!("2024-{:02}", 2 + i),
                            "projected_net_cash_flow": 100 * i,
                            "lower_bound": 50 * i,
                            "upper_bound": 150 * i
                        })
                    })
                    .collect();
                Json(serde_json::json!({ "points": points }))
            }),
        );
        let base = spawn(router).await;

        let forecaster = HttpForecaster::new(&base, Duration::from_secs(5)).unwrap();
        let points = forecaster.forecast(&history_from_net(&[1, 2]), 3).await.unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].month.to_string(), "2024-03");
        assert_eq!(points[2].projected_net_cash_flow, Decimal::new(300, 0));
        assert_eq!(points[2].lower_bound, Some(Decimal::new(150, 0)));
    }

    #[tokio::test]
    async fn test_rate_limit_and_server_error() {
        let router = Router::new()
            .route("/limited/forecast", post(|| async { (AxumStatus::TOO_MANY_REQUESTS, "slow down") }))
            .route("/broken/forecast", post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }))
            .route("/garbage/forecast", post(|| async { "not json" }));
        let base = spawn(router).await;
        let history = history_from_net(&[1, 2, 3]);

        let limited = HttpForecaster::new(&format!("{}limited", base), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            limited.forecast(&history, 3).await,
            Err(CollaboratorError::RateLimited(_))
        ));

        let broken = HttpForecaster::new(&format!("{}broken", base), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            broken.forecast(&history, 3).await,
            Err(CollaboratorError::Failed(_))
        ));

        let garbage = HttpForecaster::new(&format!("{}garbage", base), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            garbage.forecast(&history, 3).await,
            Err(CollaboratorError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_service_reports_timeout() {
        let router = Router::new().route(
            "/forecast",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({ "points": [] }))
            }),
        );
        let base = spawn(router).await;

        let deadline = Duration::from_millis(200);
        let forecaster = HttpForecaster::new(&base, deadline).unwrap();
        let err = forecaster
            .forecast(&history_from_net(&[1, 2, 3]), 3)
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "{:?}", err);
        assert_eq!(err, CollaboratorError::Timeout(deadline));
    }
}
