//! Forecaster trait and implementations
//!
//! A forecaster turns the historical net-cash-flow series into one
//! projected point per future month. The orchestrator treats it as an
//! external collaborator and never inspects how the projection is made.

use crate::error::CollaboratorError;
use crate::models::{ForecastPoint, MonthlyRecord};
use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

pub mod http;
pub use http::HttpForecaster;

/// z-score of an 80% two-sided interval
const INTERVAL_Z: f64 = 1.2816;

/// Trait for forecast engines
#[async_trait]
pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// Project `horizon` months beyond the last record of `history`
    async fn forecast(
        &self,
        history: &[MonthlyRecord],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, CollaboratorError>;
}

/// Least-squares linear trend over the net cash flow series.
/// Deterministic baseline used when no external engine is configured.
pub struct TrendForecaster;

#[async_trait]
impl Forecaster for TrendForecaster {
    fn name(&self) -> &'static str {
        "linear_trend"
    }

    async fn forecast(
        &self,
        history: &[MonthlyRecord],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, CollaboratorError> {
        let last = history
            .last()
            .ok_or_else(|| CollaboratorError::Failed("cannot forecast from an empty series".to_string()))?;

        let series = history
            .iter()
            .map(|r| {
                r.net_cash_flow().to_f64().ok_or_else(|| {
                    CollaboratorError::Failed(format!("net cash flow for {} out of range", r.month))
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let fit = LinearFit::fit(&series);

        (1..=horizon)
            .map(|step| -> Result<ForecastPoint, CollaboratorError> {
                let x = (series.len() - 1 + step) as f64;
                let projected = fit.predict(x);
                let half_width = INTERVAL_Z * fit.prediction_std(x);

                Ok(ForecastPoint::new(last.month.plus(step as u32), to_decimal(projected)?)
                    .with_bounds(
                        to_decimal(projected - half_width)?,
                        to_decimal(projected + half_width)?,
                    ))
            })
            .collect()
    }
}

fn to_decimal(value: f64) -> Result<Decimal, CollaboratorError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(2))
        .ok_or_else(|| CollaboratorError::InvalidResponse(format!("non-finite projection {}", value)))
}

/// Ordinary least squares on x = 0, 1, 2, ...
#[derive(Debug, Clone, Copy)]
struct LinearFit {
    n: usize,
    intercept: f64,
    slope: f64,
    x_mean: f64,
    sxx: f64,
    residual_std: f64,
}

impl LinearFit {
    fn fit(series: &[f64]) -> Self {
        let n = series.len();
        let x_mean = (n as f64 - 1.0) / 2.0;
        let y_mean = series.iter().sum::<f64>() / n as f64;

        let (sxy, sxx) = series.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (i, y)| {
            let dx = i as f64 - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });

        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = y_mean - slope * x_mean;

        let residual_std = if n > 2 {
            let sse: f64 = series
                .iter()
                .enumerate()
                .map(|(i, y)| {
                    let r = y - (intercept + slope * i as f64);
                    r * r
                })
                .sum();
            (sse / (n - 2) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            n,
            intercept,
            slope,
            x_mean,
            sxx,
            residual_std,
        }
    }

    fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Standard error of a new observation at `x`
    fn prediction_std(&self, x: f64) -> f64 {
        if self.residual_std == 0.0 {
            return 0.0;
        }
        let leverage = if self.sxx > 0.0 {
            (x - self.x_mean).powi(2) / self.sxx
        } else {
            0.0
        };
        self.residual_std * (1.0 + 1.0 / self.n as f64 + leverage).sqrt()
    }
}
