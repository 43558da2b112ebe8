//! Forecast orchestrator
//!
//! VALIDATE → FORECAST → CLASSIFY → NARRATE → REPORT
//!
//! Each run is request-scoped: the orchestrator itself holds only
//! immutable collaborators and configuration.

use crate::audit::compute_history_fingerprint;
use crate::classifier::RiskClassifier;
use crate::error::{CollaboratorError, ForecastError};
use crate::forecast::Forecaster;
use crate::models::{
    ClassifiedMonth, ForecastPoint, ForecastReport, MonthlyRecord, RiskCounts, MAX_AMOUNT,
};
use crate::narrative::Narrator;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use uuid::Uuid;

pub const MIN_HORIZON: u32 = 3;
pub const MAX_HORIZON: u32 = 12;

/// Deadlines for the two collaborator calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub forecast: Duration,
    pub narrative: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            forecast: Duration::from_secs(30),
            narrative: Duration::from_secs(60),
        }
    }
}

pub fn validate_horizon(horizon: u32) -> Result<()> {
    if (MIN_HORIZON..=MAX_HORIZON).contains(&horizon) {
        Ok(())
    } else {
        Err(ForecastError::InvalidHorizon { horizon })
    }
}

/// Non-empty, strictly increasing by month, amounts within `MAX_AMOUNT`
pub fn validate_history(history: &[MonthlyRecord]) -> Result<()> {
    if history.is_empty() {
        return Err(ForecastError::EmptyHistory);
    }

    if let Some((record, (column, value))) = history
        .iter()
        .find_map(|r| r.oversized_amount().map(|found| (r, found)))
    {
        return Err(ForecastError::InvalidHistory(format!(
            "{} for {} is {}, beyond the supported magnitude of {}",
            column, record.month, value, MAX_AMOUNT
        )));
    }

    if let Some(pair) = history.windows(2).find(|w| w[0].month >= w[1].month) {
        return Err(ForecastError::InvalidHistory(format!(
            "records must be in strictly increasing month order ({} followed by {})",
            pair[0].month, pair[1].month
        )));
    }

    Ok(())
}

/// Check the engine returned exactly `horizon` future months, in order
fn validate_forecast(
    points: &[ForecastPoint],
    horizon: usize,
    history: &[MonthlyRecord],
) -> std::result::Result<(), CollaboratorError> {
    if points.len() != horizon {
        return Err(CollaboratorError::InvalidResponse(format!(
            "expected {} forecast points, got {}",
            horizon,
            points.len()
        )));
    }

    if let (Some(last), Some(first)) = (history.last(), points.first()) {
        if first.month <= last.month {
            return Err(CollaboratorError::InvalidResponse(format!(
                "forecast starts at {} which is not after the last known month {}",
                first.month, last.month
            )));
        }
    }

    if points.windows(2).any(|w| w[0].month >= w[1].month) {
        return Err(CollaboratorError::InvalidResponse(
            "forecast months are not in chronological order".to_string(),
        ));
    }

    Ok(())
}

/// Orchestrator that sequences forecaster, classifier and narrator
pub struct Orchestrator {
    forecaster: Arc<dyn Forecaster>,
    narrator: Arc<dyn Narrator>,
    classifier: RiskClassifier,
    timeouts: Timeouts,
}

impl Orchestrator {
    pub fn new(
        forecaster: Arc<dyn Forecaster>,
        narrator: Arc<dyn Narrator>,
        classifier: RiskClassifier,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            forecaster,
            narrator,
            classifier,
            timeouts,
        }
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Run with the default classifier
    pub async fn run(&self, history: &[MonthlyRecord], horizon: u32) -> Result<ForecastReport> {
        self.run_with(history, horizon, &self.classifier).await
    }

    /// Run with a caller-supplied classifier (per-request thresholds)
    pub async fn run_with(
        &self,
        history: &[MonthlyRecord],
        horizon: u32,
        classifier: &RiskClassifier,
    ) -> Result<ForecastReport> {
        let start_time = Instant::now();

        // === VALIDATE ===
        validate_horizon(horizon)?;
        validate_history(history)?;
        let horizon = horizon as usize;
        let history_fingerprint = compute_history_fingerprint(history)?;

        info!(
            history_months = history.len(),
            horizon,
            engine = self.forecaster.name(),
            narrator = self.narrator.name(),
            "Orchestrator: starting forecast"
        );

        // === FORECAST ===
        let points = self.call_forecaster(history, horizon).await?;
        debug!(points = points.len(), "Forecast received");

        // === CLASSIFY ===
        let classified_months = classifier.classify_all(&points, history);
        let risk_counts = RiskCounts::tally(&classified_months);

        info!(
            safe = risk_counts.safe,
            warning = risk_counts.warning,
            critical = risk_counts.critical,
            "Classification complete"
        );

        // === NARRATE ===
        let narrative = self.call_narrator(&classified_months).await?;

        let report = ForecastReport {
            report_id: Uuid::new_v4(),
            horizon,
            history_months: history.len(),
            history_fingerprint,
            forecast_engine: self.forecaster.name().to_string(),
            narrator: self.narrator.name().to_string(),
            classified_months,
            risk_counts,
            narrative,
            generated_at: Utc::now(),
        };

        info!(
            report_id = ?report.report_id,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Orchestrator: report assembled"
        );

        Ok(report)
    }

    async fn call_forecaster(
        &self,
        history: &[MonthlyRecord],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>> {
        let engine = self.forecaster.name();
        let deadline = self.timeouts.forecast;

        let outcome = match tokio::time::timeout(deadline, self.forecaster.forecast(history, horizon)).await {
            Ok(Ok(points)) => validate_forecast(&points, horizon, history).map(|_| points),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CollaboratorError::Timeout(deadline)),
        };

        outcome.map_err(|source| {
            error!(engine, error = %source, "Forecast engine failed");
            ForecastError::ForecastEngineFailure { engine, source }
        })
    }

    async fn call_narrator(&self, months: &[ClassifiedMonth]) -> Result<String> {
        let narrator = self.narrator.name();
        let deadline = self.timeouts.narrative;

        let outcome = match tokio::time::timeout(deadline, self.narrator.narrate(months)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(deadline)),
        };

        outcome.map_err(|source| {
            error!(narrator, error = %source, "Narrative generator failed");
            ForecastError::NarrativeGeneratorFailure { narrator, source }
        })
    }
}
