//! Environment configuration
//!
//! All settings come from the process environment (optionally seeded from
//! `.env`). Nothing is stored globally: the resulting `AppConfig` is passed
//! explicitly to whatever needs it.

use crate::classifier::{CompareOn, RiskClassifier, ThresholdBasis, ThresholdConfig};
use crate::error::ForecastError;
use crate::forecast::{Forecaster, HttpForecaster, TrendForecaster};
use crate::gemini::DEFAULT_MODEL;
use crate::narrative::{GeminiNarrator, Narrator, TemplateNarrator};
use crate::orchestrator::{Orchestrator, Timeouts};
use crate::Result;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub forecast_api_base_url: Option<String>,
    pub timeouts: Timeouts,
    pub thresholds: ThresholdConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            forecast_api_base_url: None,
            timeouts: Timeouts::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value::<u16>("PORT", &raw)?,
            None => defaults.port,
        };

        let seconds = |key: &str, fallback: Duration| -> Result<Duration> {
            match get(key) {
                Some(raw) => Ok(Duration::from_secs(parse_value::<u64>(key, &raw)?)),
                None => Ok(fallback),
            }
        };

        let timeouts = Timeouts {
            forecast: seconds("FORECAST_TIMEOUT_SECS", defaults.timeouts.forecast)?,
            narrative: seconds("NARRATIVE_TIMEOUT_SECS", defaults.timeouts.narrative)?,
        };

        let mut thresholds = defaults.thresholds.clone();
        if let Some(raw) = get("RISK_THRESHOLD_BASIS") {
            thresholds.basis = parse_basis(&raw)?;
        }
        if let Some(raw) = get("RISK_CRITICAL_THRESHOLD") {
            thresholds.critical = parse_value::<Decimal>("RISK_CRITICAL_THRESHOLD", &raw)?;
        }
        if let Some(raw) = get("RISK_WARNING_THRESHOLD") {
            thresholds.warning = parse_value::<Decimal>("RISK_WARNING_THRESHOLD", &raw)?;
        }
        if let Some(raw) = get("RISK_COMPARE_ON") {
            thresholds.compare_on = parse_compare_on(&raw)?;
        }
        if let Some(raw) = get("RISK_TREND_WINDOW") {
            thresholds.trend_window = parse_value::<usize>("RISK_TREND_WINDOW", &raw)?;
        }
        thresholds.validate()?;

        Ok(Self {
            port,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            forecast_api_base_url: get("FORECAST_API_BASE_URL"),
            timeouts,
            thresholds,
        })
    }

    /// Wire collaborators according to what is configured
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let forecaster: Arc<dyn Forecaster> = match &self.forecast_api_base_url {
            Some(url) => {
                info!(%url, "Using external forecast engine");
                let engine = HttpForecaster::new(url, self.timeouts.forecast)
                    .map_err(|e| ForecastError::Config(e.to_string()))?;
                Arc::new(engine)
            }
            None => {
                info!("FORECAST_API_BASE_URL not set, using linear trend forecaster");
                Arc::new(TrendForecaster)
            }
        };

        let narrator: Arc<dyn Narrator> = match &self.gemini_api_key {
            Some(key) => {
                info!(model = %self.gemini_model, "Using Gemini narrator");
                let gemini = GeminiNarrator::new(key.clone(), &self.gemini_model)
                    .map_err(|e| ForecastError::Config(e.to_string()))?;
                Arc::new(gemini)
            }
            None => {
                warn!("GEMINI_API_KEY not set, falling back to template narrator");
                Arc::new(TemplateNarrator)
            }
        };

        let classifier = RiskClassifier::new(self.thresholds.clone())?;

        Ok(Orchestrator::new(forecaster, narrator, classifier, self.timeouts))
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ForecastError::Config(format!("{}='{}': {}", key, raw, e)))
}

fn parse_basis(raw: &str) -> Result<ThresholdBasis> {
    match raw.to_lowercase().as_str() {
        "absolute" => Ok(ThresholdBasis::Absolute),
        "average_expenses" | "average-expenses" | "relative" => Ok(ThresholdBasis::AverageExpenses),
        other => Err(ForecastError::Config(format!(
            "RISK_THRESHOLD_BASIS='{}': expected 'absolute' or 'average_expenses'",
            other
        ))),
    }
}

fn parse_compare_on(raw: &str) -> Result<CompareOn> {
    match raw.to_lowercase().as_str() {
        "projected" => Ok(CompareOn::Projected),
        "lower_bound" | "lower-bound" | "lower" => Ok(CompareOn::LowerBound),
        other => Err(ForecastError::Config(format!(
            "RISK_COMPARE_ON='{}': expected 'projected' or 'lower_bound'",
            other
        ))),
    }
}
