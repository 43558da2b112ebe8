//! Error types for the cash-flow risk forecaster

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for forecaster operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Failure reported by an external collaborator (forecast engine or narrator)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("request failed: {0}")]
    Failed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CollaboratorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CollaboratorError::Timeout(_))
    }

    /// Map a transport error, dropping the request URL from the message.
    /// `deadline` is the client-side timeout the request was sent with.
    pub fn from_transport(e: reqwest::Error, deadline: Duration) -> Self {
        if e.is_timeout() {
            return CollaboratorError::Timeout(deadline);
        }
        let decode = e.is_decode();
        let message = e.without_url().to_string();
        if decode {
            CollaboratorError::InvalidResponse(message)
        } else {
            CollaboratorError::Failed(message)
        }
    }
}

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    Ingestion,
    Validation,
    Forecast,
    Narrative,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configuration => "configuration",
            Stage::Ingestion => "ingestion",
            Stage::Validation => "validation",
            Stage::Forecast => "forecast",
            Stage::Narrative => "narrative",
        };
        write!(f, "{}", s)
    }
}

#[derive(Error, Debug)]
pub enum ForecastError {

    // =============================
    // Request Validation
    // =============================

    #[error("Invalid horizon: {horizon} (must be between 3 and 12 months)")]
    InvalidHorizon { horizon: u32 },

    #[error("History is empty: at least one monthly record is required")]
    EmptyHistory,

    #[error("Invalid history: {0}")]
    InvalidHistory(String),

    #[error("Invalid threshold configuration: {0}")]
    InvalidThresholdConfig(String),

    // =============================
    // Collaborator Failures
    // =============================

    #[error("Forecast engine '{engine}' failed: {source}")]
    ForecastEngineFailure {
        engine: &'static str,
        #[source]
        source: CollaboratorError,
    },

    #[error("Narrative generator '{narrator}' failed: {source}")]
    NarrativeGeneratorFailure {
        narrator: &'static str,
        #[source]
        source: CollaboratorError,
    },

    // =============================
    // Ingestion & Configuration
    // =============================

    #[error("CSV ingestion error at line {line}: {message}")]
    Ingestion { line: u64, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForecastError {
    /// Stage of the pipeline that produced this error
    pub fn stage(&self) -> Stage {
        match self {
            ForecastError::InvalidHorizon { .. }
            | ForecastError::EmptyHistory
            | ForecastError::InvalidHistory(_) => Stage::Validation,
            ForecastError::InvalidThresholdConfig(_) | ForecastError::Config(_) => {
                Stage::Configuration
            }
            ForecastError::ForecastEngineFailure { .. } => Stage::Forecast,
            ForecastError::NarrativeGeneratorFailure { .. } => Stage::Narrative,
            ForecastError::Ingestion { .. }
            | ForecastError::Csv(_)
            | ForecastError::SerializationError(_)
            | ForecastError::IoError(_) => Stage::Ingestion,
        }
    }

    /// True when a collaborator call hit its deadline
    pub fn is_timeout(&self) -> bool {
        match self {
            ForecastError::ForecastEngineFailure { source, .. }
            | ForecastError::NarrativeGeneratorFailure { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tagging() {
        let err = ForecastError::ForecastEngineFailure {
            engine: "trend",
            source: CollaboratorError::Timeout(Duration::from_secs(1)),
        };
        assert_eq!(err.stage(), Stage::Forecast);
        assert!(err.is_timeout());
        assert!(err.to_string().contains("trend"));

        let err = ForecastError::NarrativeGeneratorFailure {
            narrator: "gemini",
            source: CollaboratorError::RateLimited("429".into()),
        };
        assert_eq!(err.stage(), Stage::Narrative);
        assert!(!err.is_timeout());

        assert_eq!(ForecastError::EmptyHistory.stage(), Stage::Validation);
        assert_eq!(
            ForecastError::InvalidThresholdConfig("x".into()).stage(),
            Stage::Configuration
        );
    }
}
