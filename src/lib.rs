//! SMB Cash-Flow Risk Forecaster
//!
//! Ingests monthly financials, projects future net cash flow through a
//! pluggable forecast engine, classifies each month as Safe / Warning /
//! Critical, and asks a narrator for a plain-language summary.
//!
//! PIPELINE:
//! INGEST → VALIDATE → FORECAST → CLASSIFY → NARRATE → REPORT

pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod error;
pub mod forecast;
pub mod gemini;
pub mod ingest;
pub mod models;
pub mod narrative;
pub mod orchestrator;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use classifier::{RiskClassifier, ThresholdConfig};
pub use orchestrator::Orchestrator;
