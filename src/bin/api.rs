use cashflow_risk_forecaster::{api::start_server, config::AppConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_none() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env, summaries will use the built-in template");
    }

    info!("🚀 SMB Cash-Flow Risk Forecaster - API Server");
    info!("📍 Port: {}", config.port);

    let orchestrator = Arc::new(config.build_orchestrator()?);

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
