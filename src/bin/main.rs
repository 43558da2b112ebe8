use cashflow_risk_forecaster::{
    classifier::format_amount, config::AppConfig, ingest, orchestrator::MIN_HORIZON,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: cashflow <csv-path> [months]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or(USAGE)?;
    let months: u32 = match args.next() {
        Some(raw) => raw.parse().map_err(|_| format!("invalid months '{}'\n{}", raw, USAGE))?,
        None => MIN_HORIZON,
    };

    let config = AppConfig::from_env()?;
    let orchestrator = config.build_orchestrator()?;

    let history = ingest::read_csv_file(&path)?;
    info!(path = %path, rows = history.len(), "Loaded history");

    match orchestrator.run(&history, months).await {
        Ok(report) => {
            println!("\n=== {}-MONTH CASH FLOW FORECAST ===", report.horizon);
            println!("Report ID: {}", report.report_id);
            println!("History: {} months (sha256 {})", report.history_months, report.history_fingerprint);
            println!("Engine: {} / Narrator: {}\n", report.forecast_engine, report.narrator);

            println!("{:<8} {:>16} {:>16} {:>16}  {:<8}  Reason", "Month", "Projected", "Lower", "Upper", "Risk");
            for m in &report.classified_months {
                let p = &m.forecast_point;
                let bound = |b: Option<rust_decimal::Decimal>| b.map(format_amount).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<8} {:>16} {:>16} {:>16}  {:<8}  {}",
                    p.month.to_string(),
                    format_amount(p.projected_net_cash_flow),
                    bound(p.lower_bound),
                    bound(p.upper_bound),
                    m.risk_level.to_string(),
                    m.rationale
                );
            }

            println!(
                "\nSafe: {}  Warning: {}  Critical: {}",
                report.risk_counts.safe, report.risk_counts.warning, report.risk_counts.critical
            );
            println!("\nSummary:\n{}", report.narrative);
            Ok(())
        }
        Err(e) => {
            eprintln!("Forecast failed during {}: {}", e.stage(), e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
