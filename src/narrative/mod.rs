//! Narrator trait and implementations
//!
//! Narrators turn the classified forecast into a human-readable summary.

use crate::classifier::format_amount;
use crate::error::CollaboratorError;
use crate::models::{ClassifiedMonth, RiskCounts, RiskLevel};
use async_trait::async_trait;

pub mod gemini;
pub use gemini::GeminiNarrator;

/// Trait for narrative generation (LLM controlled)
#[async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn narrate(&self, months: &[ClassifiedMonth]) -> Result<String, CollaboratorError>;
}

/// Markdown table of the classified forecast, one row per month
pub fn render_table(months: &[ClassifiedMonth]) -> String {
    let optional = |v: Option<rust_decimal::Decimal>| v.map(format_amount).unwrap_or_else(|| "-".to_string());

    let mut table = String::from(
        "| Month | Projected Net Cash | Lower Bound | Upper Bound | Risk | Reason |\n\
         |---|---|---|---|---|---|\n",
    );

    for m in months {
        let p = &m.forecast_point;
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            p.month,
            format_amount(p.projected_net_cash_flow),
            optional(p.lower_bound),
            optional(p.upper_bound),
            m.risk_level,
            m.rationale.replace('|', "/"),
        ));
    }

    table
}

/// Deterministic narrator used when no LLM is configured.
/// Keeps the service functional offline.
pub struct TemplateNarrator;

#[async_trait]
impl Narrator for TemplateNarrator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn narrate(&self, months: &[ClassifiedMonth]) -> Result<String, CollaboratorError> {
        Ok(template_summary(months))
    }
}

fn template_summary(months: &[ClassifiedMonth]) -> String {
    if months.is_empty() {
        return "No forecast months to summarize.".to_string();
    }

    let counts = RiskCounts::tally(months);
    let mut out = format!(
        "{}-month outlook: {} critical, {} warning, {} safe.",
        months.len(),
        counts.critical,
        counts.warning,
        counts.safe
    );

    if let Some(lowest) = months
        .iter()
        .min_by_key(|m| m.forecast_point.projected_net_cash_flow)
    {
        out.push_str(&format!(
            " Lowest projected net cash flow is {} in {}.",
            format_amount(lowest.forecast_point.projected_net_cash_flow),
            lowest.forecast_point.month
        ));
    }

    let first_critical = months.iter().find(|m| m.risk_level == RiskLevel::Critical);
    let worst = months.iter().map(|m| m.risk_level).max().unwrap_or(RiskLevel::Safe);

    match (worst, first_critical) {
        (RiskLevel::Critical, Some(m)) => out.push_str(&format!(
            " A shortfall is likely from {}; arrange a credit line or accelerate receivables before then.",
            m.forecast_point.month
        )),
        (RiskLevel::Warning, _) | (RiskLevel::Critical, None) => out.push_str(
            " Cash is tight in places; stagger payables and follow up on outstanding receivables.",
        ),
        (RiskLevel::Safe, _) => {
            out.push_str(" Liquidity looks healthy; consider building a cash reserve.")
        }
    }

    out
}
