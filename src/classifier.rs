//! Risk Classifier
//!
//! Maps each forecasted month onto a risk tier:
//! - Critical: compared cash flow at or below the critical floor
//! - Warning: at or below the warning floor
//! - Safe: everything above
//!
//! Floors are either absolute amounts or fractions of the trailing
//! window's average monthly expenses.

use crate::error::ForecastError;
use crate::models::{ClassifiedMonth, ForecastPoint, MonthlyRecord, RiskLevel};
use crate::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TREND_WINDOW: usize = 6;

/// How threshold values are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBasis {
    /// Thresholds are currency floors
    Absolute,
    /// Thresholds are fractions of the trailing average monthly expenses
    #[default]
    AverageExpenses,
}

/// Which forecast value is compared against the floors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOn {
    #[default]
    Projected,
    /// Pessimistic band edge; falls back to the projection when absent
    LowerBound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub basis: ThresholdBasis,
    pub critical: Decimal,
    pub warning: Decimal,
    pub compare_on: CompareOn,
    pub trend_window: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            basis: ThresholdBasis::AverageExpenses,
            critical: Decimal::new(-25, 2),
            warning: Decimal::new(10, 2),
            compare_on: CompareOn::Projected,
            trend_window: DEFAULT_TREND_WINDOW,
        }
    }
}

impl ThresholdConfig {
    /// Absolute currency floors, everything else default
    pub fn absolute(critical: Decimal, warning: Decimal) -> Self {
        Self {
            basis: ThresholdBasis::Absolute,
            critical,
            warning,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.critical > self.warning {
            return Err(ForecastError::InvalidThresholdConfig(format!(
                "critical threshold {} is above warning threshold {}",
                self.critical, self.warning
            )));
        }
        if self.trend_window == 0 {
            return Err(ForecastError::InvalidThresholdConfig(
                "trend window must cover at least one month".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolved currency floors for one history window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Floors {
    pub critical: Decimal,
    pub warning: Decimal,
}

/// Tier for a value against fixed floors. Total and monotonic.
pub fn classify_value(value: Decimal, floors: Floors) -> RiskLevel {
    if value <= floors.critical {
        RiskLevel::Critical
    } else if value <= floors.warning {
        RiskLevel::Warning
    } else {
        RiskLevel::Safe
    }
}

/// Summary of the trailing history window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendContext {
    pub months: usize,
    pub average_net_flow: Decimal,
    pub average_expenses: Decimal,
}

impl TrendContext {
    pub fn from_window(window: &[MonthlyRecord]) -> Self {
        if window.is_empty() {
            return Self {
                months: 0,
                average_net_flow: Decimal::ZERO,
                average_expenses: Decimal::ZERO,
            };
        }

        let n = Decimal::from(window.len() as u64);
        let net = window
            .iter()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.net_cash_flow()));
        let expenses = window
            .iter()
            .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.expenses));

        Self {
            months: window.len(),
            average_net_flow: net / n,
            average_expenses: expenses / n,
        }
    }
}

/// Deterministic, configuration-driven risk classifier
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    config: ThresholdConfig,
}

impl RiskClassifier {
    /// Validates threshold ordering before any data is seen
    pub fn new(config: ThresholdConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Trailing slice of history used for trend context
    pub fn window<'a>(&self, history: &'a [MonthlyRecord]) -> &'a [MonthlyRecord] {
        let start = history.len().saturating_sub(self.config.trend_window);
        &history[start..]
    }

    /// Relative floors saturate at the Decimal range, which keeps them ordered
    pub fn floors(&self, trend: &TrendContext) -> Floors {
        match self.config.basis {
            ThresholdBasis::Absolute => Floors {
                critical: self.config.critical,
                warning: self.config.warning,
            },
            ThresholdBasis::AverageExpenses => {
                let scale = trend.average_expenses.abs();
                Floors {
                    critical: self.config.critical.saturating_mul(scale),
                    warning: self.config.warning.saturating_mul(scale),
                }
            }
        }
    }

    /// Classify one point against the trailing window of `history`
    pub fn classify(&self, point: &ForecastPoint, history: &[MonthlyRecord]) -> ClassifiedMonth {
        let trend = TrendContext::from_window(self.window(history));
        self.classify_with(point, &trend, self.floors(&trend))
    }

    /// Classify every point; output order matches input order
    pub fn classify_all(
        &self,
        points: &[ForecastPoint],
        history: &[MonthlyRecord],
    ) -> Vec<ClassifiedMonth> {
        let trend = TrendContext::from_window(self.window(history));
        let floors = self.floors(&trend);

        points
            .iter()
            .map(|p| self.classify_with(p, &trend, floors))
            .collect()
    }

    fn classify_with(
        &self,
        point: &ForecastPoint,
        trend: &TrendContext,
        floors: Floors,
    ) -> ClassifiedMonth {
        let (label, value) = match (self.config.compare_on, point.lower_bound) {
            (CompareOn::LowerBound, Some(lower)) => ("lower bound", lower),
            _ => ("projected flow", point.projected_net_cash_flow),
        };

        let risk_level = classify_value(value, floors);

        let headline = match risk_level {
            RiskLevel::Critical => format!(
                "Large shortfall likely: {} {} is at or below the critical floor {}",
                label,
                format_amount(value),
                format_amount(floors.critical)
            ),
            RiskLevel::Warning => format!(
                "Cash position tight: {} {} is at or below the warning floor {}",
                label,
                format_amount(value),
                format_amount(floors.warning)
            ),
            RiskLevel::Safe => format!(
                "No deficit expected: projected {}",
                format_amount(point.projected_net_cash_flow)
            ),
        };

        ClassifiedMonth {
            forecast_point: point.clone(),
            risk_level,
            rationale: format!("{}; {}", headline, describe_trend(point, trend)),
        }
    }
}

/// "40.0% below the 6-month average 7,000.00"
fn describe_trend(point: &ForecastPoint, trend: &TrendContext) -> String {
    if trend.months == 0 {
        return "no historical average available".to_string();
    }

    let average = trend.average_net_flow;
    let projected = point.projected_net_cash_flow;

    if average.is_zero() {
        return format!(
            "the {}-month average net flow is {}",
            trend.months,
            format_amount(average)
        );
    }

    let direction = if projected < average { "below" } else { "above" };
    let pct = projected
        .checked_sub(average)
        .and_then(|diff| diff.checked_div(average.abs()))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));

    match pct {
        Some(pct) => format!(
            "{:.1}% {} the {}-month average {}",
            pct.abs(),
            direction,
            trend.months,
            format_amount(average)
        ),
        None => format!(
            "far {} the {}-month average {}",
            direction,
            trend.months,
            format_amount(average)
        ),
    }
}

/// Two decimal places with thousands separators: -12,345.60
pub fn format_amount(value: Decimal) -> String {
    let rounded = format!("{:.2}", value.round_dp(2).abs());
    let (whole, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value.round_dp(2).is_sign_negative() && !value.round_dp(2).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, frac)
}
