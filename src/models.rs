//! Core data models for the cash-flow forecaster

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//
// ================= Calendar Period =================
//

/// A calendar month, rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The month immediately after this one
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The month `n` steps after this one
    pub fn plus(&self, n: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty month".to_string());
        }

        let parse_date = |candidate: &str| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
        };

        // Full dates, with any time-of-day suffix dropped
        let date_part = s.split(['T', ' ']).next().unwrap_or(s);
        if let Some(date) = parse_date(date_part) {
            return Ok(date.into());
        }

        // Month-only forms: 2024-03, 2024/03
        if let Some(date) = parse_date(&format!("{}-01", s)).or_else(|| parse_date(&format!("{}/01", s))) {
            return Ok(date.into());
        }

        // Named months: "Mar 2024", "March 2024"
        let with_day = format!("1 {}", s);
        for fmt in ["%d %b %Y", "%d %B %Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(&with_day, fmt) {
                return Ok(date.into());
            }
        }

        Err(format!("unrecognized month '{}'", s))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

//
// ================= Historical Input =================
//

/// One month of ingested financials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    pub month: YearMonth,
    #[serde(default)]
    pub revenue: Decimal,
    #[serde(default)]
    pub expenses: Decimal,
    #[serde(default)]
    pub receivables: Decimal,
    #[serde(default)]
    pub payables: Decimal,
}

/// Largest magnitude accepted for a single monthly amount
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

impl MonthlyRecord {
    /// Revenue plus receivables, minus expenses and payables.
    /// Saturates at the Decimal range instead of overflowing.
    pub fn net_cash_flow(&self) -> Decimal {
        let inflow = self.revenue.saturating_add(self.receivables);
        let outflow = self.expenses.saturating_add(self.payables);
        inflow.saturating_sub(outflow)
    }

    /// First amount whose magnitude exceeds `MAX_AMOUNT`, with its column name
    pub fn oversized_amount(&self) -> Option<(&'static str, Decimal)> {
        let limit = Decimal::from(MAX_AMOUNT);
        [
            ("revenue", self.revenue),
            ("expenses", self.expenses),
            ("receivables", self.receivables),
            ("payables", self.payables),
        ]
        .into_iter()
        .find(|(_, value)| value.abs() > limit)
    }
}

//
// ================= Forecast =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month: YearMonth,
    pub projected_net_cash_flow: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
}

impl ForecastPoint {
    pub fn new(month: YearMonth, projected_net_cash_flow: Decimal) -> Self {
        Self {
            month,
            projected_net_cash_flow,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn with_bounds(mut self, lower: Decimal, upper: Decimal) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }
}

//
// ================= Risk =================
//

/// Risk tier, ordered from safest to most severe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Warning,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Safe => "Safe",
            RiskLevel::Warning => "Warning",
            RiskLevel::Critical => "Critical",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMonth {
    pub forecast_point: ForecastPoint,
    pub risk_level: RiskLevel,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskCounts {
    pub safe: usize,
    pub warning: usize,
    pub critical: usize,
}

impl RiskCounts {
    pub fn tally(months: &[ClassifiedMonth]) -> Self {
        months.iter().fold(Self::default(), |mut counts, m| {
            match m.risk_level {
                RiskLevel::Safe => counts.safe += 1,
                RiskLevel::Warning => counts.warning += 1,
                RiskLevel::Critical => counts.critical += 1,
            }
            counts
        })
    }
}

//
// ================= Final Report =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub report_id: Uuid,
    pub horizon: usize,
    pub history_months: usize,
    pub history_fingerprint: String,
    pub forecast_engine: String,
    pub narrator: String,
    pub classified_months: Vec<ClassifiedMonth>,
    pub risk_counts: RiskCounts,
    pub narrative: String,
    pub generated_at: DateTime<Utc>,
}
