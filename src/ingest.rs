//! CSV ingestion
//!
//! Turns an uploaded table of monthly financials into chronologically
//! ordered `MonthlyRecord`s. Headers are matched case-insensitively;
//! only `Month` is mandatory, missing amount columns read as zero.

use crate::error::ForecastError;
use crate::models::{MonthlyRecord, YearMonth, MAX_AMOUNT};
use crate::Result;
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '₹', '¥'];

/// Column positions resolved from the header row
struct Columns {
    month: usize,
    revenue: Option<usize>,
    expenses: Option<usize>,
    receivables: Option<usize>,
    payables: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        let month = find("month").ok_or_else(|| ForecastError::Ingestion {
            line: 1,
            message: "missing required 'Month' column".to_string(),
        })?;

        Ok(Self {
            month,
            revenue: find("revenue"),
            expenses: find("expenses"),
            receivables: find("receivables"),
            payables: find("payables"),
        })
    }
}

/// Read and parse a CSV file from disk
pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Vec<MonthlyRecord>> {
    let file = File::open(path.as_ref())?;
    parse_csv(BufReader::new(file))
}

/// Parse CSV text into monthly records sorted by month
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<MonthlyRecord>> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::resolve(rdr.headers()?)?;

    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for row in rdr.records() {
        let row = row?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.iter().all(|field| field.is_empty()) {
            continue;
        }

        let month_cell = row.get(columns.month).unwrap_or("");
        let month: YearMonth = month_cell
            .parse()
            .map_err(|message| ForecastError::Ingestion { line, message })?;

        if !seen.insert(month) {
            return Err(ForecastError::Ingestion {
                line,
                message: format!("duplicate month {}", month),
            });
        }

        let amount = |column: Option<usize>, name: &str| -> Result<Decimal> {
            let cell = column.and_then(|i| row.get(i)).unwrap_or("");
            parse_amount(cell).map_err(|message| ForecastError::Ingestion {
                line,
                message: format!("{}: {}", name, message),
            })
        };

        records.push(MonthlyRecord {
            month,
            revenue: amount(columns.revenue, "revenue")?,
            expenses: amount(columns.expenses, "expenses")?,
            receivables: amount(columns.receivables, "receivables")?,
            payables: amount(columns.payables, "payables")?,
        });
    }

    records.sort_by_key(|r| r.month);

    debug!(rows = records.len(), "CSV ingested");

    Ok(records)
}

/// Parse a money cell: tolerates currency symbols, thousands separators,
/// and accounting-style parentheses for negatives. Blank reads as zero.
fn parse_amount(cell: &str) -> std::result::Result<Decimal, String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| format!("invalid amount '{}'", cell))?;

    if value.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(format!("amount '{}' exceeds the supported magnitude", trimmed));
    }

    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn test_parse_sorted_with_case_insensitive_headers() {
        let csv = "month , REVENUE,Expenses,receivables,Payables\n\
                   2024-03,12000,9000,1000,500\n\
                   2024-01,10000,8000,0,0\n\
                   2024-02,\"$11,000\",8500,,250\n";

        let records = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].month.to_string(), "2024-01");
        assert_eq!(records[1].revenue, d(11_000));
        assert_eq!(records[1].receivables, Decimal::ZERO);
        assert_eq!(records[2].net_cash_flow(), d(3_500));
    }

    #[test]
    fn test_missing_amount_columns_default_to_zero() {
        let csv = "Month,Revenue,Expenses\n2024-01-31,5000,4000\n";
        let records = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(records[0].payables, Decimal::ZERO);
        assert_eq!(records[0].net_cash_flow(), d(1_000));
    }

    #[test]
    fn test_missing_month_column() {
        let csv = "Revenue,Expenses\n5000,4000\n";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ForecastError::Ingestion { line: 1, .. }));
    }

    #[test]
    fn test_duplicate_and_bad_rows() {
        let dup = "Month,Revenue\n2024-01,1\n2024-01-15,2\n";
        assert!(matches!(
            parse_csv(dup.as_bytes()).unwrap_err(),
            ForecastError::Ingestion { line: 3, .. }
        ));

        let bad_amount = "Month,Revenue\n2024-01,abc\n";
        let err = parse_csv(bad_amount.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("revenue"));

        let bad_month = "Month,Revenue\nsoon,1\n";
        assert!(parse_csv(bad_month.as_bytes()).is_err());
    }

    #[test]
    fn test_amount_formats() {
        assert_eq!(parse_amount("(1,250.50)").unwrap(), Decimal::new(-125050, 2));
        assert_eq!(parse_amount("₹ 3,000").unwrap(), d(3_000));
        assert_eq!(parse_amount("").unwrap(), Decimal::ZERO);
        assert_eq!(parse_amount("1e3").unwrap(), d(1_000));
        assert!(parse_amount("twelve").is_err());
    }

    #[test]
    fn test_oversized_amount_rejected_with_line() {
        let csv = "Month,Revenue,Receivables\n2024-01,1,2\n2024-02,79228162514264337593543950335,79228162514264337593543950335\n";
        let err = parse_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ForecastError::Ingestion { line: 3, .. }), "{}", err);
        assert!(parse_amount("1,000,000,000,000,000").is_ok());
        assert!(parse_amount("(1,000,000,000,000,001)").is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_csv_file("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, ForecastError::IoError(_)));
        assert_eq!(err.stage(), crate::error::Stage::Ingestion);
    }
}
