//! History fingerprinting
//!
//! Every report carries a SHA-256 digest of the history it was computed
//! from, so a summary can be traced back to the exact uploaded data.

use crate::models::MonthlyRecord;
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Write;

/// Compute SHA256 hex digest of the ingested history.
/// Streams JSON straight into the hasher.
pub fn compute_history_fingerprint(history: &[MonthlyRecord]) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), history)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;
    use rust_decimal::Decimal;

    fn record(revenue: i64) -> MonthlyRecord {
        MonthlyRecord {
            month: YearMonth::new(2024, 1).unwrap(),
            revenue: Decimal::new(revenue, 0),
            expenses: Decimal::ZERO,
            receivables: Decimal::ZERO,
            payables: Decimal::ZERO,
        }
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = compute_history_fingerprint(&[record(100)]).unwrap();
        let b = compute_history_fingerprint(&[record(100)]).unwrap();
        let c = compute_history_fingerprint(&[record(101)]).unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
