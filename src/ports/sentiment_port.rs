//! Sentiment signal port.

use chrono::NaiveDate;

/// Per-instrument, per-month sentiment z-scores.
///
/// How the score is produced or cached is the implementor's business.
/// `None` means "no signal" and is scored as neutral by the caller.
pub trait SentimentPort {
    fn lookup(&self, month_end: NaiveDate, ticker: &str) -> Option<f64>;
}
