//! Monthly sentiment table loaded from CSV.
//!
//! Input columns: `month_end,ticker,sentiment_mean`; extra columns such as
//! `n_headlines` are ignored. Raw means
//! are z-scored within each month on load, so lookups return a
//! cross-sectional score rather than the raw model output.

use crate::domain::error::StockpickerError;
use crate::domain::features::{month_end, zscore};
use crate::ports::sentiment_port::SentimentPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SentimentRow {
    month_end: String,
    ticker: String,
    sentiment_mean: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentTable {
    scores: HashMap<(NaiveDate, String), f64>,
}

impl SentimentTable {
    pub fn from_file(path: &Path) -> Result<Self, StockpickerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StockpickerError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {}", path.display(), e),
            ))
        })?;
        Self::from_csv(&content)
    }

    pub fn from_csv(content: &str) -> Result<Self, StockpickerError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut by_month: BTreeMap<NaiveDate, Vec<(String, f64)>> = BTreeMap::new();
        for result in rdr.deserialize::<SentimentRow>() {
            let row = result
                .map_err(|e| StockpickerError::data(format!("sentiment CSV parse error: {e}")))?;
            let date = NaiveDate::parse_from_str(&row.month_end, "%Y-%m-%d").map_err(|e| {
                StockpickerError::data(format!("invalid month_end '{}': {e}", row.month_end))
            })?;
            let Some(mean) = row.sentiment_mean.filter(|v| v.is_finite()) else {
                continue;
            };
            by_month
                .entry(month_end(date))
                .or_default()
                .push((row.ticker.to_uppercase(), mean));
        }

        let mut scores = HashMap::new();
        for (month, rows) in by_month {
            let raw: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();
            for ((ticker, _), z) in rows.into_iter().zip(zscore(&raw)) {
                scores.insert((month, ticker), z);
            }
        }

        log::info!("loaded {} sentiment scores", scores.len());
        Ok(SentimentTable { scores })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl SentimentPort for SentimentTable {
    fn lookup(&self, month_end: NaiveDate, ticker: &str) -> Option<f64> {
        self.scores.get(&(month_end, ticker.to_string())).copied()
    }
}
