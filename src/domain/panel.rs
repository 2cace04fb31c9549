//! Date x ticker panels for prices and derived features.
//!
//! A [`Panel`] stores one row per trading date and one column per ticker.
//! Missing observations are `None`; they mark a ticker as ineligible on that
//! date and are never treated as zero.

use crate::domain::error::StockpickerError;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    dates: Vec<NaiveDate>,
    tickers: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
    date_index: HashMap<NaiveDate, usize>,
    ticker_index: HashMap<String, usize>,
}

/// Adjusted closing prices.
pub type PriceTable = Panel;

impl Panel {
    /// Build a panel, rejecting unordered dates, duplicate tickers and ragged rows.
    /// `NaN` cells are normalised to `None`.
    pub fn new(
        dates: Vec<NaiveDate>,
        tickers: Vec<String>,
        rows: Vec<Vec<Option<f64>>>,
    ) -> Result<Self, StockpickerError> {
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StockpickerError::data(format!(
                "dates must be strictly increasing ({} then {})",
                w[0], w[1]
            )));
        }

        let mut seen = HashSet::new();
        for t in &tickers {
            if !seen.insert(t.as_str()) {
                return Err(StockpickerError::data(format!("duplicate ticker: {t}")));
            }
        }

        if rows.len() != dates.len() {
            return Err(StockpickerError::data(format!(
                "{} rows for {} dates",
                rows.len(),
                dates.len()
            )));
        }

        let mut clean = Vec::with_capacity(rows.len());
        for (date, row) in dates.iter().zip(rows) {
            if row.len() != tickers.len() {
                return Err(StockpickerError::data(format!(
                    "row {} has {} values, expected {}",
                    date,
                    row.len(),
                    tickers.len()
                )));
            }
            clean.push(row.into_iter().map(|v| v.filter(|x| !x.is_nan())).collect());
        }

        Ok(Self::from_parts(dates, tickers, clean))
    }

    fn from_parts(dates: Vec<NaiveDate>, tickers: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Self {
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
        let ticker_index = tickers
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            dates,
            tickers,
            rows,
            date_index,
            ticker_index,
        }
    }

    /// Build a panel with the same index as `self`, filling each column by `f`.
    ///
    /// `f` receives one ticker's full time series and must return a series of
    /// the same length.
    pub fn map_columns<F>(&self, mut f: F) -> Panel
    where
        F: FnMut(&[Option<f64>]) -> Vec<Option<f64>>,
    {
        let mut rows = vec![vec![None; self.tickers.len()]; self.dates.len()];
        for j in 0..self.tickers.len() {
            let column = self.column_at(j);
            let mapped = f(&column);
            debug_assert_eq!(mapped.len(), self.dates.len());
            for (i, v) in mapped.into_iter().enumerate().take(self.dates.len()) {
                rows[i][j] = v.filter(|x| x.is_finite());
            }
        }
        Self::from_parts(self.dates.clone(), self.tickers.clone(), rows)
    }

    fn column_at(&self, j: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row[j]).collect()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.date_index.contains_key(&date)
    }

    pub fn contains_ticker(&self, ticker: &str) -> bool {
        self.ticker_index.contains_key(ticker)
    }

    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let i = *self.date_index.get(&date)?;
        let j = *self.ticker_index.get(ticker)?;
        self.rows[i][j]
    }

    /// All `(ticker, value)` pairs with a present value on `date`, in column order.
    pub fn present_on(&self, date: NaiveDate) -> Vec<(&str, f64)> {
        match self.date_index.get(&date) {
            Some(&i) => self
                .tickers
                .iter()
                .zip(&self.rows[i])
                .filter_map(|(t, v)| v.map(|x| (t.as_str(), x)))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn column(&self, ticker: &str) -> Option<Vec<Option<f64>>> {
        self.ticker_index.get(ticker).map(|&j| self.column_at(j))
    }

    /// Number of present observations for `ticker`.
    pub fn observation_count(&self, ticker: &str) -> usize {
        match self.ticker_index.get(ticker) {
            Some(&j) => self.rows.iter().filter(|row| row[j].is_some()).count(),
            None => 0,
        }
    }

    /// Keep only the listed tickers, in the given order. Unknown tickers are ignored.
    pub fn select(&self, tickers: &[String]) -> Panel {
        let keep: Vec<(String, usize)> = tickers
            .iter()
            .filter_map(|t| self.ticker_index.get(t).map(|&j| (t.clone(), j)))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|(_, j)| row[*j]).collect())
            .collect();
        let names = keep.into_iter().map(|(t, _)| t).collect();
        Self::from_parts(self.dates.clone(), names, rows)
    }

    /// True when both panels share the same dates and tickers in the same order.
    pub fn same_index(&self, other: &Panel) -> bool {
        self.dates == other.dates && self.tickers == other.tickers
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.tickers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> Panel {
        Panel::new(
            vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)],
            vec!["AAA".into(), "BBB".into()],
            vec![
                vec![Some(10.0), None],
                vec![Some(11.0), Some(20.0)],
                vec![Some(f64::NAN), Some(21.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn get_returns_present_values() {
        let p = sample();
        assert_eq!(p.get(d(2024, 1, 3), "BBB"), Some(20.0));
        assert_eq!(p.get(d(2024, 1, 2), "BBB"), None);
        assert_eq!(p.get(d(2024, 1, 9), "AAA"), None);
        assert_eq!(p.get(d(2024, 1, 2), "ZZZ"), None);
    }

    #[test]
    fn nan_becomes_missing() {
        let p = sample();
        assert_eq!(p.get(d(2024, 1, 4), "AAA"), None);
        assert_eq!(p.observation_count("AAA"), 2);
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = Panel::new(
            vec![d(2024, 1, 3), d(2024, 1, 2)],
            vec!["AAA".into()],
            vec![vec![Some(1.0)], vec![Some(2.0)]],
        )
        .unwrap_err();
        assert!(matches!(err, StockpickerError::Data { .. }));
    }

    #[test]
    fn rejects_repeated_dates() {
        let err = Panel::new(
            vec![d(2024, 1, 2), d(2024, 1, 2)],
            vec!["AAA".into()],
            vec![vec![Some(1.0)], vec![Some(2.0)]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_duplicate_tickers() {
        let err = Panel::new(
            vec![d(2024, 1, 2)],
            vec!["AAA".into(), "AAA".into()],
            vec![vec![Some(1.0), Some(2.0)]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Panel::new(
            vec![d(2024, 1, 2)],
            vec!["AAA".into(), "BBB".into()],
            vec![vec![Some(1.0)]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn present_on_skips_missing() {
        let p = sample();
        assert_eq!(p.present_on(d(2024, 1, 2)), vec![("AAA", 10.0)]);
        assert!(p.present_on(d(2025, 1, 1)).is_empty());
    }

    #[test]
    fn map_columns_keeps_index_and_drops_non_finite() {
        let p = sample();
        let doubled = p.map_columns(|col| {
            col.iter()
                .map(|v| v.map(|x| if x > 20.5 { f64::INFINITY } else { x * 2.0 }))
                .collect()
        });
        assert!(doubled.same_index(&p));
        assert_eq!(doubled.get(d(2024, 1, 2), "AAA"), Some(20.0));
        assert_eq!(doubled.get(d(2024, 1, 4), "BBB"), None);
    }

    #[test]
    fn select_reorders_and_drops() {
        let p = sample();
        let s = p.select(&["BBB".to_string(), "ZZZ".to_string()]);
        assert_eq!(s.tickers(), &["BBB".to_string()]);
        assert_eq!(s.get(d(2024, 1, 4), "BBB"), Some(21.0));
        assert!(!s.contains_ticker("AAA"));
    }
}
