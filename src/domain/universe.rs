//! Investable universe: which tickers are scored, and their sectors.
//!
//! The sector file defines the default universe. An optional comma-separated
//! ticker list narrows it. Tickers are then checked against the price panel
//! and dropped when they cannot be priced.

use crate::domain::error::StockpickerError;
use crate::domain::panel::PriceTable;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    /// Tickers in scoring order.
    pub tickers: Vec<String>,
    pub sectors: HashMap<String, String>,
}

impl Universe {
    /// Universe over every ticker with a sector, or over `subset` when given.
    pub fn new(sectors: HashMap<String, String>, subset: Option<Vec<String>>) -> Self {
        let tickers = match subset {
            Some(list) => list,
            None => {
                let mut all: Vec<String> = sectors.keys().cloned().collect();
                all.sort();
                all
            }
        };
        Universe { tickers, sectors }
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Parse a `A, b ,C` style list: trimmed, upper-cased, no blanks, no repeats.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub skipped: Vec<SkippedTicker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: TickerSkip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerSkip {
    NoSector,
    NotInPrices,
    NoObservations,
}

impl fmt::Display for TickerSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickerSkip::NoSector => write!(f, "no sector"),
            TickerSkip::NotInPrices => write!(f, "not in price file"),
            TickerSkip::NoObservations => write!(f, "no prices"),
        }
    }
}

/// Keep tickers that have a sector and at least one price.
///
/// Fails with `NoData` when nothing survives.
pub fn filter_to_prices(
    universe: Universe,
    prices: &PriceTable,
) -> Result<UniverseValidationResult, StockpickerError> {
    let Universe { tickers, sectors } = universe;
    let mut kept = Vec::new();
    let mut skipped = Vec::new();

    for ticker in tickers {
        let reason = if !sectors.contains_key(&ticker) {
            Some(TickerSkip::NoSector)
        } else if !prices.contains_ticker(&ticker) {
            Some(TickerSkip::NotInPrices)
        } else if prices.observation_count(&ticker) == 0 {
            Some(TickerSkip::NoObservations)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::warn!("skipping {ticker} ({reason})");
                skipped.push(SkippedTicker { ticker, reason });
            }
            None => kept.push(ticker),
        }
    }

    if kept.is_empty() {
        return Err(StockpickerError::NoData {
            what: "no universe ticker has both a sector and prices".to_string(),
        });
    }

    if !skipped.is_empty() {
        log::info!(
            "universe: {} of {} tickers usable",
            kept.len(),
            kept.len() + skipped.len()
        );
    }

    Ok(UniverseValidationResult {
        universe: Universe {
            tickers: kept,
            sectors,
        },
        skipped,
    })
}
