//! Target weight construction from a ranked pick list.
//!
//! Two policies:
//! - `equal`: 1/N per pick.
//! - `inv_vol`: weight proportional to 1 / (vol_3m + eps), capped per name.
//!
//! Every returned mapping is keyed by exactly the input tickers.

use crate::domain::error::StockpickerError;
use crate::domain::panel::Panel;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ticker to fraction of portfolio value.
pub type WeightMap = BTreeMap<String, f64>;

const INV_VOL_EPSILON: f64 = 1e-12;
const CAP_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightingMode {
    Equal,
    InvVol,
}

impl FromStr for WeightingMode {
    type Err = StockpickerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equal" => Ok(WeightingMode::Equal),
            "inv_vol" => Ok(WeightingMode::InvVol),
            other => Err(StockpickerError::invalid(
                "backtest",
                "weighting",
                format!("weighting must be 'equal' or 'inv_vol', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for WeightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightingMode::Equal => write!(f, "equal"),
            WeightingMode::InvVol => write!(f, "inv_vol"),
        }
    }
}

/// Dispatch on `mode`. `max_weight` only applies to `inv_vol`.
pub fn target_weights(
    tickers: &[String],
    mode: WeightingMode,
    asof: NaiveDate,
    vol_3m: &Panel,
    max_weight: f64,
) -> WeightMap {
    match mode {
        WeightingMode::Equal => equal_weights(tickers),
        WeightingMode::InvVol => inv_vol_weights(tickers, asof, vol_3m, max_weight),
    }
}

pub fn equal_weights(tickers: &[String]) -> WeightMap {
    if tickers.is_empty() {
        return WeightMap::new();
    }
    let w = 1.0 / tickers.len() as f64;
    tickers.iter().map(|t| (t.clone(), w)).collect()
}

/// Inverse-volatility weights with a per-name cap.
///
/// Tickers without a positive, finite volatility on `asof` get 0.0. When none
/// qualify the whole input list is equally weighted instead.
pub fn inv_vol_weights(
    tickers: &[String],
    asof: NaiveDate,
    vol_3m: &Panel,
    max_weight: f64,
) -> WeightMap {
    if tickers.is_empty() {
        return WeightMap::new();
    }

    let usable: Vec<(&String, f64)> = tickers
        .iter()
        .filter_map(|t| {
            vol_3m
                .get(asof, t)
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| (t, 1.0 / (v + INV_VOL_EPSILON)))
        })
        .collect();

    if usable.is_empty() {
        return equal_weights(tickers);
    }

    let raw: Vec<f64> = usable.iter().map(|(_, inv)| *inv).collect();
    let capped = cap_weights(&raw, max_weight);

    let mut weights: WeightMap = tickers.iter().map(|t| (t.clone(), 0.0)).collect();
    for ((t, _), w) in usable.iter().zip(capped) {
        weights.insert((*t).clone(), w);
    }
    weights
}

/// Normalise `raw` to sum to 1.0 with no entry above `cap`.
///
/// Mass removed from capped names is redistributed over the rest in proportion
/// to `raw`. An infeasible cap (`n * cap < 1`) yields equal weights.
pub fn cap_weights(raw: &[f64], cap: f64) -> Vec<f64> {
    let n = raw.len();
    if n == 0 {
        return Vec::new();
    }
    if (n as f64) * cap < 1.0 - CAP_TOLERANCE {
        log::warn!(
            "max_weight {cap} cannot hold across {n} names; falling back to equal weights"
        );
        return vec![1.0 / n as f64; n];
    }

    let mut capped = vec![false; n];
    let mut weights = vec![0.0; n];
    loop {
        let fixed = capped.iter().filter(|&&c| c).count() as f64;
        let remaining = (1.0 - fixed * cap).max(0.0);
        let free_raw: f64 = raw
            .iter()
            .zip(&capped)
            .filter(|(_, c)| !**c)
            .map(|(r, _)| *r)
            .sum();

        let mut newly_capped = false;
        for i in 0..n {
            if capped[i] {
                weights[i] = cap;
                continue;
            }
            weights[i] = if free_raw > 0.0 {
                remaining * raw[i] / free_raw
            } else {
                0.0
            };
            if weights[i] > cap + CAP_TOLERANCE {
                capped[i] = true;
                newly_capped = true;
            }
        }
        if !newly_capped {
            break;
        }
    }

    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
    weights
}
