//! Momentum and volatility features, plus the monthly rebalance calendar.
//!
//! MOM(n)[i] = C[i] / C[i-n] - 1
//! RET[i]    = C[i] / C[i-1] - 1
//! VOL(n)[i] = sample standard deviation of RET[i-n+1..=i]
//!
//! A value is missing when any input in its window is missing or the result
//! is not finite. Warmup: MOM(n) needs n prior bars, VOL(n) needs n returns.

use crate::domain::panel::{Panel, PriceTable};
use chrono::{Datelike, NaiveDate};

/// Trading days in roughly three months.
pub const MOM_3M_WINDOW: usize = 63;
/// Trading days in roughly six months.
pub const MOM_6M_WINDOW: usize = 126;
pub const VOL_3M_WINDOW: usize = 63;

const ZSCORE_EPSILON: f64 = 1e-12;

/// Feature panels aligned to the price panel they were computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    pub mom_3m: Panel,
    pub mom_6m: Panel,
    pub vol_3m: Panel,
}

pub fn compute_features(prices: &PriceTable) -> Features {
    Features {
        mom_3m: prices.map_columns(|c| pct_change(c, MOM_3M_WINDOW)),
        mom_6m: prices.map_columns(|c| pct_change(c, MOM_6M_WINDOW)),
        vol_3m: prices.map_columns(|c| rolling_std(&pct_change(c, 1), VOL_3M_WINDOW)),
    }
}

/// Simple return over `period` bars. No forward fill: a gap on either end is missing.
pub fn pct_change(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| {
            if i < period {
                return None;
            }
            match (series[i - period], series[i]) {
                (Some(prev), Some(curr)) => {
                    let r = curr / prev - 1.0;
                    r.is_finite().then_some(r)
                }
                _ => None,
            }
        })
        .collect()
}

/// Rolling sample (n - 1) standard deviation; every value in the window must be present.
pub fn rolling_std(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let warmup = period.saturating_sub(1);
    (0..series.len())
        .map(|i| {
            if period < 2 || i < warmup {
                return None;
            }
            let window: Option<Vec<f64>> = series[i + 1 - period..=i].iter().copied().collect();
            let window = window?;
            let mean = window.iter().sum::<f64>() / period as f64;
            let var = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
            Some(var.sqrt())
        })
        .collect()
}

/// (x - mean) / (population std + 1e-12). A single value scores 0.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    values
        .iter()
        .map(|x| (x - mean) / (std + ZSCORE_EPSILON))
        .collect()
}

/// Last calendar day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Last trading date of every calendar month, keeping those on or after `start`.
///
/// `calendar` must be sorted ascending, which [`Panel`] guarantees.
pub fn rebalance_dates(calendar: &[NaiveDate], start: NaiveDate) -> Vec<NaiveDate> {
    let mut out: Vec<NaiveDate> = Vec::new();
    for (i, &date) in calendar.iter().enumerate() {
        let last_of_month = calendar
            .get(i + 1)
            .is_none_or(|next| (next.year(), next.month()) != (date.year(), date.month()));
        if last_of_month && date >= start {
            out.push(date);
        }
    }
    out
}
