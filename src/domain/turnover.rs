//! Turnover and proportional transaction cost.
//!
//! turnover(prev, next) = sum |next[k] - prev[k]| over the union of keys,
//! absent keys read as 0. Ranges 0 (unchanged) to 2 (complete swap).
//! Cost is charged on portfolio value at rebalance time, before the period's
//! return is applied.

use crate::domain::weights::WeightMap;
use std::collections::BTreeSet;

pub fn compute_turnover(prev: &WeightMap, next: &WeightMap) -> f64 {
    let names: BTreeSet<&String> = prev.keys().chain(next.keys()).collect();
    names
        .into_iter()
        .map(|t| {
            let before = prev.get(t).copied().unwrap_or(0.0);
            let after = next.get(t).copied().unwrap_or(0.0);
            (after - before).abs()
        })
        .sum()
}

/// Fraction of portfolio value paid away for `turnover` at `cost_rate`.
pub fn cost_fraction(cost_rate: f64, turnover: f64) -> f64 {
    cost_rate * turnover
}

/// value * (1 - cost_fraction)
pub fn apply_cost(value: f64, cost_fraction: f64) -> f64 {
    value * (1.0 - cost_fraction)
}
