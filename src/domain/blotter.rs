//! Portfolio recommendation and trade blotter for a single rebalance date.

use crate::domain::panel::PriceTable;
use crate::domain::weights::WeightMap;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// One line of the recommended portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub ticker: String,
    pub weight: f64,
    pub price: f64,
    pub dollars: f64,
    pub shares: f64,
}

/// Ordered so that sorting gives BUY, HOLD, SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TradeAction {
    Buy,
    Hold,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Hold => write!(f, "HOLD"),
            TradeAction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeInstruction {
    pub date: NaiveDate,
    pub ticker: String,
    pub price: f64,
    pub prev_weight: f64,
    pub target_weight: f64,
    pub delta_notional: f64,
    pub delta_shares: f64,
    pub action: TradeAction,
}

fn share_count(notional: f64, price: f64, allow_fractional: bool) -> f64 {
    let shares = notional / price;
    if allow_fractional { shares } else { shares.trunc() }
}

fn usable_price(prices: &PriceTable, asof: NaiveDate, ticker: &str) -> Option<f64> {
    prices.get(asof, ticker).filter(|p| p.is_finite() && *p > 0.0)
}

/// Size each pick at `capital * weight` using prices on `asof`.
///
/// Picks without a positive price on `asof` are left out. Sorted by weight
/// descending, then ticker.
pub fn recommend_portfolio(
    picks: &[String],
    weights: &WeightMap,
    prices: &PriceTable,
    asof: NaiveDate,
    capital: f64,
    allow_fractional: bool,
) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = picks
        .iter()
        .filter_map(|ticker| {
            let Some(price) = usable_price(prices, asof, ticker) else {
                log::warn!("no usable price for {ticker} on {asof}; left out of the portfolio");
                return None;
            };
            let weight = weights.get(ticker).copied().unwrap_or(0.0);
            let dollars = weight * capital;
            Some(Holding {
                ticker: ticker.clone(),
                weight,
                price,
                dollars,
                shares: share_count(dollars, price, allow_fractional),
            })
        })
        .collect();

    holdings.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    holdings
}

/// Orders moving a book from `prev` to `target` weights at `portfolio_value`.
pub fn make_trade_blotter(
    asof: NaiveDate,
    portfolio_value: f64,
    prev: &WeightMap,
    target: &WeightMap,
    prices: &PriceTable,
    allow_fractional: bool,
) -> Vec<TradeInstruction> {
    let tickers: BTreeSet<&String> = prev.keys().chain(target.keys()).collect();

    let mut trades: Vec<TradeInstruction> = tickers
        .into_iter()
        .filter_map(|ticker| {
            let price = usable_price(prices, asof, ticker)?;
            let prev_weight = prev.get(ticker).copied().unwrap_or(0.0);
            let target_weight = target.get(ticker).copied().unwrap_or(0.0);
            let delta_notional = (target_weight - prev_weight) * portfolio_value;
            let delta_shares = share_count(delta_notional, price, allow_fractional);
            let action = if delta_shares > 0.0 {
                TradeAction::Buy
            } else if delta_shares < 0.0 {
                TradeAction::Sell
            } else {
                TradeAction::Hold
            };
            Some(TradeInstruction {
                date: asof,
                ticker: ticker.clone(),
                price,
                prev_weight,
                target_weight,
                delta_notional,
                delta_shares,
                action,
            })
        })
        .collect();

    trades.sort_by(|a, b| a.action.cmp(&b.action).then_with(|| a.ticker.cmp(&b.ticker)));
    trades
}
