//! Cross-sectional scoring of the universe on a rebalance date.
//!
//! Composite score per ticker:
//!
//! ```text
//! quant = 0.6 * z_sector(mom_3m) + 0.4 * z_sector(mom_6m) - 0.3 * z(vol_3m)
//! final = quant + lambda_sent * sentiment_z
//! ```
//!
//! Momentum is z-scored within each sector, volatility across the whole
//! eligible set. Ties on the final score are broken by ticker ascending.

use crate::domain::features::{month_end, zscore};
use crate::domain::panel::Panel;
use crate::ports::sentiment_port::SentimentPort;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub const MOM_3M_COEF: f64 = 0.6;
pub const MOM_6M_COEF: f64 = 0.4;
pub const VOL_COEF: f64 = 0.3;

/// Read-only inputs to scoring that are not price-derived.
pub struct ScoringContext {
    pub sectors: HashMap<String, String>,
    pub sentiment: Option<Box<dyn SentimentPort>>,
}

impl ScoringContext {
    pub fn new(sectors: HashMap<String, String>) -> Self {
        Self {
            sectors,
            sentiment: None,
        }
    }

    pub fn with_sentiment(mut self, sentiment: Box<dyn SentimentPort>) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    /// Sentiment z-score for the month containing `asof`; absent means neutral.
    pub fn sentiment_z(&self, ticker: &str, asof: NaiveDate) -> f64 {
        self.sentiment
            .as_ref()
            .and_then(|s| s.lookup(month_end(asof), ticker))
            .unwrap_or(0.0)
    }
}

impl std::fmt::Debug for ScoringContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringContext")
            .field("sectors", &self.sectors.len())
            .field("sentiment", &self.sentiment.is_some())
            .finish()
    }
}

/// One eligible ticker with every component of its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredTicker {
    pub ticker: String,
    pub sector: String,
    pub mom_3m_z: f64,
    pub mom_6m_z: f64,
    pub vol_z: f64,
    pub sentiment_z: f64,
    pub quant_score: f64,
    pub final_score: f64,
}

struct Candidate<'a> {
    ticker: &'a str,
    sector: &'a str,
    mom_3m: f64,
    mom_6m: f64,
    vol_3m: f64,
}

/// Rank the universe on `asof` and return the best `top_n` tickers.
///
/// Returns an empty list when fewer than `top_n` tickers are rankable; the
/// caller treats that as "no portfolio this period".
pub fn score_universe(
    asof: NaiveDate,
    mom_3m: &Panel,
    mom_6m: &Panel,
    vol_3m: &Panel,
    ctx: &ScoringContext,
    top_n: usize,
    lambda_sent: f64,
) -> Vec<String> {
    let scored = rank_universe(asof, mom_3m, mom_6m, vol_3m, ctx, top_n, lambda_sent);
    scored.into_iter().take(top_n).map(|s| s.ticker).collect()
}

/// Full ranking with score components, best first. Empty when fewer than
/// `top_n` tickers survive the eligibility filters.
pub fn rank_universe(
    asof: NaiveDate,
    mom_3m: &Panel,
    mom_6m: &Panel,
    vol_3m: &Panel,
    ctx: &ScoringContext,
    top_n: usize,
    lambda_sent: f64,
) -> Vec<ScoredTicker> {
    let rankable = mom_3m.present_on(asof);
    if rankable.len() < top_n {
        return Vec::new();
    }

    let candidates: Vec<Candidate> = rankable
        .into_iter()
        .filter_map(|(ticker, m3)| {
            Some(Candidate {
                ticker,
                sector: ctx.sectors.get(ticker)?.as_str(),
                mom_3m: m3,
                mom_6m: mom_6m.get(asof, ticker)?,
                vol_3m: vol_3m.get(asof, ticker)?,
            })
        })
        .collect();

    if candidates.is_empty() || candidates.len() < top_n {
        return Vec::new();
    }

    let mom_3m_z = sector_zscores(&candidates, |c| c.mom_3m);
    let mom_6m_z = sector_zscores(&candidates, |c| c.mom_6m);
    let vol_z = zscore(&candidates.iter().map(|c| c.vol_3m).collect::<Vec<_>>());

    let mut scored: Vec<ScoredTicker> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let quant = MOM_3M_COEF * mom_3m_z[i] + MOM_6M_COEF * mom_6m_z[i] - VOL_COEF * vol_z[i];
            let sentiment_z = if lambda_sent != 0.0 {
                ctx.sentiment_z(c.ticker, asof)
            } else {
                0.0
            };
            ScoredTicker {
                ticker: c.ticker.to_string(),
                sector: c.sector.to_string(),
                mom_3m_z: mom_3m_z[i],
                mom_6m_z: mom_6m_z[i],
                vol_z: vol_z[i],
                sentiment_z,
                quant_score: quant,
                final_score: quant + lambda_sent * sentiment_z,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
    scored
}

/// Z-score `value` within each sector group, returned in candidate order.
fn sector_zscores<F>(candidates: &[Candidate], value: F) -> Vec<f64>
where
    F: Fn(&Candidate) -> f64,
{
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, c) in candidates.iter().enumerate() {
        groups.entry(c.sector).or_default().push(i);
    }

    let mut out = vec![0.0; candidates.len()];
    for members in groups.values() {
        let values: Vec<f64> = members.iter().map(|&i| value(&candidates[i])).collect();
        for (&i, z) in members.iter().zip(zscore(&values)) {
            out[i] = z;
        }
    }
    out
}
