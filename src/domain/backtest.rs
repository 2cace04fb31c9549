//! Monthly rebalancing engine.
//!
//! The loop walks consecutive rebalance dates `(asof, next)`. Each period is
//! one call to [`Engine::step`], a pure function of the carried
//! [`EngineState`]: it either accepts the period (new state plus an
//! [`EquityRecord`]) or skips it with a [`SkipReason`], leaving the state
//! untouched. Skips are how missing data is handled; they never abort a run.

use crate::domain::error::StockpickerError;
use crate::domain::features::{rebalance_dates, Features};
use crate::domain::panel::PriceTable;
use crate::domain::scoring::{score_universe, ScoringContext};
use crate::domain::turnover::{apply_cost, compute_turnover, cost_fraction};
use crate::domain::weights::{target_weights, WeightMap, WeightingMode};
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Instruments held each period.
    pub top_n: usize,
    /// First eligible rebalance date.
    pub start: NaiveDate,
    /// Proportional cost per unit of turnover.
    pub cost_rate: f64,
    pub weighting: WeightingMode,
    /// Per-name cap, `inv_vol` only.
    pub max_weight: f64,
    /// Sentiment blend coefficient; 0 disables sentiment lookups.
    pub lambda_sent: f64,
    pub initial_capital: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            top_n: 20,
            start: NaiveDate::from_ymd_opt(2017, 1, 31).unwrap_or_default(),
            cost_rate: 0.001,
            weighting: WeightingMode::Equal,
            max_weight: 0.10,
            lambda_sent: 0.0,
            initial_capital: 1.0,
        }
    }
}

/// State carried from one accepted period to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub value: f64,
    pub prev_weights: WeightMap,
}

impl EngineState {
    pub fn initial(capital: f64) -> Self {
        EngineState {
            value: capital,
            prev_weights: WeightMap::new(),
        }
    }
}

/// Holding period from one rebalance date to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub asof: NaiveDate,
    pub next: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityRecord {
    /// End of the holding period.
    pub date: NaiveDate,
    pub portfolio_return: f64,
    pub turnover: f64,
    pub cost_paid_frac: f64,
    pub equity: f64,
    /// Equity divided by the first record's equity; filled when the curve is built.
    pub equity_norm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    TooFewCandidates { picked: usize, required: usize },
    MissingPrice { ticker: String, date: NaiveDate },
    NoFiniteReturns,
    DegenerateWeights,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewCandidates { picked, required } => {
                write!(f, "only {picked} of {required} picks available")
            }
            SkipReason::MissingPrice { ticker, date } => {
                write!(f, "no price for {ticker} on {date}")
            }
            SkipReason::NoFiniteReturns => write!(f, "no pick has a finite return"),
            SkipReason::DegenerateWeights => write!(f, "surviving weights sum to zero"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Accepted {
        state: EngineState,
        record: EquityRecord,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPeriod {
    pub period: Period,
    pub reason: SkipReason,
}

/// Append-only equity records, one per accepted period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquityCurve {
    pub records: Vec<EquityRecord>,
}

impl EquityCurve {
    /// Build a curve and fill `equity_norm` relative to the first record.
    pub fn from_records(mut records: Vec<EquityRecord>) -> Self {
        if let Some(base) = records.first().map(|r| r.equity) {
            for r in records.iter_mut() {
                r.equity_norm = r.equity / base;
            }
        }
        EquityCurve { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn equity_norm(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.equity_norm).collect()
    }

    pub fn last(&self) -> Option<&EquityRecord> {
        self.records.last()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRun {
    pub curve: EquityCurve,
    pub skipped: Vec<SkippedPeriod>,
    pub final_state: EngineState,
}

/// Rebalancing engine over a fixed set of aligned panels.
#[derive(Debug)]
pub struct Engine<'a> {
    prices: &'a PriceTable,
    features: &'a Features,
    ctx: &'a ScoringContext,
    config: &'a BacktestConfig,
}

impl<'a> Engine<'a> {
    /// Fails fast if any feature panel is not indexed exactly like `prices`.
    pub fn new(
        prices: &'a PriceTable,
        features: &'a Features,
        ctx: &'a ScoringContext,
        config: &'a BacktestConfig,
    ) -> Result<Self, StockpickerError> {
        for (name, panel) in [
            ("mom_3m", &features.mom_3m),
            ("mom_6m", &features.mom_6m),
            ("vol_3m", &features.vol_3m),
        ] {
            if !panel.same_index(prices) {
                return Err(StockpickerError::StructuralMismatch {
                    reason: format!(
                        "{name} is {}x{}, prices are {}x{} (or labels differ)",
                        panel.dates().len(),
                        panel.tickers().len(),
                        prices.dates().len(),
                        prices.tickers().len()
                    ),
                });
            }
        }
        Ok(Engine {
            prices,
            features,
            ctx,
            config,
        })
    }

    /// Rebalance dates at or after the configured start.
    pub fn rebalance_dates(&self) -> Vec<NaiveDate> {
        rebalance_dates(self.prices.dates(), self.config.start)
    }

    /// Consecutive `(asof, next)` pairs over the rebalance dates.
    pub fn periods(&self) -> Vec<Period> {
        self.rebalance_dates()
            .windows(2)
            .map(|w| Period {
                asof: w[0],
                next: w[1],
            })
            .collect()
    }

    /// Simulate one holding period from `state`.
    pub fn step(&self, state: &EngineState, period: Period) -> StepOutcome {
        let cfg = self.config;
        let Period { asof, next } = period;

        let picks = score_universe(
            asof,
            &self.features.mom_3m,
            &self.features.mom_6m,
            &self.features.vol_3m,
            self.ctx,
            cfg.top_n,
            cfg.lambda_sent,
        );
        if picks.len() < cfg.top_n {
            return StepOutcome::Skipped(SkipReason::TooFewCandidates {
                picked: picks.len(),
                required: cfg.top_n,
            });
        }

        let mut endpoints = Vec::with_capacity(picks.len());
        for ticker in &picks {
            let start_px = self.prices.get(asof, ticker);
            let end_px = self.prices.get(next, ticker);
            match (start_px, end_px) {
                (Some(a), Some(b)) => endpoints.push((ticker, a, b)),
                (None, _) => return missing_price(ticker, asof),
                (_, None) => return missing_price(ticker, next),
            }
        }

        let target = target_weights(
            &picks,
            cfg.weighting,
            asof,
            &self.features.vol_3m,
            cfg.max_weight,
        );

        let turnover = compute_turnover(&state.prev_weights, &target);
        let cost_paid_frac = cost_fraction(cfg.cost_rate, turnover);
        let value_after_cost = apply_cost(state.value, cost_paid_frac);

        let returns: Vec<(&String, f64)> = endpoints
            .into_iter()
            .map(|(t, a, b)| (t, b / a - 1.0))
            .filter(|(_, r)| r.is_finite())
            .collect();
        if returns.is_empty() {
            return StepOutcome::Skipped(SkipReason::NoFiniteReturns);
        }

        let weight_sum: f64 = returns
            .iter()
            .map(|(t, _)| target.get(*t).copied().unwrap_or(0.0))
            .sum();
        if weight_sum <= 0.0 {
            return StepOutcome::Skipped(SkipReason::DegenerateWeights);
        }
        let portfolio_return: f64 = returns
            .iter()
            .map(|(t, r)| target.get(*t).copied().unwrap_or(0.0) / weight_sum * r)
            .sum();

        let value = value_after_cost * (1.0 + portfolio_return);

        StepOutcome::Accepted {
            record: EquityRecord {
                date: next,
                portfolio_return,
                turnover,
                cost_paid_frac,
                equity: value,
                equity_norm: f64::NAN,
            },
            state: EngineState {
                value,
                prev_weights: target,
            },
        }
    }

    /// Run every period in order, carrying state through accepted periods only.
    pub fn run(&self) -> BacktestRun {
        let mut state = EngineState::initial(self.config.initial_capital);
        let mut records = Vec::new();
        let mut skipped = Vec::new();

        for period in self.periods() {
            match self.step(&state, period) {
                StepOutcome::Accepted {
                    state: next_state,
                    record,
                } => {
                    log::debug!(
                        "{} -> {}: return {:.4}, turnover {:.3}, equity {:.6}",
                        period.asof,
                        period.next,
                        record.portfolio_return,
                        record.turnover,
                        record.equity
                    );
                    records.push(record);
                    state = next_state;
                }
                StepOutcome::Skipped(reason) => {
                    log::debug!("{} -> {}: skipped ({})", period.asof, period.next, reason);
                    skipped.push(SkippedPeriod { period, reason });
                }
            }
        }

        log::info!(
            "backtest finished: {} periods accepted, {} skipped",
            records.len(),
            skipped.len()
        );

        BacktestRun {
            curve: EquityCurve::from_records(records),
            skipped,
            final_state: state,
        }
    }
}

fn missing_price(ticker: &str, date: NaiveDate) -> StepOutcome {
    StepOutcome::Skipped(SkipReason::MissingPrice {
        ticker: ticker.to_string(),
        date,
    })
}

/// Validate inputs and run the full monthly backtest.
pub fn run_monthly_backtest(
    prices: &PriceTable,
    features: &Features,
    ctx: &ScoringContext,
    config: &BacktestConfig,
) -> Result<BacktestRun, StockpickerError> {
    Ok(Engine::new(prices, features, ctx, config)?.run())
}
