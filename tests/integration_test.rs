//! Integration tests for the rebalancing engine.
//!
//! Tests cover:
//! - Hand-built month-end panels with known outcomes
//! - Cost and turnover accounting across consecutive periods
//! - Full pipeline over synthetic daily prices with computed features
//! - Sentiment blending through the `SentimentPort` seam
//! - Universe filtering through a mock `PriceDataPort`

mod common;

use approx::assert_relative_eq;
use common::*;
use stockpicker::domain::backtest::{
    run_monthly_backtest, BacktestConfig, Engine, EngineState, Period, SkipReason, StepOutcome,
};
use stockpicker::domain::error::StockpickerError;
use stockpicker::domain::features::{compute_features, rebalance_dates, Features};
use stockpicker::domain::panel::Panel;
use stockpicker::domain::performance::PerformanceStats;
use stockpicker::domain::scoring::{score_universe, ScoringContext};
use stockpicker::domain::universe::{filter_to_prices, Universe};
use stockpicker::domain::weights::{WeightMap, WeightingMode};
use stockpicker::ports::data_port::PriceDataPort;

fn month_ends() -> Vec<chrono::NaiveDate> {
    vec![date(2021, 1, 29), date(2021, 2, 26), date(2021, 3, 31), date(2021, 4, 30)]
}

fn two_ticker_panel(x: [f64; 4], y: [f64; 4]) -> Panel {
    Panel::new(
        month_ends(),
        names(&["X", "Y"]),
        (0..4).map(|i| vec![Some(x[i]), Some(y[i])]).collect(),
    )
    .unwrap()
}

/// X ranks above Y on both momentum horizons; equal volatility.
fn x_favoured_features() -> Features {
    Features {
        mom_3m: two_ticker_panel([0.3; 4], [0.1; 4]),
        mom_6m: two_ticker_panel([0.5; 4], [0.2; 4]),
        vol_3m: two_ticker_panel([0.25; 4], [0.25; 4]),
    }
}

fn same_sector() -> ScoringContext {
    ScoringContext::new(sectors(&[("X", "Tech"), ("Y", "Tech")]))
}

fn month_end_config(top_n: usize, cost_rate: f64) -> BacktestConfig {
    BacktestConfig {
        top_n,
        start: date(2021, 1, 1),
        cost_rate,
        ..BacktestConfig::default()
    }
}

mod hand_built_panels {
    use super::*;

    #[test]
    fn single_pick_tracks_its_price() {
        let prices = two_ticker_panel([100.0, 100.0, 100.0, 110.0], [50.0; 4]);
        let features = x_favoured_features();
        let ctx = same_sector();
        let config = month_end_config(1, 0.0);

        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();

        assert_eq!(run.curve.len(), 3);
        assert!(run.skipped.is_empty());
        assert_eq!(run.curve.records[0].equity_norm, 1.0);
        let last = run.curve.last().unwrap();
        assert_eq!(last.date, date(2021, 4, 30));
        assert!((last.equity_norm - 1.10).abs() < 1e-9);
        assert_eq!(run.final_state.prev_weights.get("X"), Some(&1.0));
    }

    #[test]
    fn full_swap_charges_twice_the_rate_before_the_return() {
        let prices = two_ticker_panel([100.0, 100.0, 100.0, 100.0], [50.0, 50.0, 55.0, 55.0]);
        let features = x_favoured_features();
        let ctx = same_sector();
        let config = month_end_config(1, 0.01);
        let engine = Engine::new(&prices, &features, &ctx, &config).unwrap();

        let mut held = WeightMap::new();
        held.insert("Y".to_string(), 1.0);
        let state = EngineState {
            value: 1.0,
            prev_weights: held,
        };
        let period = Period {
            asof: date(2021, 2, 26),
            next: date(2021, 3, 31),
        };

        match engine.step(&state, period) {
            StepOutcome::Accepted { state, record } => {
                assert!((record.turnover - 2.0).abs() < 1e-12);
                assert!((record.cost_paid_frac - 0.02).abs() < 1e-12);
                assert_eq!(record.portfolio_return, 0.0);
                assert!((state.value - 0.98).abs() < 1e-12);
                assert_eq!(state.prev_weights.get("X"), Some(&1.0));
                assert_eq!(state.prev_weights.get("Y"), None);
            }
            other => panic!("expected an accepted period, got {other:?}"),
        }
    }

    #[test]
    fn first_period_pays_for_building_the_book() {
        let prices = two_ticker_panel([100.0; 4], [50.0; 4]);
        let features = x_favoured_features();
        let ctx = same_sector();
        let config = month_end_config(2, 0.005);

        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();
        let turnover: Vec<f64> = run.curve.records.iter().map(|r| r.turnover).collect();
        assert_eq!(turnover, vec![1.0, 0.0, 0.0]);
        assert!((run.curve.records[0].equity - 0.995).abs() < 1e-12);
        assert!((run.final_state.value - 0.995).abs() < 1e-12);
    }

    #[test]
    fn missing_momentum_skips_until_available() {
        let prices = two_ticker_panel([100.0; 4], [50.0; 4]);
        let mut features = x_favoured_features();
        features.mom_3m = Panel::new(
            month_ends(),
            names(&["X", "Y"]),
            vec![
                vec![None, None],
                vec![Some(0.3), None],
                vec![Some(0.3), Some(0.1)],
                vec![Some(0.3), Some(0.1)],
            ],
        )
        .unwrap();
        let ctx = same_sector();
        let config = month_end_config(2, 0.0);

        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();
        assert_eq!(run.skipped.len(), 2);
        assert_eq!(
            run.skipped[0].reason,
            SkipReason::TooFewCandidates {
                picked: 0,
                required: 2
            }
        );
        assert_eq!(run.curve.len(), 1);
        assert_eq!(run.curve.records[0].date, date(2021, 4, 30));
        assert_eq!(run.curve.records[0].turnover, 1.0);
    }

    #[test]
    fn misaligned_feature_panel_fails_fast() {
        let prices = two_ticker_panel([100.0; 4], [50.0; 4]);
        let mut features = x_favoured_features();
        features.mom_6m = Panel::new(
            month_ends()[..3].to_vec(),
            names(&["X", "Y"]),
            vec![vec![Some(0.1), Some(0.1)]; 3],
        )
        .unwrap();
        let ctx = same_sector();
        let config = month_end_config(1, 0.0);

        let err = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap_err();
        assert!(matches!(err, StockpickerError::StructuralMismatch { .. }));
    }
}

mod synthetic_pipeline {
    use super::*;

    fn setup() -> (Panel, Features, ScoringContext) {
        let prices = synthetic_prices(&synthetic_universe(), &synthetic_calendar());
        let features = compute_features(&prices);
        (prices, features, ScoringContext::new(tech_sectors()))
    }

    #[test]
    fn strongest_trend_is_held_every_month() {
        let (prices, features, ctx) = setup();
        let config = sample_config();
        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();

        let dates = rebalance_dates(prices.dates(), config.start);
        assert!(dates.len() > 4);
        assert!(run.skipped.is_empty());
        assert_eq!(run.curve.len(), dates.len() - 1);
        assert_eq!(run.curve.records[0].equity_norm, 1.0);

        for asof in &dates {
            let picks = score_universe(
                *asof,
                &features.mom_3m,
                &features.mom_6m,
                &features.vol_3m,
                &ctx,
                1,
                0.0,
            );
            assert_eq!(picks, vec!["AAA".to_string()]);
        }

        // holding AAA throughout with no costs compounds to its price ratio
        let first_next = prices.get(dates[1], "AAA").unwrap();
        let last = prices.get(*dates.last().unwrap(), "AAA").unwrap();
        let final_norm = run.curve.last().unwrap().equity_norm;
        assert_relative_eq!(final_norm, last / first_next, max_relative = 1e-9);
    }

    #[test]
    fn records_land_on_rebalance_dates() {
        let (prices, features, ctx) = setup();
        let config = BacktestConfig {
            top_n: 2,
            weighting: WeightingMode::InvVol,
            max_weight: 0.6,
            cost_rate: 0.001,
            ..sample_config()
        };
        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();
        let dates = rebalance_dates(prices.dates(), config.start);

        let record_dates: Vec<_> = run.curve.records.iter().map(|r| r.date).collect();
        assert_eq!(record_dates, dates[1..].to_vec());
        for r in &run.curve.records {
            assert!((0.0..=2.0).contains(&r.turnover));
            assert!((r.cost_paid_frac - 0.001 * r.turnover).abs() < 1e-15);
        }
        for w in run.final_state.prev_weights.values() {
            assert!(*w <= 0.6 + 1e-9);
        }
        let total: f64 = run.final_state.prev_weights.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn performance_over_the_curve() {
        let (prices, features, ctx) = setup();
        let run = run_monthly_backtest(&prices, &features, &ctx, &sample_config()).unwrap();
        let stats = PerformanceStats::from_equity(&run.curve.equity_norm());

        assert_eq!(stats.months, run.curve.len() - 1);
        assert!(stats.total_return.unwrap() > 0.0);
        assert!(stats.cagr.unwrap() > stats.total_return.unwrap());
        assert!(stats.max_drawdown.unwrap() >= 0.0);
    }

    #[test]
    fn start_after_calendar_gives_empty_curve() {
        let (prices, features, ctx) = setup();
        let config = BacktestConfig {
            start: date(2030, 1, 1),
            ..sample_config()
        };
        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();
        assert!(run.curve.is_empty());
        assert_eq!(
            PerformanceStats::from_equity(&run.curve.equity_norm()).months,
            0
        );
    }
}

mod sentiment_blending {
    use super::*;

    #[test]
    fn strong_sentiment_changes_the_pick() {
        let prices = synthetic_prices(&synthetic_universe(), &synthetic_calendar());
        let features = compute_features(&prices);
        let (sentiment, calls) = CountingSentiment::constant(&[("AAA", -1.0), ("BBB", 1.0)]);
        let ctx = ScoringContext::new(tech_sectors()).with_sentiment(Box::new(sentiment));
        let config = BacktestConfig {
            lambda_sent: 10.0,
            ..sample_config()
        };

        let run = run_monthly_backtest(&prices, &features, &ctx, &config).unwrap();
        assert!(calls.get() > 0);
        assert_eq!(run.final_state.prev_weights.get("BBB"), Some(&1.0));
    }

    #[test]
    fn zero_lambda_never_consults_sentiment() {
        let prices = synthetic_prices(&synthetic_universe(), &synthetic_calendar());
        let features = compute_features(&prices);
        let (sentiment, calls) = CountingSentiment::constant(&[("BBB", 5.0)]);
        let ctx = ScoringContext::new(tech_sectors()).with_sentiment(Box::new(sentiment));

        let run = run_monthly_backtest(&prices, &features, &ctx, &sample_config()).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(run.final_state.prev_weights.get("AAA"), Some(&1.0));
    }
}

mod universe_through_port {
    use super::*;

    #[test]
    fn tickers_without_prices_or_sector_are_dropped() {
        let prices = synthetic_prices(&synthetic_universe(), &synthetic_calendar());
        let mut sec = tech_sectors();
        sec.remove("DDD");
        sec.insert("ZZZ".to_string(), "Energy".to_string());
        let port = MockPriceDataPort::new(prices, sec);

        let loaded = port.load_prices().unwrap();
        let subset = Some(names(&["AAA", "BBB", "DDD", "ZZZ"]));
        let result = filter_to_prices(Universe::new(port.load_sectors().unwrap(), subset), &loaded).unwrap();

        assert_eq!(result.universe.tickers, names(&["AAA", "BBB"]));
        let skipped: Vec<&str> = result.skipped.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(skipped, vec!["DDD", "ZZZ"]);
    }

    #[test]
    fn port_errors_propagate() {
        let prices = synthetic_prices(&synthetic_universe(), &synthetic_calendar());
        let port = MockPriceDataPort::new(prices, tech_sectors()).with_error("disk on fire");
        assert!(matches!(port.load_prices(), Err(StockpickerError::Data { .. })));
    }
}
