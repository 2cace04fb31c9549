//! Configuration validation.
//!
//! Every key is checked before any data is loaded. Present but malformed
//! values are errors, never silently replaced by the default.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::StockpickerError;
use crate::domain::universe::parse_tickers;
use crate::domain::weights::WeightingMode;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_RESULTS_PATH: &str = "backtest_results.csv";
pub const DEFAULT_PORTFOLIO_PATH: &str = "portfolio_recommendation.csv";
pub const DEFAULT_BLOTTER_PATH: &str = "trade_blotter.csv";
pub const DEFAULT_TRADE_CAPITAL: f64 = 10_000.0;

/// Input file locations from `[data]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPaths {
    pub prices: PathBuf,
    pub sectors: PathBuf,
    /// Only required when sentiment is blended in.
    pub sentiment: Option<PathBuf>,
}

/// Output file locations from `[output]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub portfolio: PathBuf,
    pub blotter: PathBuf,
}

/// Share sizing from `[trades]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradesConfig {
    pub capital: f64,
    pub allow_fractional: bool,
}

/// Validate the whole file: data, universe, backtest, output and trades.
pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), StockpickerError> {
    let backtest = backtest_config(config)?;
    let data = data_paths(config)?;
    if backtest.lambda_sent != 0.0 && data.sentiment.is_none() {
        return Err(StockpickerError::missing("data", "sentiment"));
    }
    universe_subset(config)?;
    output_paths(config);
    trades_config(config)?;
    Ok(())
}

pub fn backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, StockpickerError> {
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        top_n: validate_top_n(config, defaults.top_n)?,
        start: validate_start(config, defaults.start)?,
        cost_rate: validate_cost_rate(config, defaults.cost_rate)?,
        weighting: validate_weighting(config, defaults.weighting)?,
        max_weight: validate_max_weight(config, defaults.max_weight)?,
        lambda_sent: validate_lambda_sent(config, defaults.lambda_sent)?,
        initial_capital: validate_initial_capital(config, defaults.initial_capital)?,
    })
}

pub fn data_paths(config: &dyn ConfigPort) -> Result<DataPaths, StockpickerError> {
    Ok(DataPaths {
        prices: required_path(config, "data", "prices")?,
        sectors: required_path(config, "data", "sectors")?,
        sentiment: non_empty(config, "data", "sentiment").map(PathBuf::from),
    })
}

pub fn output_paths(config: &dyn ConfigPort) -> OutputPaths {
    let path = |key: &str, default: &str| {
        PathBuf::from(non_empty(config, "output", key).unwrap_or_else(|| default.to_string()))
    };
    OutputPaths {
        results: path("results", DEFAULT_RESULTS_PATH),
        portfolio: path("portfolio", DEFAULT_PORTFOLIO_PATH),
        blotter: path("blotter", DEFAULT_BLOTTER_PATH),
    }
}

/// Optional `[universe] tickers` narrowing list.
pub fn universe_subset(config: &dyn ConfigPort) -> Result<Option<Vec<String>>, StockpickerError> {
    match non_empty(config, "universe", "tickers") {
        None => Ok(None),
        Some(list) => parse_tickers(&list)
            .map(Some)
            .map_err(|e| StockpickerError::invalid("universe", "tickers", e.to_string())),
    }
}

pub fn trades_config(config: &dyn ConfigPort) -> Result<TradesConfig, StockpickerError> {
    let capital = parse_key::<f64>(config, "trades", "capital")?.unwrap_or(DEFAULT_TRADE_CAPITAL);
    if !(capital.is_finite() && capital > 0.0) {
        return Err(StockpickerError::invalid(
            "trades",
            "capital",
            "capital must be positive",
        ));
    }
    let allow_fractional = match non_empty(config, "trades", "allow_fractional") {
        None => false,
        Some(raw) => parse_bool(&raw).ok_or_else(|| {
            StockpickerError::invalid(
                "trades",
                "allow_fractional",
                format!("expected true or false, got '{raw}'"),
            )
        })?,
    };
    Ok(TradesConfig {
        capital,
        allow_fractional,
    })
}

fn validate_top_n(config: &dyn ConfigPort, default: usize) -> Result<usize, StockpickerError> {
    let value = parse_key::<i64>(config, "backtest", "top_n")?.unwrap_or(default as i64);
    if value < 1 {
        return Err(StockpickerError::invalid(
            "backtest",
            "top_n",
            "top_n must be at least 1",
        ));
    }
    Ok(value as usize)
}

fn validate_start(config: &dyn ConfigPort, default: NaiveDate) -> Result<NaiveDate, StockpickerError> {
    match non_empty(config, "backtest", "start") {
        None => Ok(default),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| {
            StockpickerError::invalid("backtest", "start", "invalid start format, expected YYYY-MM-DD")
        }),
    }
}

fn validate_cost_rate(config: &dyn ConfigPort, default: f64) -> Result<f64, StockpickerError> {
    let value = parse_key::<f64>(config, "backtest", "cost_rate")?.unwrap_or(default);
    if !(0.0..1.0).contains(&value) {
        return Err(StockpickerError::invalid(
            "backtest",
            "cost_rate",
            "cost_rate must be in [0, 1)",
        ));
    }
    Ok(value)
}

fn validate_weighting(
    config: &dyn ConfigPort,
    default: WeightingMode,
) -> Result<WeightingMode, StockpickerError> {
    match non_empty(config, "backtest", "weighting") {
        None => Ok(default),
        Some(s) => s.parse(),
    }
}

fn validate_max_weight(config: &dyn ConfigPort, default: f64) -> Result<f64, StockpickerError> {
    let value = parse_key::<f64>(config, "backtest", "max_weight")?.unwrap_or(default);
    if !(value > 0.0 && value <= 1.0) {
        return Err(StockpickerError::invalid(
            "backtest",
            "max_weight",
            "max_weight must be in (0, 1]",
        ));
    }
    Ok(value)
}

fn validate_lambda_sent(config: &dyn ConfigPort, default: f64) -> Result<f64, StockpickerError> {
    let value = parse_key::<f64>(config, "backtest", "lambda_sent")?.unwrap_or(default);
    if !value.is_finite() {
        return Err(StockpickerError::invalid(
            "backtest",
            "lambda_sent",
            "lambda_sent must be finite",
        ));
    }
    Ok(value)
}

fn validate_initial_capital(config: &dyn ConfigPort, default: f64) -> Result<f64, StockpickerError> {
    let value = parse_key::<f64>(config, "backtest", "initial_capital")?.unwrap_or(default);
    if !(value.is_finite() && value > 0.0) {
        return Err(StockpickerError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(value)
}

fn required_path(config: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, StockpickerError> {
    non_empty(config, section, key)
        .map(PathBuf::from)
        .ok_or_else(|| StockpickerError::missing(section, key))
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `Ok(None)` when absent, an error when present but not a `T`.
fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, StockpickerError> {
    match non_empty(config, section, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            StockpickerError::invalid(section, key, format!("cannot parse '{raw}'"))
        }),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
