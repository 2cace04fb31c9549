//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sentiment_csv_adapter::SentimentTable;
use crate::domain::backtest::{run_monthly_backtest, BacktestConfig, BacktestRun};
use crate::domain::blotter::{make_trade_blotter, recommend_portfolio, Holding, TradeInstruction};
use crate::domain::config_validation::{
    backtest_config, data_paths, output_paths, trades_config, universe_subset,
    validate_backtest_config, DataPaths, TradesConfig,
};
use crate::domain::error::StockpickerError;
use crate::domain::features::{compute_features, rebalance_dates, Features};
use crate::domain::panel::PriceTable;
use crate::domain::performance::PerformanceStats;
use crate::domain::scoring::{score_universe, ScoringContext};
use crate::domain::universe::{filter_to_prices, Universe};
use crate::domain::weights::{target_weights, WeightMap, WeightingMode};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::sentiment_port::SentimentPort;

#[derive(Parser, Debug)]
#[command(name = "stockpicker", about = "Monthly momentum portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the monthly backtest and write the equity curve
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        top_n: Option<usize>,
        #[arg(long)]
        weighting: Option<WeightingMode>,
        #[arg(long, allow_hyphen_values = true)]
        lambda_sent: Option<f64>,
    },
    /// Recommend a portfolio and trade blotter for the latest rebalance date
    Picks {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        capital: Option<f64>,
        #[arg(long)]
        allow_fractional: bool,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestOverrides {
    pub top_n: Option<usize>,
    pub weighting: Option<WeightingMode>,
    pub lambda_sent: Option<f64>,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            top_n,
            weighting,
            lambda_sent,
        } => {
            let overrides = BacktestOverrides {
                top_n,
                weighting,
                lambda_sent,
            };
            run_backtest(&config, output.as_deref(), &overrides)
        }
        Command::Picks {
            config,
            capital,
            allow_fractional,
        } => run_picks(&config, capital, allow_fractional),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: StockpickerError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Config-file backtest settings with command-line overrides applied.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
    overrides: &BacktestOverrides,
) -> Result<BacktestConfig, StockpickerError> {
    let mut bt = backtest_config(config)?;
    if let Some(n) = overrides.top_n {
        if n < 1 {
            return Err(StockpickerError::invalid("backtest", "top_n", "top_n must be at least 1"));
        }
        bt.top_n = n;
    }
    if let Some(mode) = overrides.weighting {
        bt.weighting = mode;
    }
    if let Some(lambda) = overrides.lambda_sent {
        if !lambda.is_finite() {
            return Err(StockpickerError::invalid(
                "backtest",
                "lambda_sent",
                "lambda_sent must be finite",
            ));
        }
        bt.lambda_sent = lambda;
    }
    Ok(bt)
}

/// Load the sentiment table when it will be consulted.
pub fn load_sentiment(
    paths: &DataPaths,
    lambda_sent: f64,
) -> Result<Option<Box<dyn SentimentPort>>, StockpickerError> {
    if lambda_sent == 0.0 {
        return Ok(None);
    }
    let path = paths
        .sentiment
        .as_ref()
        .ok_or_else(|| StockpickerError::missing("data", "sentiment"))?;
    eprintln!("Loading sentiment from {}", path.display());
    let table: Box<dyn SentimentPort> = Box::new(SentimentTable::from_file(path)?);
    Ok(Some(table))
}

/// Prices, features and scoring inputs restricted to the usable universe.
#[derive(Debug)]
pub struct PreparedData {
    pub prices: PriceTable,
    pub features: Features,
    pub ctx: ScoringContext,
}

pub fn prepare_data(
    data_port: &dyn PriceDataPort,
    subset: Option<Vec<String>>,
    sentiment: Option<Box<dyn SentimentPort>>,
) -> Result<PreparedData, StockpickerError> {
    let sectors = data_port.load_sectors()?;
    let prices = data_port.load_prices()?;
    if prices.is_empty() {
        return Err(StockpickerError::NoData {
            what: "price file has no rows".to_string(),
        });
    }

    let validation = filter_to_prices(Universe::new(sectors, subset), &prices)?;
    let universe = validation.universe;
    let prices = prices.select(&universe.tickers);

    log::info!(
        "computing features: {} tickers, {} dates ({} to {})",
        prices.tickers().len(),
        prices.dates().len(),
        prices.dates().first().map(|d| d.to_string()).unwrap_or_default(),
        prices.dates().last().map(|d| d.to_string()).unwrap_or_default(),
    );
    let features = compute_features(&prices);

    let mut ctx = ScoringContext::new(universe.sectors);
    if let Some(s) = sentiment {
        ctx = ctx.with_sentiment(s);
    }

    Ok(PreparedData {
        prices,
        features,
        ctx,
    })
}

/// Run the backtest and write the equity curve unless it is empty.
pub fn run_backtest_pipeline(
    data: &PreparedData,
    bt_config: &BacktestConfig,
    report: &dyn ReportPort,
    output: &Path,
) -> Result<BacktestRun, StockpickerError> {
    eprintln!(
        "Running backtest: top {} by score, {} weighting, cost {:.4}, from {}",
        bt_config.top_n, bt_config.weighting, bt_config.cost_rate, bt_config.start
    );
    let run = run_monthly_backtest(&data.prices, &data.features, &data.ctx, bt_config)?;

    if run.curve.is_empty() {
        eprintln!(
            "\nNo rebalance period had enough data ({} skipped); nothing written.",
            run.skipped.len()
        );
        return Ok(run);
    }

    let stats = PerformanceStats::from_equity(&run.curve.equity_norm());
    print_summary(&run, &stats);

    report.write_equity_curve(&run.curve, output)?;
    eprintln!("\nResults written to: {}", output.display());
    Ok(run)
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}%", v * 100.0))
}

fn fmt_ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn print_summary(run: &BacktestRun, stats: &PerformanceStats) {
    eprintln!("\n=== Backtest Results ===");
    if let (Some(first), Some(last)) = (run.curve.records.first(), run.curve.last()) {
        eprintln!("Period:           {} to {}", first.date, last.date);
        eprintln!("Final Equity:     {:.4}", last.equity);
    }
    eprintln!(
        "Months:           {} ({} skipped)",
        stats.months,
        run.skipped.len()
    );
    eprintln!("Total Return:     {}", fmt_pct(stats.total_return));
    eprintln!("CAGR:             {}", fmt_pct(stats.cagr));
    eprintln!("Ann. Volatility:  {}", fmt_pct(stats.ann_vol));
    eprintln!("Sharpe Ratio:     {}", fmt_ratio(stats.sharpe));
    eprintln!(
        "Max Drawdown:     {}",
        stats
            .max_drawdown
            .map_or_else(|| "n/a".to_string(), |dd| format!("-{:.1}%", dd * 100.0))
    );

    let turnover: Vec<f64> = run.curve.records.iter().map(|r| r.turnover).collect();
    if !turnover.is_empty() {
        eprintln!(
            "Avg Turnover:     {:.3}",
            turnover.iter().sum::<f64>() / turnover.len() as f64
        );
    }
}

/// Portfolio and orders for a single rebalance date.
#[derive(Debug, Clone, PartialEq)]
pub struct PickList {
    pub asof: NaiveDate,
    pub weights: WeightMap,
    pub holdings: Vec<Holding>,
    pub trades: Vec<TradeInstruction>,
}

/// Score the latest rebalance date and size the book against an empty one.
pub fn generate_picks(
    data: &PreparedData,
    bt_config: &BacktestConfig,
    trades: &TradesConfig,
) -> Result<PickList, StockpickerError> {
    let asof = rebalance_dates(data.prices.dates(), bt_config.start)
        .last()
        .copied()
        .ok_or_else(|| StockpickerError::NoData {
            what: format!("no rebalance date on or after {}", bt_config.start),
        })?;

    let picks = score_universe(
        asof,
        &data.features.mom_3m,
        &data.features.mom_6m,
        &data.features.vol_3m,
        &data.ctx,
        bt_config.top_n,
        bt_config.lambda_sent,
    );
    if picks.is_empty() {
        return Err(StockpickerError::NoData {
            what: format!("fewer than {} rankable tickers on {asof}", bt_config.top_n),
        });
    }

    let weights = target_weights(
        &picks,
        bt_config.weighting,
        asof,
        &data.features.vol_3m,
        bt_config.max_weight,
    );
    let holdings = recommend_portfolio(
        &picks,
        &weights,
        &data.prices,
        asof,
        trades.capital,
        trades.allow_fractional,
    );
    let orders = make_trade_blotter(
        asof,
        trades.capital,
        &WeightMap::new(),
        &weights,
        &data.prices,
        trades.allow_fractional,
    );

    Ok(PickList {
        asof,
        weights,
        holdings,
        trades: orders,
    })
}

fn load_pipeline_inputs(
    adapter: &FileConfigAdapter,
    overrides: &BacktestOverrides,
) -> Result<(BacktestConfig, PreparedData), StockpickerError> {
    validate_backtest_config(adapter)?;
    let bt_config = build_backtest_config(adapter, overrides)?;
    let paths = data_paths(adapter)?;
    let subset = universe_subset(adapter)?;
    let sentiment = load_sentiment(&paths, bt_config.lambda_sent)?;

    eprintln!("Loading prices from {}", paths.prices.display());
    let data_port = CsvPriceAdapter::new(paths.prices, paths.sectors);
    let data = prepare_data(&data_port, subset, sentiment)?;
    eprintln!(
        "Universe: {} tickers, {} trading days",
        data.prices.tickers().len(),
        data.prices.dates().len()
    );
    Ok((bt_config, data))
}

pub fn run_backtest(config_path: &Path, output: Option<&Path>, overrides: &BacktestOverrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let (bt_config, data) = match load_pipeline_inputs(&adapter, overrides) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| output_paths(&adapter).results);

    match run_backtest_pipeline(&data, &bt_config, &CsvReportAdapter::new(), &output) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

pub fn run_picks(config_path: &Path, capital: Option<f64>, allow_fractional: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let (bt_config, data) = match load_pipeline_inputs(&adapter, &BacktestOverrides::default()) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    let mut trades = match trades_config(&adapter) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };
    if let Some(c) = capital {
        if !(c.is_finite() && c > 0.0) {
            return fail(StockpickerError::invalid("trades", "capital", "capital must be positive"));
        }
        trades.capital = c;
    }
    trades.allow_fractional |= allow_fractional;

    let picks = match generate_picks(&data, &bt_config, &trades) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Portfolio for {} ===", picks.asof);
    for h in &picks.holdings {
        eprintln!(
            "  {:<6} {:>6.2}%  {:>10.2} @ {:>9.2}  {} shares",
            h.ticker,
            h.weight * 100.0,
            h.dollars,
            h.price,
            h.shares
        );
    }

    let outputs = output_paths(&adapter);
    let report = CsvReportAdapter::new();
    if let Err(e) = report
        .write_recommendation(&picks.holdings, &outputs.portfolio)
        .and_then(|()| report.write_blotter(&picks.trades, &outputs.blotter))
    {
        return fail(e);
    }

    eprintln!(
        "\nSaved: {}, {}",
        outputs.portfolio.display(),
        outputs.blotter.display()
    );
    ExitCode::SUCCESS
}

pub fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter).and_then(|()| print_config_summary(&adapter)) {
        return fail(e);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn print_config_summary(adapter: &dyn ConfigPort) -> Result<(), StockpickerError> {
    let bt = backtest_config(adapter)?;
    let paths = data_paths(adapter)?;
    let subset = universe_subset(adapter)?;
    let trades = trades_config(adapter)?;
    let outputs = output_paths(adapter);

    eprintln!("\nData:");
    eprintln!("  prices:    {}", paths.prices.display());
    eprintln!("  sectors:   {}", paths.sectors.display());
    if let Some(s) = &paths.sentiment {
        eprintln!("  sentiment: {}", s.display());
    }

    eprintln!("\nUniverse:");
    match subset {
        Some(list) => eprintln!("  tickers: {}", list.join(", ")),
        None => eprintln!("  tickers: all with a sector"),
    }

    eprintln!("\nBacktest:");
    eprintln!("  start:           {}", bt.start);
    eprintln!("  top_n:           {}", bt.top_n);
    eprintln!("  cost_rate:       {}", bt.cost_rate);
    eprintln!("  weighting:       {}", bt.weighting);
    eprintln!("  max_weight:      {}", bt.max_weight);
    eprintln!("  lambda_sent:     {}", bt.lambda_sent);
    eprintln!("  initial_capital: {}", bt.initial_capital);

    eprintln!("\nOutput:");
    eprintln!("  results:   {}", outputs.results.display());
    eprintln!("  portfolio: {}", outputs.portfolio.display());
    eprintln!("  blotter:   {}", outputs.blotter.display());

    eprintln!("\nTrades:");
    eprintln!("  capital:          {}", trades.capital);
    eprintln!("  allow_fractional: {}", trades.allow_fractional);
    Ok(())
}
