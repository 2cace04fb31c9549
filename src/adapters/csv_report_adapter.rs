//! CSV report adapter implementing ReportPort.

use crate::domain::backtest::EquityCurve;
use crate::domain::blotter::{Holding, TradeInstruction};
use crate::domain::error::StockpickerError;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

#[derive(Serialize)]
struct EquityRow {
    date: String,
    portfolio_return: f64,
    turnover: f64,
    cost_paid_frac: f64,
    equity: f64,
    equity_norm: f64,
}

#[derive(Serialize)]
struct HoldingRow<'a> {
    ticker: &'a str,
    weight: f64,
    price: f64,
    dollars: f64,
    shares: f64,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    date: String,
    ticker: &'a str,
    price: f64,
    prev_weight: f64,
    target_weight: f64,
    delta_notional: f64,
    delta_shares: f64,
    action: String,
}

fn write_rows<T, I>(path: &Path, headers: &[&str], rows: I) -> Result<(), StockpickerError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    wtr.write_record(headers).map_err(|e| csv_error(path, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| csv_error(path, e))?;
    }
    wtr.flush()?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn csv_error(path: &Path, e: csv::Error) -> StockpickerError {
    StockpickerError::Io(std::io::Error::other(format!(
        "failed to write {}: {}",
        path.display(),
        e
    )))
}

impl ReportPort for CsvReportAdapter {
    fn write_equity_curve(&self, curve: &EquityCurve, path: &Path) -> Result<(), StockpickerError> {
        write_rows(
            path,
            &[
                "date",
                "portfolio_return",
                "turnover",
                "cost_paid_frac",
                "equity",
                "equity_norm",
            ],
            curve.records.iter().map(|r| EquityRow {
                date: r.date.to_string(),
                portfolio_return: r.portfolio_return,
                turnover: r.turnover,
                cost_paid_frac: r.cost_paid_frac,
                equity: r.equity,
                equity_norm: r.equity_norm,
            }),
        )
    }

    fn write_recommendation(&self, holdings: &[Holding], path: &Path) -> Result<(), StockpickerError> {
        write_rows(
            path,
            &["ticker", "weight", "price", "dollars", "shares"],
            holdings.iter().map(|h| HoldingRow {
                ticker: &h.ticker,
                weight: h.weight,
                price: h.price,
                dollars: h.dollars,
                shares: h.shares,
            }),
        )
    }

    fn write_blotter(&self, trades: &[TradeInstruction], path: &Path) -> Result<(), StockpickerError> {
        write_rows(
            path,
            &[
                "date",
                "ticker",
                "price",
                "prev_weight",
                "target_weight",
                "delta_notional",
                "delta_shares",
                "action",
            ],
            trades.iter().map(|t| TradeRow {
                date: t.date.to_string(),
                ticker: &t.ticker,
                price: t.price,
                prev_weight: t.prev_weight,
                target_weight: t.target_weight,
                delta_notional: t.delta_notional,
                delta_shares: t.delta_shares,
                action: t.action.to_string(),
            }),
        )
    }
}
