//! Report output port.

use crate::domain::backtest::EquityCurve;
use crate::domain::blotter::{Holding, TradeInstruction};
use crate::domain::error::StockpickerError;
use std::path::Path;

/// Port for writing backtest and trade-generation outputs.
pub trait ReportPort {
    fn write_equity_curve(&self, curve: &EquityCurve, path: &Path) -> Result<(), StockpickerError>;

    fn write_recommendation(&self, holdings: &[Holding], path: &Path) -> Result<(), StockpickerError>;

    fn write_blotter(&self, trades: &[TradeInstruction], path: &Path) -> Result<(), StockpickerError>;
}
