//! Price and universe data port.

use crate::domain::error::StockpickerError;
use crate::domain::panel::PriceTable;
use std::collections::HashMap;

pub trait PriceDataPort {
    /// Adjusted closing prices, one column per ticker.
    fn load_prices(&self) -> Result<PriceTable, StockpickerError>;

    /// Ticker to sector mapping for the investable universe.
    fn load_sectors(&self) -> Result<HashMap<String, String>, StockpickerError>;
}
