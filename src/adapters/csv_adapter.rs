//! CSV file data adapter.
//!
//! Prices are a wide table, `date,<T1>,<T2>,...`, one row per trading day.
//! Sectors are a two-column `ticker,sector` file.

use crate::domain::error::StockpickerError;
use crate::domain::panel::PriceTable;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvPriceAdapter {
    prices_path: PathBuf,
    sectors_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SectorRow {
    ticker: String,
    sector: String,
}

impl CsvPriceAdapter {
    pub fn new(prices_path: PathBuf, sectors_path: PathBuf) -> Self {
        Self {
            prices_path,
            sectors_path,
        }
    }
}

fn read_file(path: &Path) -> Result<String, StockpickerError> {
    fs::read_to_string(path).map_err(|e| {
        StockpickerError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read {}: {}", path.display(), e),
        ))
    })
}

fn parse_cell(raw: &str, date: NaiveDate, ticker: &str) -> Result<Option<f64>, StockpickerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(|v| v.is_finite().then_some(v))
        .map_err(|e| StockpickerError::data(format!("invalid price for {ticker} on {date}: {e}")))
}

/// Parse a wide price table. Rows are sorted by date; a repeated date is an error.
pub fn parse_price_csv(content: &str) -> Result<PriceTable, StockpickerError> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| StockpickerError::data(format!("CSV parse error: {e}")))?
        .clone();
    match headers.get(0) {
        Some(h) if h.trim().eq_ignore_ascii_case("date") => {}
        _ => return Err(StockpickerError::data("first price column must be 'date'")),
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_uppercase()).collect();

    let mut rows: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| StockpickerError::data(format!("CSV parse error: {e}")))?;

        let date_str = record
            .get(0)
            .ok_or_else(|| StockpickerError::data("missing date column"))?;
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
            .map_err(|e| StockpickerError::data(format!("invalid date '{date_str}': {e}")))?;

        let values = tickers
            .iter()
            .enumerate()
            .map(|(j, ticker)| parse_cell(record.get(j + 1).unwrap_or(""), date, ticker))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((date, values));
    }

    rows.sort_by_key(|(d, _)| *d);
    let (dates, values): (Vec<NaiveDate>, Vec<Vec<Option<f64>>>) = rows.into_iter().unzip();
    PriceTable::new(dates, tickers, values)
}

/// Parse `ticker,sector`. Tickers are upper-cased; a later row overrides an earlier one.
pub fn parse_sector_csv(content: &str) -> Result<HashMap<String, String>, StockpickerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut sectors = HashMap::new();
    for result in rdr.deserialize::<SectorRow>() {
        let row = result.map_err(|e| StockpickerError::data(format!("sector CSV parse error: {e}")))?;
        if row.ticker.is_empty() || row.sector.is_empty() {
            continue;
        }
        sectors.insert(row.ticker.to_uppercase(), row.sector);
    }
    Ok(sectors)
}

impl PriceDataPort for CsvPriceAdapter {
    fn load_prices(&self) -> Result<PriceTable, StockpickerError> {
        parse_price_csv(&read_file(&self.prices_path)?)
    }

    fn load_sectors(&self) -> Result<HashMap<String, String>, StockpickerError> {
        parse_sector_csv(&read_file(&self.sectors_path)?)
    }
}
