#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use stockpicker::domain::backtest::BacktestConfig;
use stockpicker::domain::error::StockpickerError;
use stockpicker::domain::panel::{Panel, PriceTable};
use stockpicker::ports::data_port::PriceDataPort;
use stockpicker::ports::sentiment_port::SentimentPort;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn sectors(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(t, s)| (t.to_string(), s.to_string()))
        .collect()
}

pub struct MockPriceDataPort {
    pub prices: PriceTable,
    pub sectors: HashMap<String, String>,
    pub error: Option<String>,
}

impl MockPriceDataPort {
    pub fn new(prices: PriceTable, sectors: HashMap<String, String>) -> Self {
        Self {
            prices,
            sectors,
            error: None,
        }
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn load_prices(&self) -> Result<PriceTable, StockpickerError> {
        if let Some(reason) = &self.error {
            return Err(StockpickerError::data(reason.clone()));
        }
        Ok(self.prices.clone())
    }

    fn load_sectors(&self) -> Result<HashMap<String, String>, StockpickerError> {
        Ok(self.sectors.clone())
    }
}

/// Sentiment lookup that records how often it is consulted.
pub struct CountingSentiment {
    pub scores: HashMap<String, f64>,
    pub calls: Rc<Cell<usize>>,
}

impl CountingSentiment {
    /// Same score for a ticker in every month.
    pub fn constant(pairs: &[(&str, f64)]) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let sentiment = Self {
            scores: pairs.iter().map(|(t, z)| (t.to_string(), *z)).collect(),
            calls: Rc::clone(&calls),
        };
        (sentiment, calls)
    }
}

impl SentimentPort for CountingSentiment {
    fn lookup(&self, _month_end: NaiveDate, ticker: &str) -> Option<f64> {
        self.calls.set(self.calls.get() + 1);
        self.scores.get(ticker).copied()
    }
}

/// `n` consecutive weekdays starting at `start` (or the next weekday).
pub fn weekdays(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut day = start;
    while out.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(day);
        }
        day = day.succ_opt().unwrap();
    }
    out
}

/// Synthetic ticker: daily growth `drift` with an alternating wiggle of size `wiggle`.
#[derive(Debug, Clone, Copy)]
pub struct Synthetic {
    pub ticker: &'static str,
    pub start: f64,
    pub drift: f64,
    pub wiggle: f64,
}

impl Synthetic {
    pub fn price(&self, i: usize) -> f64 {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        self.start * (1.0 + self.drift).powi(i as i32) * (1.0 + sign * self.wiggle)
    }
}

/// A: strong steady riser. B: mild riser. C: flat and noisy. D: slow decliner.
pub fn synthetic_universe() -> Vec<Synthetic> {
    vec![
        Synthetic { ticker: "AAA", start: 100.0, drift: 0.003, wiggle: 0.002 },
        Synthetic { ticker: "BBB", start: 50.0, drift: 0.001, wiggle: 0.01 },
        Synthetic { ticker: "CCC", start: 20.0, drift: 0.0, wiggle: 0.02 },
        Synthetic { ticker: "DDD", start: 80.0, drift: -0.001, wiggle: 0.005 },
    ]
}

pub fn synthetic_prices(assets: &[Synthetic], dates: &[NaiveDate]) -> PriceTable {
    let tickers = assets.iter().map(|s| s.ticker.to_string()).collect();
    let rows = (0..dates.len())
        .map(|i| assets.iter().map(|s| Some(s.price(i))).collect())
        .collect();
    Panel::new(dates.to_vec(), tickers, rows).unwrap()
}

/// 300 weekdays from 2020-01-01.
pub fn synthetic_calendar() -> Vec<NaiveDate> {
    weekdays(date(2020, 1, 1), 300)
}

pub fn tech_sectors() -> HashMap<String, String> {
    sectors(&[("AAA", "Tech"), ("BBB", "Tech"), ("CCC", "Tech"), ("DDD", "Tech")])
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        top_n: 1,
        start: date(2020, 8, 1),
        cost_rate: 0.0,
        ..BacktestConfig::default()
    }
}

/// Render a panel as a wide `date,<T1>,...` CSV with blanks for missing cells.
pub fn to_price_csv(prices: &PriceTable) -> String {
    let mut out = String::from("date");
    for t in prices.tickers() {
        out.push(',');
        out.push_str(t);
    }
    out.push('\n');
    for &d in prices.dates() {
        out.push_str(&d.to_string());
        for t in prices.tickers() {
            out.push(',');
            if let Some(v) = prices.get(d, t) {
                out.push_str(&format!("{v}"));
            }
        }
        out.push('\n');
    }
    out
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}
