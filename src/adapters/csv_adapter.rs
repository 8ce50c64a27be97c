//! CSV file market data adapter.
//!
//! Layout under the base directory:
//! - `{SYMBOL}.csv`: daily bars, `date,open,high,low,close,volume`
//! - `{SYMBOL}_{YYYY-MM-DD}_{calls|puts}.csv`: one chain side per expiry,
//!   `contract_symbol,strike,bid,ask,last_price,implied_volatility,volume`
//!
//! Expiries are discovered by scanning the directory for chain files.

use crate::domain::bar::PriceBar;
use crate::domain::error::OptionPilotError;
use crate::domain::options::{Direction, OptionContract};
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn bars_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn chain_path(&self, symbol: &str, expiry: NaiveDate, direction: Direction) -> PathBuf {
        let side = match direction {
            Direction::Call => "calls",
            Direction::Put => "puts",
        };
        self.base_path
            .join(format!("{}_{}_{}.csv", symbol, expiry, side))
    }

    fn unavailable(&self, symbol: &str, reason: String) -> OptionPilotError {
        OptionPilotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        }
    }

    fn read_all_bars(&self, symbol: &str) -> Result<Vec<PriceBar>, OptionPilotError> {
        let path = self.bars_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| self.unavailable(symbol, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| self.unavailable(symbol, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| self.unavailable(symbol, "missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .map_err(|e| self.unavailable(symbol, format!("invalid date format: {}", e)))?;

            let open = parse_f64(&record, 1, "open").map_err(|r| self.unavailable(symbol, r))?;
            let high = parse_f64(&record, 2, "high").map_err(|r| self.unavailable(symbol, r))?;
            let low = parse_f64(&record, 3, "low").map_err(|r| self.unavailable(symbol, r))?;
            let close = parse_f64(&record, 4, "close").map_err(|r| self.unavailable(symbol, r))?;
            let volume = parse_i64(&record, 5, "volume").map_err(|r| self.unavailable(symbol, r))?;

            bars.push(PriceBar {
                symbol: symbol.to_string(),
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        if bars.is_empty() {
            return Err(self.unavailable(symbol, "no bars on file".into()));
        }
        Ok(bars)
    }
}

fn parse_f64(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {} column", name))?
        .parse()
        .map_err(|e| format!("invalid {} value: {}", name, e))
}

fn parse_i64(record: &csv::StringRecord, index: usize, name: &str) -> Result<i64, String> {
    record
        .get(index)
        .ok_or_else(|| format!("missing {} column", name))?
        .parse()
        .map_err(|e| format!("invalid {} value: {}", name, e))
}

impl MarketDataPort for CsvAdapter {
    fn get_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<PriceBar>, OptionPilotError> {
        let bars = self.read_all_bars(symbol)?;
        let last_date = bars[bars.len() - 1].date;
        let cutoff = last_date - chrono::Days::new(lookback_days as u64);
        Ok(bars.into_iter().filter(|b| b.date >= cutoff).collect())
    }

    fn get_latest_bar(&self, symbol: &str) -> Result<PriceBar, OptionPilotError> {
        let mut bars = self.read_all_bars(symbol)?;
        bars.pop()
            .ok_or_else(|| self.unavailable(symbol, "no bars on file".into()))
    }

    fn get_expiries(&self, symbol: &str) -> Result<Vec<NaiveDate>, OptionPilotError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            self.unavailable(
                symbol,
                format!("failed to read directory {}: {}", self.base_path.display(), e),
            )
        })?;

        let prefix = format!("{}_", symbol);
        let mut expiries = Vec::new();

        for entry in entries {
            let entry = entry
                .map_err(|e| self.unavailable(symbol, format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            let Some(rest) = name_str.strip_prefix(&prefix) else {
                continue;
            };
            let date_part = match rest.strip_suffix("_calls.csv") {
                Some(d) => d,
                None => match rest.strip_suffix("_puts.csv") {
                    Some(d) => d,
                    None => continue,
                },
            };
            if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
                if !expiries.contains(&date) {
                    expiries.push(date);
                }
            }
        }

        if expiries.is_empty() {
            return Err(self.unavailable(symbol, "no option chain files".into()));
        }
        expiries.sort();
        Ok(expiries)
    }

    fn get_option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
        direction: Direction,
    ) -> Result<Vec<OptionContract>, OptionPilotError> {
        let path = self.chain_path(symbol, expiry, direction);
        let content = fs::read_to_string(&path)
            .map_err(|e| self.unavailable(symbol, format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut chain = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| self.unavailable(symbol, format!("CSV parse error: {}", e)))?;

            let contract_symbol = record
                .get(0)
                .ok_or_else(|| self.unavailable(symbol, "missing contract_symbol column".into()))?
                .to_string();

            chain.push(OptionContract {
                contract_symbol,
                strike: parse_f64(&record, 1, "strike").map_err(|r| self.unavailable(symbol, r))?,
                expiry,
                bid: parse_f64(&record, 2, "bid").map_err(|r| self.unavailable(symbol, r))?,
                ask: parse_f64(&record, 3, "ask").map_err(|r| self.unavailable(symbol, r))?,
                last_price: parse_f64(&record, 4, "last_price")
                    .map_err(|r| self.unavailable(symbol, r))?,
                implied_volatility: parse_f64(&record, 5, "implied_volatility")
                    .map_err(|r| self.unavailable(symbol, r))?,
                volume: parse_i64(&record, 6, "volume").map_err(|r| self.unavailable(symbol, r))?,
            });
        }

        chain.sort_by(|a, b| a.strike.total_cmp(&b.strike));
        Ok(chain)
    }
}
