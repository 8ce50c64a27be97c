#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use optionpilot::domain::bar::PriceBar;
use optionpilot::domain::error::OptionPilotError;
use optionpilot::domain::options::{Direction, OptionContract};
use optionpilot::ports::market_data_port::MarketDataPort;
use optionpilot::ports::runtime_port::{CancelPort, ClockPort, StatusPort};
use optionpilot::ports::state_port::StatePort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

pub fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(offset)
}

pub fn make_bar(symbol: &str, offset: u64, open: f64, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date: day(offset),
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume: 10_000,
    }
}

pub fn make_contract(symbol: &str, strike: f64, ask: f64, expiry: NaiveDate) -> OptionContract {
    OptionContract {
        contract_symbol: format!("{}{}C{:08}", symbol, expiry.format("%y%m%d"), (strike * 1000.0) as u64),
        strike,
        expiry,
        bid: (ask - 0.1).max(0.0),
        ask,
        last_price: ask,
        implied_volatility: 0.40,
        volume: 500,
    }
}

/// Canned market data keyed by symbol and expiry.
pub struct StaticMarketData {
    bars: HashMap<String, Vec<PriceBar>>,
    expiries: HashMap<String, Vec<NaiveDate>>,
    chains: HashMap<(String, NaiveDate, Direction), Vec<OptionContract>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        StaticMarketData {
            bars: HashMap::new(),
            expiries: HashMap::new(),
            chains: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_expiries(mut self, symbol: &str, expiries: Vec<NaiveDate>) -> Self {
        self.expiries.insert(symbol.to_string(), expiries);
        self
    }

    pub fn with_chain(
        mut self,
        symbol: &str,
        expiry: NaiveDate,
        direction: Direction,
        chain: Vec<OptionContract>,
    ) -> Self {
        self.chains
            .insert((symbol.to_string(), expiry, direction), chain);
        self
    }

    fn unavailable(symbol: &str) -> OptionPilotError {
        OptionPilotError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "not on file".into(),
        }
    }
}

impl MarketDataPort for StaticMarketData {
    fn get_bars(&self, symbol: &str, _lookback_days: u32) -> Result<Vec<PriceBar>, OptionPilotError> {
        self.bars
            .get(symbol)
            .cloned()
            .ok_or_else(|| Self::unavailable(symbol))
    }

    fn get_latest_bar(&self, symbol: &str) -> Result<PriceBar, OptionPilotError> {
        self.bars
            .get(symbol)
            .and_then(|bars| bars.last().cloned())
            .ok_or_else(|| Self::unavailable(symbol))
    }

    fn get_expiries(&self, symbol: &str) -> Result<Vec<NaiveDate>, OptionPilotError> {
        self.expiries
            .get(symbol)
            .cloned()
            .ok_or_else(|| Self::unavailable(symbol))
    }

    fn get_option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
        direction: Direction,
    ) -> Result<Vec<OptionContract>, OptionPilotError> {
        self.chains
            .get(&(symbol.to_string(), expiry, direction))
            .cloned()
            .ok_or_else(|| Self::unavailable(symbol))
    }
}

/// Deterministic clock: `sleep` advances `now`, and every sleep is recorded.
pub struct TestClock {
    now: RefCell<NaiveDateTime>,
    sleeps: RefCell<Vec<Duration>>,
}

impl TestClock {
    pub fn starting_at(time: NaiveTime) -> Self {
        TestClock {
            now: RefCell::new(day(30).and_time(time)),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.borrow().len()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.borrow().iter().sum()
    }
}

impl ClockPort for TestClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.borrow()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let mut now = self.now.borrow_mut();
        *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

/// Cancellation flag that flips after a fixed number of checks.
pub struct CancelAfter {
    remaining: RefCell<u32>,
}

impl CancelAfter {
    pub fn checks(n: u32) -> Self {
        CancelAfter {
            remaining: RefCell::new(n),
        }
    }

    /// Never cancels.
    pub fn never() -> Self {
        Self::checks(u32::MAX)
    }
}

impl CancelPort for CancelAfter {
    fn is_cancelled(&self) -> bool {
        let mut remaining = self.remaining.borrow_mut();
        if *remaining == 0 {
            return true;
        }
        *remaining -= 1;
        false
    }
}

/// Captures every status line for assertions.
#[derive(Default)]
pub struct StatusRecorder {
    lines: RefCell<Vec<String>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.borrow().iter().any(|l| l.contains(needle))
    }
}

impl StatusPort for StatusRecorder {
    fn report(&self, message: &str) {
        self.lines.borrow_mut().push(message.to_string());
    }
}

/// In-memory state store.
#[derive(Default)]
pub struct MemoryState {
    entries: RefCell<HashMap<String, serde_json::Value>>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preload(self, key: &str, value: serde_json::Value) -> Self {
        self.entries.borrow_mut().insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.borrow().get(key).cloned()
    }
}

impl StatePort for MemoryState {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, OptionPilotError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), OptionPilotError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), OptionPilotError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}
