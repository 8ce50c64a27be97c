//! Watchlist persistence, scanning, and the one-click strategy sweep.

use crate::domain::error::OptionPilotError;
use crate::domain::indicator::{compute_snapshot, IndicatorConfig};
use crate::domain::order::{OrderRequest, OrderSide};
use crate::domain::signal::{classify_stock, ClassifierConfig, StockSignal};
use crate::ports::broker_port::BrokerPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::state_port::StatePort;

pub const WATCHLIST_KEY: &str = "watchlist";

pub const DEFAULT_WATCHLIST: [&str; 5] = ["NVDA", "TSLA", "VOO", "PLTR", "SGOV"];

/// Bars fetched per symbol when scanning/sweeping; enough for SMA(200) plus
/// warmup slack.
pub const SWEEP_LOOKBACK_DAYS: u32 = 500;

fn default_watchlist() -> Vec<String> {
    DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect()
}

/// Load the watchlist, falling back to the default list on a missing or
/// corrupt entry.
pub fn load_watchlist(store: &dyn StatePort) -> Vec<String> {
    let value = match store.load(WATCHLIST_KEY) {
        Ok(Some(value)) => value,
        _ => return default_watchlist(),
    };
    match serde_json::from_value::<Vec<String>>(value) {
        Ok(symbols) => symbols,
        Err(_) => default_watchlist(),
    }
}

pub fn save_watchlist(store: &dyn StatePort, symbols: &[String]) -> Result<(), OptionPilotError> {
    let value =
        serde_json::to_value(symbols).map_err(|e| OptionPilotError::PersistenceCorrupt {
            key: WATCHLIST_KEY.to_string(),
            reason: e.to_string(),
        })?;
    store.save(WATCHLIST_KEY, &value)
}

/// Add a symbol if absent. Returns whether the list changed.
pub fn add_symbol(symbols: &mut Vec<String>, symbol: &str) -> bool {
    if symbols.iter().any(|s| s == symbol) {
        return false;
    }
    symbols.push(symbol.to_string());
    true
}

/// Remove a symbol if present. Returns whether the list changed.
pub fn remove_symbol(symbols: &mut Vec<String>, symbol: &str) -> bool {
    let before = symbols.len();
    symbols.retain(|s| s != symbol);
    symbols.len() != before
}

/// One row of a watchlist scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRow {
    pub symbol: String,
    pub signal: Option<StockSignal>,
    pub last_close: Option<f64>,
    pub note: String,
}

/// Classify every watchlist symbol. Data failures degrade to a "no data"
/// row, never an error.
pub fn scan_watchlist(
    market: &dyn MarketDataPort,
    symbols: &[String],
    indicators: &IndicatorConfig,
    classifier: &ClassifierConfig,
) -> Vec<ScanRow> {
    symbols
        .iter()
        .map(|symbol| {
            let bars = match market.get_bars(symbol, SWEEP_LOOKBACK_DAYS) {
                Ok(bars) => bars,
                Err(_) => {
                    return ScanRow {
                        symbol: symbol.clone(),
                        signal: None,
                        last_close: None,
                        note: "no data".into(),
                    };
                }
            };
            match compute_snapshot(&bars, indicators) {
                Some(snapshot) => {
                    let advice = classify_stock(&snapshot, symbol, classifier);
                    ScanRow {
                        symbol: symbol.clone(),
                        signal: Some(advice.signal),
                        last_close: Some(snapshot.close),
                        note: advice.reason,
                    }
                }
                None => ScanRow {
                    symbol: symbol.clone(),
                    signal: None,
                    last_close: bars.last().map(|b| b.close),
                    note: "insufficient history".into(),
                },
            }
        })
        .collect()
}

/// Run the stock strategy once across the watchlist: buy one unit on `Buy`
/// when flat, sell the whole position on `Sell` when held, skip otherwise.
/// Returns one outcome line per symbol.
pub fn sweep_watchlist(
    market: &dyn MarketDataPort,
    broker: &dyn BrokerPort,
    symbols: &[String],
    indicators: &IndicatorConfig,
    classifier: &ClassifierConfig,
) -> Result<Vec<String>, OptionPilotError> {
    let positions = broker.list_positions()?;
    let held = |symbol: &str| {
        positions
            .iter()
            .find(|p| p.symbol == symbol)
            .map(|p| p.quantity)
    };

    let mut log = Vec::with_capacity(symbols.len());
    for row in scan_watchlist(market, symbols, indicators, classifier) {
        let line = match (row.signal, held(&row.symbol)) {
            (Some(StockSignal::Buy), None) => {
                match place_sweep_order(broker, &row.symbol, OrderSide::Buy, 1) {
                    Ok(message) => format!("{}: buy 1 unit ({})", row.symbol, message),
                    Err(e) => format!("{}: buy failed: {}", row.symbol, e),
                }
            }
            (Some(StockSignal::Sell), Some(quantity)) if quantity > 0 => {
                match place_sweep_order(broker, &row.symbol, OrderSide::Sell, quantity) {
                    Ok(message) => {
                        format!("{}: sell {} units ({})", row.symbol, quantity, message)
                    }
                    Err(e) => format!("{}: sell failed: {}", row.symbol, e),
                }
            }
            _ => format!("{}: skip ({})", row.symbol, row.note),
        };
        log.push(line);
    }
    Ok(log)
}

fn place_sweep_order(
    broker: &dyn BrokerPort,
    symbol: &str,
    side: OrderSide,
    quantity: i64,
) -> Result<String, OptionPilotError> {
    let pending = broker.list_open_orders(Some(symbol))?;
    if !pending.is_empty() {
        return Ok("already pending, skipped".into());
    }
    let order = broker.submit_order(&OrderRequest::market(symbol, side, quantity))?;
    Ok(format!("order {} {}", order.id, order.status))
}
