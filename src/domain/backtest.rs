//! Day-by-day backtest of the trend-following entry/exit rules.
//!
//! Single pass over a chronological bar series. Flat: enter long on a close
//! above the short SMA while RSI is under the ceiling, full position at the
//! close. Long: exit at the close on a break of the long SMA or on the
//! stop-loss, whichever is detected first. Equity (cash + position) is
//! recorded every simulated bar.
//!
//! Deliberately simple, matching the product behavior it validates: one
//! symbol, whole shares only, close-only fills, no commissions or slippage.
//! Given identical inputs the run is bit-for-bit reproducible.

use chrono::NaiveDate;

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{rsi::calculate_rsi, sma::calculate_sma};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestParams {
    pub initial_capital: f64,
    /// Entry trigger window.
    pub sma_short: usize,
    /// Exit trigger window.
    pub sma_long: usize,
    pub rsi_period: usize,
    /// No entries while RSI is at or above this.
    pub rsi_ceiling: f64,
    /// Fractional loss from the entry price that forces an exit, e.g. 0.10.
    pub stop_loss_pct: f64,
}

impl Default for BacktestParams {
    fn default() -> Self {
        BacktestParams {
            initial_capital: 10_000.0,
            sma_short: 20,
            sma_long: 50,
            rsi_period: 14,
            rsi_ceiling: 70.0,
            stop_loss_pct: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: i64,
    /// Zero for entries; realized (exit - entry) × quantity for exits.
    pub pnl: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Fractional return, e.g. 0.25 for +25%.
    pub total_return: f64,
    /// Number of completed sells.
    pub trade_count: usize,
    /// Winning sells over total sells; 0 when no sells.
    pub win_rate: f64,
    /// Buy-and-hold return over the same simulated window.
    pub buy_hold_return: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeRecord>,
}

impl BacktestReport {
    /// True when the series never triggered an entry (or was too short to
    /// simulate at all).
    pub fn is_no_trade(&self) -> bool {
        self.trade_count == 0 && self.trades.is_empty()
    }

    fn empty(initial_capital: f64) -> Self {
        BacktestReport {
            initial_capital,
            final_equity: initial_capital,
            total_return: 0.0,
            trade_count: 0,
            win_rate: 0.0,
            buy_hold_return: 0.0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
        }
    }
}

/// Run the simulation. A series too short for the warmup produces the
/// explicit no-trade report rather than an error.
pub fn run_backtest(bars: &[PriceBar], params: &BacktestParams) -> BacktestReport {
    let start_idx = params.sma_long.max(50);
    if bars.len() <= start_idx || params.initial_capital <= 0.0 {
        return BacktestReport::empty(params.initial_capital);
    }

    let sma_short = calculate_sma(bars, params.sma_short);
    let sma_long = calculate_sma(bars, params.sma_long);
    let rsi = calculate_rsi(bars, params.rsi_period);

    let mut cash = params.initial_capital;
    let mut position_qty: i64 = 0;
    let mut entry_price = 0.0;
    let mut equity_curve = Vec::with_capacity(bars.len() - start_idx);
    let mut trades = Vec::new();

    for (i, bar) in bars.iter().enumerate().skip(start_idx) {
        let price = bar.close;

        if position_qty > 0 {
            let exit_reason = if sma_long.value_at(i).is_some_and(|sma| price < sma) {
                Some("broke long SMA")
            } else if price <= entry_price * (1.0 - params.stop_loss_pct) {
                Some("stop loss")
            } else {
                None
            };

            if let Some(reason) = exit_reason {
                cash += position_qty as f64 * price;
                let pnl = (price - entry_price) * position_qty as f64;
                trades.push(TradeRecord {
                    date: bar.date,
                    action: TradeAction::Sell,
                    price,
                    quantity: position_qty,
                    pnl,
                    reason: reason.to_string(),
                });
                position_qty = 0;
                entry_price = 0.0;
            }
        } else {
            let above_short = sma_short.value_at(i).is_some_and(|sma| price > sma);
            let momentum_ok = rsi.value_at(i).is_some_and(|r| r < params.rsi_ceiling);
            if above_short && momentum_ok {
                let quantity = (cash / price).floor() as i64;
                if quantity > 0 {
                    cash -= quantity as f64 * price;
                    position_qty = quantity;
                    entry_price = price;
                    trades.push(TradeRecord {
                        date: bar.date,
                        action: TradeAction::Buy,
                        price,
                        quantity,
                        pnl: 0.0,
                        reason: format!("close above SMA({})", params.sma_short),
                    });
                }
            }
        }

        equity_curve.push(EquityPoint {
            date: bar.date,
            equity: cash + position_qty as f64 * price,
        });
    }

    let final_equity = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(params.initial_capital);
    let total_return = (final_equity - params.initial_capital) / params.initial_capital;

    let sells: Vec<&TradeRecord> = trades
        .iter()
        .filter(|t| t.action == TradeAction::Sell)
        .collect();
    let trade_count = sells.len();
    let wins = sells.iter().filter(|t| t.pnl > 0.0).count();
    let win_rate = if trade_count > 0 {
        wins as f64 / trade_count as f64
    } else {
        0.0
    };

    let start_price = bars[start_idx].close;
    let end_price = bars[bars.len() - 1].close;
    let buy_hold_return = if start_price > 0.0 {
        (end_price - start_price) / start_price
    } else {
        0.0
    };

    BacktestReport {
        initial_capital: params.initial_capital,
        final_equity,
        total_return,
        trade_count,
        win_rate,
        buy_hold_return,
        equity_curve,
        trades,
    }
}
