//! Trend/momentum signal classification.
//!
//! Pure decision table over the latest-bar indicator snapshot: trend from the
//! short vs long SMA, momentum gate from RSI against configurable
//! overbought/oversold thresholds. Symbols on the cash-equivalent list bypass
//! the table entirely.

use crate::domain::indicator::IndicatorSnapshot;

/// Signal for a plain stock trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockSignal {
    Buy,
    Sell,
    Wait,
    Cash,
}

/// Signal for an options directional trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSignal {
    Call,
    Put,
    Wait,
    Overheated,
    Oversold,
    Cash,
}

/// A classification plus the reason it was reached. Created fresh on every
/// evaluation; carries no identity across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Advice<S> {
    pub signal: S,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub rsi_upper: f64,
    pub rsi_lower: f64,
    /// Symbols that always classify as cash-equivalent (short-duration
    /// treasury ETFs and the like).
    pub cash_symbols: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            rsi_upper: 70.0,
            rsi_lower: 30.0,
            cash_symbols: ["SGOV", "SHV", "BIL", "USFR"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ClassifierConfig {
    fn is_cash_symbol(&self, symbol: &str) -> bool {
        self.cash_symbols.iter().any(|s| s == symbol)
    }
}

enum Trend {
    Bullish,
    Bearish,
    Flat,
}

fn trend(snapshot: &IndicatorSnapshot) -> Trend {
    match (snapshot.sma_short, snapshot.sma_long) {
        (Some(short), Some(long)) if short > long => Trend::Bullish,
        (Some(short), Some(long)) if short < long => Trend::Bearish,
        _ => Trend::Flat,
    }
}

/// Classify for an options directional trade.
pub fn classify_option(
    snapshot: &IndicatorSnapshot,
    symbol: &str,
    config: &ClassifierConfig,
) -> Advice<OptionSignal> {
    if config.is_cash_symbol(symbol) {
        return Advice {
            signal: OptionSignal::Cash,
            reason: format!("{} is a cash-equivalent holding", symbol),
        };
    }

    let rsi = match snapshot.rsi {
        Some(rsi) => rsi,
        None => {
            return Advice {
                signal: OptionSignal::Wait,
                reason: "cannot evaluate momentum".into(),
            };
        }
    };

    match trend(snapshot) {
        Trend::Bullish if rsi < config.rsi_upper => Advice {
            signal: OptionSignal::Call,
            reason: "bullish alignment, RSI not overheated".into(),
        },
        Trend::Bullish => Advice {
            signal: OptionSignal::Overheated,
            reason: "bullish but overbought".into(),
        },
        Trend::Bearish if rsi > config.rsi_lower => Advice {
            signal: OptionSignal::Put,
            reason: "bearish alignment, RSI not oversold".into(),
        },
        Trend::Bearish => Advice {
            signal: OptionSignal::Oversold,
            reason: "bearish but oversold".into(),
        },
        Trend::Flat => Advice {
            signal: OptionSignal::Wait,
            reason: "no clear trend".into(),
        },
    }
}

/// Classify for a plain stock trade. Same table as [`classify_option`] with
/// the overheated/oversold warnings folded into `Wait`.
pub fn classify_stock(
    snapshot: &IndicatorSnapshot,
    symbol: &str,
    config: &ClassifierConfig,
) -> Advice<StockSignal> {
    let option_advice = classify_option(snapshot, symbol, config);
    let signal = match option_advice.signal {
        OptionSignal::Cash => StockSignal::Cash,
        OptionSignal::Call => StockSignal::Buy,
        OptionSignal::Put => StockSignal::Sell,
        OptionSignal::Wait | OptionSignal::Overheated | OptionSignal::Oversold => StockSignal::Wait,
    };
    Advice {
        signal,
        reason: option_advice.reason,
    }
}
