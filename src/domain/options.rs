//! Option contract selection: expiry choice, ITM/ATM/OTM strike picks.

use chrono::NaiveDate;
use std::fmt;

/// Contracts per lot for standard US equity options.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// Trade direction, fixed at selection time and carried explicitly from then
/// on; it is never re-derived from the contract symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Call,
    Put,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Call => write!(f, "call"),
            Direction::Put => write!(f, "put"),
        }
    }
}

/// A single quoted contract from an option chain snapshot. Read-only
/// external data; selection never mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionContract {
    pub contract_symbol: String,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub bid: f64,
    pub ask: f64,
    pub last_price: f64,
    pub implied_volatility: f64,
    pub volume: i64,
}

impl OptionContract {
    /// Premium to quote a buy at: the ask, falling back to the last trade
    /// when the ask is missing/zero.
    pub fn effective_premium(&self) -> f64 {
        if self.ask > 0.0 { self.ask } else { self.last_price }
    }

    /// Underlying price at which the position starts paying at expiry.
    pub fn breakeven(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Call => self.strike + self.effective_premium(),
            Direction::Put => self.strike - self.effective_premium(),
        }
    }
}

/// Total premium outlay for `quantity` contracts.
pub fn estimated_cost(premium: f64, quantity: i64) -> f64 {
    premium * CONTRACT_MULTIPLIER * quantity as f64
}

/// Conservative / balanced / aggressive strike picks for one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikePicks {
    /// ITM: higher win odds, more premium at risk.
    pub conservative: OptionContract,
    /// ATM: closest strike to the underlying.
    pub balanced: OptionContract,
    /// OTM: cheap, needs a large move.
    pub aggressive: OptionContract,
}

/// Pick ITM/ATM/OTM contracts from a single-expiry chain.
///
/// ATM minimizes |strike - underlying|. For calls, ITM is the highest strike
/// strictly below the underlying and OTM the lowest strictly above; puts are
/// mirrored. A missing side falls back to the ATM pick. Returns `None` only
/// for an empty chain.
pub fn pick_strikes(
    chain: &[OptionContract],
    underlying: f64,
    direction: Direction,
) -> Option<StrikePicks> {
    let atm = chain.iter().fold(None::<&OptionContract>, |best, c| {
        match best {
            Some(b) if (b.strike - underlying).abs() <= (c.strike - underlying).abs() => Some(b),
            _ => Some(c),
        }
    })?;

    let (itm, otm) = match direction {
        Direction::Call => (
            chain
                .iter()
                .filter(|c| c.strike < underlying)
                .fold(None::<&OptionContract>, |best, c| match best {
                    Some(b) if b.strike >= c.strike => Some(b),
                    _ => Some(c),
                }),
            chain
                .iter()
                .filter(|c| c.strike > underlying)
                .fold(None::<&OptionContract>, |best, c| match best {
                    Some(b) if b.strike <= c.strike => Some(b),
                    _ => Some(c),
                }),
        ),
        Direction::Put => (
            chain
                .iter()
                .filter(|c| c.strike > underlying)
                .fold(None::<&OptionContract>, |best, c| match best {
                    Some(b) if b.strike <= c.strike => Some(b),
                    _ => Some(c),
                }),
            chain
                .iter()
                .filter(|c| c.strike < underlying)
                .fold(None::<&OptionContract>, |best, c| match best {
                    Some(b) if b.strike >= c.strike => Some(b),
                    _ => Some(c),
                }),
        ),
    };

    Some(StrikePicks {
        conservative: itm.unwrap_or(atm).clone(),
        balanced: atm.clone(),
        aggressive: otm.unwrap_or(atm).clone(),
    })
}

/// Informational risk bucket for an expiry's days-to-expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBucket {
    High,
    MediumHigh,
    Balanced,
    Low,
}

impl fmt::Display for RiskBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBucket::High => write!(f, "high risk"),
            RiskBucket::MediumHigh => write!(f, "medium-high risk"),
            RiskBucket::Balanced => write!(f, "balanced"),
            RiskBucket::Low => write!(f, "low risk"),
        }
    }
}

pub fn risk_bucket(dte: i64) -> RiskBucket {
    if dte < 7 {
        RiskBucket::High
    } else if dte < 30 {
        RiskBucket::MediumHigh
    } else if dte <= 60 {
        RiskBucket::Balanced
    } else {
        RiskBucket::Low
    }
}

/// Index of the preferred expiry: days-to-expiry in [30, 60] minimizing
/// |dte - 45|, defaulting to the first listed expiry when none qualifies.
pub fn choose_expiry(expiries: &[NaiveDate], today: NaiveDate) -> Option<usize> {
    if expiries.is_empty() {
        return None;
    }

    let mut best_index = 0;
    let mut best_diff = i64::MAX;
    for (i, expiry) in expiries.iter().enumerate() {
        let dte = (*expiry - today).num_days();
        if (30..=60).contains(&dte) {
            let diff = (dte - 45).abs();
            if diff < best_diff {
                best_diff = diff;
                best_index = i;
            }
        }
    }
    Some(best_index)
}
