//! Market data access port trait.

use crate::domain::bar::PriceBar;
use crate::domain::error::OptionPilotError;
use crate::domain::options::{Direction, OptionContract};
use chrono::NaiveDate;

/// Read-only view of a market data venue.
///
/// Implementations fail with [`OptionPilotError::DataUnavailable`] when the
/// venue has nothing for a symbol; callers treat that as "no data", not as a
/// fault to propagate loudly.
pub trait MarketDataPort {
    /// Daily bars for the trailing `lookback_days`, oldest first.
    fn get_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<PriceBar>, OptionPilotError>;

    /// The most recent bar.
    fn get_latest_bar(&self, symbol: &str) -> Result<PriceBar, OptionPilotError>;

    /// Listed option expiries, soonest first.
    fn get_expiries(&self, symbol: &str) -> Result<Vec<NaiveDate>, OptionPilotError>;

    /// One side of the chain for a single expiry.
    fn get_option_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
        direction: Direction,
    ) -> Result<Vec<OptionContract>, OptionPilotError>;
}
