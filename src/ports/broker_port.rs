//! Brokerage access port trait.

use crate::domain::error::OptionPilotError;
use crate::domain::order::{AccountSnapshot, BrokerPosition, Order, OrderRequest};

/// Synchronous brokerage operations. The broker is the sole authority on
/// order and position truth; any call may fail with
/// [`OptionPilotError::Broker`] carrying the venue's message.
pub trait BrokerPort {
    fn submit_order(&self, request: &OrderRequest) -> Result<Order, OptionPilotError>;

    fn get_order(&self, id: &str) -> Result<Order, OptionPilotError>;

    /// Returns whether the order was actually canceled.
    fn cancel_order(&self, id: &str) -> Result<bool, OptionPilotError>;

    /// Open (non-terminal) orders, optionally filtered to one symbol.
    fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, OptionPilotError>;

    fn list_positions(&self) -> Result<Vec<BrokerPosition>, OptionPilotError>;

    fn get_account(&self) -> Result<AccountSnapshot, OptionPilotError>;
}
