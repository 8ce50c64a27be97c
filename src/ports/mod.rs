//! Port traits: the capability seams between domain logic and the outside
//! world (market data, broker, persisted state, config, runtime).

pub mod market_data_port;
pub mod broker_port;
pub mod state_port;
pub mod config_port;
pub mod runtime_port;
