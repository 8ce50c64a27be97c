//! Concrete implementations of the port traits.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_state_adapter;
pub mod paper_broker;
pub mod system_runtime;
