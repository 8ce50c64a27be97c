//! Persisted state access port trait.

use crate::domain::error::OptionPilotError;

/// Small key/value JSON store for state that must survive restarts
/// (autopilot record, watchlist).
///
/// A missing or unparsable entry loads as `None`; callers fall back to their
/// documented defaults. Writes must be atomic so a crash mid-write cannot
/// leave a truncated record.
pub trait StatePort {
    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, OptionPilotError>;

    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), OptionPilotError>;

    fn clear(&self, key: &str) -> Result<(), OptionPilotError>;
}
