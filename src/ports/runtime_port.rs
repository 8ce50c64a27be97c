//! Runtime port traits: wall clock, cooperative cancellation, progress
//! reporting.
//!
//! The workflow and autopilot loops suspend only through these traits, so
//! tests can drive them without real sleeping and observe every transition.

use chrono::NaiveDateTime;
use std::time::Duration;

/// Local wall clock plus sleeping.
pub trait ClockPort {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// Cooperative cancellation flag, checked at loop-iteration boundaries only.
pub trait CancelPort {
    fn is_cancelled(&self) -> bool;
}

/// Progress/status text sink. Every user-observable transition of the order
/// workflow and the autopilot goes through here.
pub trait StatusPort {
    fn report(&self, message: &str);
}

/// A flag that never cancels, for call sites without an interactive caller.
pub struct NeverCancelled;

impl CancelPort for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}
