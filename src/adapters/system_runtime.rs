//! System runtime adapters: real clock, atomic cancel flag, stderr status.

use crate::ports::runtime_port::{CancelPort, ClockPort, StatusPort};
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Local wall clock with real sleeping.
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shareable cancel flag; set from anywhere, observed at loop boundaries.
#[derive(Clone, Default)]
pub struct AtomicCancelFlag {
    flag: Arc<AtomicBool>,
}

impl AtomicCancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl CancelPort for AtomicCancelFlag {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress text on stderr, keeping stdout for results.
pub struct ConsoleStatus;

impl StatusPort for ConsoleStatus {
    fn report(&self, message: &str) {
        eprintln!("{}", message);
    }
}
