//! Restart-resilient autopilot around the order workflow.
//!
//! A persisted, versioned record is the single source of truth for an armed
//! run and doubles as the mutual-exclusion flag: arming writes it, stopping
//! and every terminal run outcome clear it. If the record is present at
//! process start the scheduler re-arms itself only after a user-cancellable
//! grace window; an unattended resume straight into order submission is a
//! financial-risk surface.
//!
//! The wait loop sleeps in short increments through [`ClockPort`] and
//! re-checks [`CancelPort`] at every increment; cancellation clears the
//! record and performs no broker calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::OptionPilotError;
use crate::domain::options::{estimated_cost, Direction};
use crate::domain::workflow::{round_cents, EntryPlan, OrderWorkflow, WorkflowConfig, WorkflowOutcome};
use crate::ports::broker_port::BrokerPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::runtime_port::{CancelPort, ClockPort, StatusPort};
use crate::ports::state_port::StatePort;

pub const STATE_KEY: &str = "autopilot";
pub const STATE_VERSION: u32 = 1;

/// The persisted arm record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoPilotState {
    pub version: u32,
    pub enabled: bool,
    pub symbol: String,
    pub trigger_time: chrono::NaiveTime,
    pub budget: f64,
    pub ask_min: f64,
    pub ask_max: f64,
    pub trend_filter: bool,
}

impl AutoPilotState {
    /// Load the persisted record. Missing, unparsable and unknown-version
    /// records all read as `None`; a schema bump must be migrated here, not
    /// silently misread.
    pub fn load(store: &dyn StatePort) -> Option<Self> {
        let value = store.load(STATE_KEY).ok().flatten()?;
        let state: AutoPilotState = serde_json::from_value(value).ok()?;
        if state.version != STATE_VERSION {
            return None;
        }
        Some(state)
    }

    pub fn save(&self, store: &dyn StatePort) -> Result<(), OptionPilotError> {
        let value =
            serde_json::to_value(self).map_err(|e| OptionPilotError::PersistenceCorrupt {
                key: STATE_KEY.to_string(),
                reason: e.to_string(),
            })?;
        store.save(STATE_KEY, &value)
    }

    pub fn clear(store: &dyn StatePort) -> Result<(), OptionPilotError> {
        store.clear(STATE_KEY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoPilotConfig {
    /// Sleep step while waiting for the trigger time.
    pub wait_increment: Duration,
    /// Countdown before an automatic resume goes live.
    pub resume_grace: Duration,
    /// Sleep step during the resume countdown.
    pub grace_increment: Duration,
    /// How many of the nearest expiries to scan for a candidate.
    pub scan_expiries: usize,
    /// Added to the candidate's ask for the entry limit, to improve fill
    /// odds.
    pub limit_markup: f64,
    pub workflow: WorkflowConfig,
}

impl Default for AutoPilotConfig {
    fn default() -> Self {
        AutoPilotConfig {
            wait_increment: Duration::from_secs(30),
            resume_grace: Duration::from_secs(10),
            grace_increment: Duration::from_secs(1),
            scan_expiries: 3,
            limit_markup: 0.05,
            workflow: WorkflowConfig::default(),
        }
    }
}

/// Affordable contract quantity for a budget: floor(budget / (ask × 100)),
/// floored again to an even count so half can later be sold.
pub fn affordable_quantity(budget: f64, ask: f64) -> i64 {
    if ask <= 0.0 {
        return 0;
    }
    let mut quantity = (budget / estimated_cost(ask, 1)).floor() as i64;
    quantity -= quantity % 2;
    quantity
}

/// Terminal outcome of an autopilot operation. Everything except `Armed`
/// leaves no persisted record behind.
#[derive(Debug, Clone, PartialEq)]
pub enum AutoPilotOutcome {
    Armed,
    AlreadyArmed,
    Cancelled,
    TrendRejected,
    NoCandidate,
    InsufficientBudget { quantity: i64 },
    Traded(WorkflowOutcome),
    Failed { reason: String },
}

impl AutoPilotOutcome {
    pub fn describe(&self) -> String {
        match self {
            AutoPilotOutcome::Armed => "autopilot armed".into(),
            AutoPilotOutcome::AlreadyArmed => {
                "an autopilot run is already armed; stop it before arming another".into()
            }
            AutoPilotOutcome::Cancelled => {
                "autopilot cancelled; persisted state cleared".into()
            }
            AutoPilotOutcome::TrendRejected => {
                "trend filter rejected the run (latest bar closed below its open)".into()
            }
            AutoPilotOutcome::NoCandidate => {
                "no contract with an ask in the configured range; nothing traded".into()
            }
            AutoPilotOutcome::InsufficientBudget { quantity } => format!(
                "budget affords only {} contract(s), need at least 2; nothing traded",
                quantity
            ),
            AutoPilotOutcome::Traded(workflow) => workflow.describe(),
            AutoPilotOutcome::Failed { reason } => format!("autopilot run failed: {}", reason),
        }
    }
}

/// The autopilot scheduler. One run per arm; it never auto-repeats.
pub struct AutoPilot<'a> {
    market: &'a dyn MarketDataPort,
    broker: &'a dyn BrokerPort,
    store: &'a dyn StatePort,
    clock: &'a dyn ClockPort,
    cancel: &'a dyn CancelPort,
    status: &'a dyn StatusPort,
    config: AutoPilotConfig,
}

impl<'a> AutoPilot<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: &'a dyn MarketDataPort,
        broker: &'a dyn BrokerPort,
        store: &'a dyn StatePort,
        clock: &'a dyn ClockPort,
        cancel: &'a dyn CancelPort,
        status: &'a dyn StatusPort,
        config: AutoPilotConfig,
    ) -> Self {
        AutoPilot {
            market,
            broker,
            store,
            clock,
            cancel,
            status,
            config,
        }
    }

    /// Persist a new arm record. Refuses when one is already armed; the
    /// record itself is the mutual-exclusion flag.
    pub fn arm(&self, state: &AutoPilotState) -> Result<AutoPilotOutcome, OptionPilotError> {
        if AutoPilotState::load(self.store).is_some_and(|s| s.enabled) {
            return Ok(AutoPilotOutcome::AlreadyArmed);
        }
        state.save(self.store)?;
        self.status.report(&format!(
            "autopilot armed: {} at {}, budget ${:.2}, ask ${:.2}..${:.2}",
            state.symbol, state.trigger_time, state.budget, state.ask_min, state.ask_max
        ));
        Ok(AutoPilotOutcome::Armed)
    }

    /// Drop any persisted record.
    pub fn disarm(&self) -> Result<(), OptionPilotError> {
        AutoPilotState::clear(self.store)
    }

    /// Resume a persisted run found at startup. Returns `None` when nothing
    /// is armed. The run only goes live after the grace countdown passes
    /// without cancellation; a cancel during the countdown clears the record
    /// and touches the broker not at all.
    pub fn resume(&self) -> Option<AutoPilotOutcome> {
        let state = AutoPilotState::load(self.store)?;
        if !state.enabled {
            return None;
        }

        self.status.report(&format!(
            "armed autopilot for {} found; resuming in {}s unless cancelled",
            state.symbol,
            self.config.resume_grace.as_secs()
        ));
        let mut waited = Duration::ZERO;
        while waited < self.config.resume_grace {
            if self.cancel.is_cancelled() {
                return Some(self.conclude(AutoPilotOutcome::Cancelled));
            }
            let step = self.config.grace_increment.min(self.config.resume_grace - waited);
            self.clock.sleep(step);
            waited += step;
        }

        Some(self.run(&state))
    }

    /// Wait for the trigger time, then execute the armed trade once. Every
    /// exit path clears the persisted record.
    pub fn run(&self, state: &AutoPilotState) -> AutoPilotOutcome {
        loop {
            let now = self.clock.now();
            if now.time() >= state.trigger_time {
                break;
            }
            if self.cancel.is_cancelled() {
                return self.conclude(AutoPilotOutcome::Cancelled);
            }
            let remaining = state.trigger_time - now.time();
            self.status.report(&format!(
                "waiting for {}: {}s remaining",
                state.trigger_time,
                remaining.num_seconds()
            ));
            let step = remaining
                .to_std()
                .unwrap_or(self.config.wait_increment)
                .min(self.config.wait_increment);
            self.clock.sleep(step);
        }

        self.fire(state)
    }

    fn fire(&self, state: &AutoPilotState) -> AutoPilotOutcome {
        if state.trend_filter {
            match self.market.get_latest_bar(&state.symbol) {
                Ok(bar) if bar.is_bullish() => self.status.report(&format!(
                    "trend filter passed (close {:.2} >= open {:.2})",
                    bar.close, bar.open
                )),
                Ok(_) => return self.conclude(AutoPilotOutcome::TrendRejected),
                Err(e) => {
                    return self.conclude(AutoPilotOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let expiries = match self.market.get_expiries(&state.symbol) {
            Ok(expiries) => expiries,
            Err(e) => {
                return self.conclude(AutoPilotOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        let mut candidate = None;
        for expiry in expiries.iter().take(self.config.scan_expiries) {
            match self
                .market
                .get_option_chain(&state.symbol, *expiry, Direction::Call)
            {
                Ok(chain) => {
                    if let Some(contract) = chain
                        .iter()
                        .find(|c| c.ask >= state.ask_min && c.ask <= state.ask_max)
                    {
                        candidate = Some(contract.clone());
                        break;
                    }
                }
                Err(OptionPilotError::DataUnavailable { .. }) => continue,
                Err(e) => {
                    return self.conclude(AutoPilotOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            }
        }
        let contract = match candidate {
            Some(contract) => contract,
            None => return self.conclude(AutoPilotOutcome::NoCandidate),
        };
        self.status.report(&format!(
            "candidate {} (strike {}, ask ${:.2})",
            contract.contract_symbol, contract.strike, contract.ask
        ));

        let quantity = affordable_quantity(state.budget, contract.ask);
        if quantity < 2 {
            return self.conclude(AutoPilotOutcome::InsufficientBudget { quantity });
        }

        let plan = EntryPlan {
            symbol: contract.contract_symbol.clone(),
            quantity,
            limit_price: Some(round_cents(contract.ask + self.config.limit_markup)),
            hedge: true,
        };
        let workflow = OrderWorkflow::new(
            self.broker,
            self.clock,
            self.cancel,
            self.status,
            self.config.workflow.clone(),
        );
        let outcome = workflow.execute(&plan);
        self.conclude(AutoPilotOutcome::Traded(outcome))
    }

    fn conclude(&self, outcome: AutoPilotOutcome) -> AutoPilotOutcome {
        if let Err(e) = AutoPilotState::clear(self.store) {
            self.status
                .report(&format!("warning: failed to clear autopilot state: {}", e));
        }
        self.status.report(&outcome.describe());
        outcome
    }
}
