//! Conditional order execution state machine.
//!
//! Places an entry buy, polls the broker for the fill on a bounded schedule,
//! then (in hedge mode) derives and places the dependent exit order: half the
//! filled quantity offered at twice the realized fill price, good till
//! canceled. The engine's responsibility ends once the exit order is
//! accepted; the exit lives at the broker until filled or canceled
//! out-of-band.
//!
//! Every transition is reported through [`StatusPort`], and every terminal
//! outcome renders a one-line description for the operator. A fill timeout is
//! a normal outcome, not an error.

use std::time::Duration;

use crate::domain::error::OptionPilotError;
use crate::domain::order::{Order, OrderRequest, OrderSide, OrderStatus, TimeInForce};
use crate::ports::broker_port::BrokerPort;
use crate::ports::runtime_port::{CancelPort, ClockPort, StatusPort};

/// Exit limit as a multiple of the realized entry fill price.
pub const HEDGE_PRICE_MULTIPLE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Maximum fill polls before giving up on the entry.
    pub poll_attempts: u32,
    /// Sleep between polls.
    pub poll_interval: Duration,
    /// Cancel the stale entry order after a poll timeout.
    pub cancel_on_timeout: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            poll_attempts: 10,
            poll_interval: Duration::from_secs(1),
            cancel_on_timeout: false,
        }
    }
}

/// What to buy and whether to run the doubling tactic afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPlan {
    pub symbol: String,
    pub quantity: i64,
    /// `None` submits a market order.
    pub limit_price: Option<f64>,
    /// Hedge mode: poll for the fill, then place the derived exit order.
    pub hedge: bool,
}

/// Round a price to the nearest cent.
pub fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Exit quantity and limit price derived from the realized entry fill:
/// half the position (floored) at twice the fill price.
pub fn derive_hedge(filled_quantity: i64, fill_price: f64) -> (i64, f64) {
    (
        filled_quantity / 2,
        round_cents(fill_price * HEDGE_PRICE_MULTIPLE),
    )
}

/// Step at which the workflow was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Precheck,
    EntrySubmit,
    FillPoll,
    ExitSubmit,
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStage::Precheck => "open-order check",
            WorkflowStage::EntrySubmit => "entry submission",
            WorkflowStage::FillPoll => "fill polling",
            WorkflowStage::ExitSubmit => "exit submission",
        };
        write!(f, "{}", s)
    }
}

/// Terminal outcome of one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// An open order for the symbol already exists; nothing was submitted.
    AlreadyPending { symbol: String },
    /// Plain mode: entry submitted and still working.
    EntryPending { entry: Order },
    /// Entry filled; no exit order was placed (plain mode, or a position too
    /// small to hedge).
    EntryFilled { entry: Order },
    /// The broker rejected (or externally canceled) the entry.
    EntryRejected { entry: Order },
    /// Poll budget exhausted without a full fill. The caller owns follow-up;
    /// any partial fill is reported in the order snapshot.
    EntryTimeout { entry: Order, canceled: bool },
    /// Entry filled and the derived exit order is working at the broker.
    Hedged { entry: Order, exit: Order },
    /// Cancellation flag observed mid-run.
    Cancelled { stage: WorkflowStage },
    /// A broker call failed. `entry` is present when the entry had already
    /// filled, meaning a live, un-hedged position exists.
    Failed {
        stage: WorkflowStage,
        reason: String,
        entry: Option<Order>,
    },
}

impl WorkflowOutcome {
    /// One-line operator-facing summary.
    pub fn describe(&self) -> String {
        match self {
            WorkflowOutcome::AlreadyPending { symbol } => {
                format!("{} already has a pending order, skipping", symbol)
            }
            WorkflowOutcome::EntryPending { entry } => format!(
                "entry order {} submitted, status {}",
                entry.id, entry.status
            ),
            WorkflowOutcome::EntryFilled { entry } => format!(
                "entry order {} filled ({} units at ${:.2})",
                entry.id,
                entry.filled_quantity,
                entry.filled_avg_price.unwrap_or(0.0)
            ),
            WorkflowOutcome::EntryRejected { entry } => {
                format!("entry order {} {}", entry.id, entry.status)
            }
            WorkflowOutcome::EntryTimeout { entry, canceled } => {
                let tail = if *canceled {
                    "stale order canceled"
                } else {
                    "order still working; hedge manually if it fills"
                };
                format!(
                    "entry order {} not filled in time ({}/{} filled); {}",
                    entry.id, entry.filled_quantity, entry.quantity, tail
                )
            }
            WorkflowOutcome::Hedged { entry, exit } => format!(
                "bought {} at ${:.2}; hedge sell {} at ${:.2} working (gtc)",
                entry.filled_quantity,
                entry.filled_avg_price.unwrap_or(0.0),
                exit.quantity,
                exit.limit_price.unwrap_or(0.0)
            ),
            WorkflowOutcome::Cancelled { stage } => {
                format!("workflow cancelled during {}", stage)
            }
            WorkflowOutcome::Failed {
                stage,
                reason,
                entry,
            } => match entry {
                Some(order) => format!(
                    "{} failed after the entry filled ({} units live and un-hedged): {}",
                    stage, order.filled_quantity, reason
                ),
                None => format!("{} failed: {}", stage, reason),
            },
        }
    }
}

/// The order workflow engine. Holds only collaborators and configuration;
/// all order state lives at the broker.
pub struct OrderWorkflow<'a> {
    broker: &'a dyn BrokerPort,
    clock: &'a dyn ClockPort,
    cancel: &'a dyn CancelPort,
    status: &'a dyn StatusPort,
    config: WorkflowConfig,
}

impl<'a> OrderWorkflow<'a> {
    pub fn new(
        broker: &'a dyn BrokerPort,
        clock: &'a dyn ClockPort,
        cancel: &'a dyn CancelPort,
        status: &'a dyn StatusPort,
        config: WorkflowConfig,
    ) -> Self {
        OrderWorkflow {
            broker,
            clock,
            cancel,
            status,
            config,
        }
    }

    /// Run the state machine to a terminal outcome.
    pub fn execute(&self, plan: &EntryPlan) -> WorkflowOutcome {
        let outcome = self.run(plan);
        self.status.report(&outcome.describe());
        outcome
    }

    fn run(&self, plan: &EntryPlan) -> WorkflowOutcome {
        self.status
            .report(&format!("checking for pending orders on {}", plan.symbol));
        match self.broker.list_open_orders(Some(&plan.symbol)) {
            Ok(open) if !open.is_empty() => {
                return WorkflowOutcome::AlreadyPending {
                    symbol: plan.symbol.clone(),
                };
            }
            Ok(_) => {}
            Err(e) => return self.fail(WorkflowStage::Precheck, e, None),
        }

        let request = match plan.limit_price {
            Some(price) => OrderRequest::limit(
                &plan.symbol,
                OrderSide::Buy,
                plan.quantity,
                price,
                TimeInForce::Day,
            ),
            None => OrderRequest::market(&plan.symbol, OrderSide::Buy, plan.quantity),
        };
        match plan.limit_price {
            Some(price) => self.status.report(&format!(
                "submitting entry: buy {} {} limit ${:.2}",
                plan.quantity, plan.symbol, price
            )),
            None => self.status.report(&format!(
                "submitting entry: buy {} {} at market",
                plan.quantity, plan.symbol
            )),
        }

        let entry = match self.broker.submit_order(&request) {
            Ok(order) => order,
            Err(e) => return self.fail(WorkflowStage::EntrySubmit, e, None),
        };
        if entry.status == OrderStatus::Rejected {
            return WorkflowOutcome::EntryRejected { entry };
        }
        self.status
            .report(&format!("entry order {} {}", entry.id, entry.status));

        if !plan.hedge {
            return if entry.status == OrderStatus::Filled {
                WorkflowOutcome::EntryFilled { entry }
            } else {
                WorkflowOutcome::EntryPending { entry }
            };
        }

        let filled = match self.poll_for_fill(&entry) {
            PollResult::Filled(order) => order,
            PollResult::Terminal(outcome) => return outcome,
        };

        let fill_price = match filled.filled_avg_price.or(filled.limit_price) {
            Some(price) => price,
            None => {
                return WorkflowOutcome::Failed {
                    stage: WorkflowStage::ExitSubmit,
                    reason: "realized fill price unavailable".into(),
                    entry: Some(filled),
                };
            }
        };
        let filled_qty = if filled.filled_quantity > 0 {
            filled.filled_quantity
        } else {
            filled.quantity
        };
        self.status.report(&format!(
            "entry filled: {} units at ${:.2}",
            filled_qty, fill_price
        ));

        let (exit_qty, exit_price) = derive_hedge(filled_qty, fill_price);
        if exit_qty == 0 {
            self.status
                .report("position too small to hedge, keeping it whole");
            return WorkflowOutcome::EntryFilled { entry: filled };
        }

        self.status.report(&format!(
            "submitting hedge: sell {} {} limit ${:.2} gtc",
            exit_qty, plan.symbol, exit_price
        ));
        let exit_request = OrderRequest::limit(
            &plan.symbol,
            OrderSide::Sell,
            exit_qty,
            exit_price,
            TimeInForce::Gtc,
        );
        let exit = match self.broker.submit_order(&exit_request) {
            Ok(order) => order,
            Err(e) => return self.fail(WorkflowStage::ExitSubmit, e, Some(filled)),
        };
        if exit.status == OrderStatus::Rejected {
            return WorkflowOutcome::Failed {
                stage: WorkflowStage::ExitSubmit,
                reason: "hedge order rejected".into(),
                entry: Some(filled),
            };
        }

        WorkflowOutcome::Hedged {
            entry: filled,
            exit,
        }
    }

    fn poll_for_fill(&self, entry: &Order) -> PollResult {
        if entry.status == OrderStatus::Filled {
            return PollResult::Filled(entry.clone());
        }

        let mut last = entry.clone();
        for attempt in 1..=self.config.poll_attempts {
            if self.cancel.is_cancelled() {
                self.status
                    .report("cancel requested; entry order left working at the broker");
                return PollResult::Terminal(WorkflowOutcome::Cancelled {
                    stage: WorkflowStage::FillPoll,
                });
            }
            self.clock.sleep(self.config.poll_interval);

            last = match self.broker.get_order(&entry.id) {
                Ok(order) => order,
                Err(e) => {
                    return PollResult::Terminal(self.fail(
                        WorkflowStage::FillPoll,
                        e,
                        Some(last),
                    ));
                }
            };
            match last.status {
                OrderStatus::Filled => return PollResult::Filled(last),
                OrderStatus::PartiallyFilled => self.status.report(&format!(
                    "poll {}/{}: partial fill {}/{}",
                    attempt, self.config.poll_attempts, last.filled_quantity, last.quantity
                )),
                OrderStatus::Rejected | OrderStatus::Canceled => {
                    return PollResult::Terminal(WorkflowOutcome::EntryRejected { entry: last });
                }
                _ => self.status.report(&format!(
                    "poll {}/{}: status {}",
                    attempt, self.config.poll_attempts, last.status
                )),
            }
        }

        let mut canceled = false;
        if self.config.cancel_on_timeout {
            match self.broker.cancel_order(&last.id) {
                Ok(true) => canceled = true,
                Ok(false) => self.status.report("stale entry order could not be canceled"),
                Err(e) => self
                    .status
                    .report(&format!("stale entry cancel failed: {}", e)),
            }
        }
        PollResult::Terminal(WorkflowOutcome::EntryTimeout {
            entry: last,
            canceled,
        })
    }

    fn fail(
        &self,
        stage: WorkflowStage,
        error: OptionPilotError,
        entry: Option<Order>,
    ) -> WorkflowOutcome {
        WorkflowOutcome::Failed {
            stage,
            reason: error.to_string(),
            entry,
        }
    }
}

enum PollResult {
    Filled(Order),
    Terminal(WorkflowOutcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hedge_halves_quantity_and_doubles_price() {
        let (qty, price) = derive_hedge(4, 2.0);
        assert_eq!(qty, 2);
        assert!((price - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn hedge_floors_odd_quantity() {
        let (qty, _) = derive_hedge(5, 1.0);
        assert_eq!(qty, 2);
        let (qty, _) = derive_hedge(1, 1.0);
        assert_eq!(qty, 0);
    }

    #[test]
    fn hedge_price_rounds_to_cents() {
        let (_, price) = derive_hedge(2, 1.234);
        assert!((price - 2.47).abs() < f64::EPSILON);
        let (_, price) = derive_hedge(2, 3.333);
        assert!((price - 6.67).abs() < f64::EPSILON);
    }

    #[test]
    fn round_cents_to_nearest() {
        assert!((round_cents(1.006) - 1.01).abs() < f64::EPSILON);
        assert!((round_cents(2.994) - 2.99).abs() < f64::EPSILON);
    }

    #[test]
    fn failed_after_fill_mentions_live_position() {
        let outcome = WorkflowOutcome::Failed {
            stage: WorkflowStage::ExitSubmit,
            reason: "connection reset".into(),
            entry: Some(Order {
                id: "1".into(),
                symbol: "NVDA".into(),
                side: OrderSide::Buy,
                quantity: 4,
                order_type: crate::domain::order::OrderType::Limit,
                limit_price: Some(2.0),
                time_in_force: TimeInForce::Day,
                status: OrderStatus::Filled,
                filled_quantity: 4,
                filled_avg_price: Some(2.0),
            }),
        };
        let text = outcome.describe();
        assert!(text.contains("un-hedged"), "got: {}", text);
        assert!(text.contains("connection reset"));
    }

    #[test]
    fn timeout_description_reports_partial_fill() {
        let outcome = WorkflowOutcome::EntryTimeout {
            entry: Order {
                id: "7".into(),
                symbol: "NVDA".into(),
                side: OrderSide::Buy,
                quantity: 4,
                order_type: crate::domain::order::OrderType::Limit,
                limit_price: Some(2.0),
                time_in_force: TimeInForce::Day,
                status: OrderStatus::PartiallyFilled,
                filled_quantity: 1,
                filled_avg_price: Some(2.0),
            },
            canceled: false,
        };
        let text = outcome.describe();
        assert!(text.contains("1/4"), "got: {}", text);
    }
}
