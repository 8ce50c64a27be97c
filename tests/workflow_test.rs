//! Order workflow state machine scenarios against the paper broker.

mod common;

use chrono::NaiveTime;
use common::{CancelAfter, StatusRecorder, TestClock};
use optionpilot::adapters::paper_broker::PaperBroker;
use optionpilot::domain::order::{OrderRequest, OrderSide, OrderStatus, TimeInForce};
use optionpilot::domain::workflow::{
    EntryPlan, OrderWorkflow, WorkflowConfig, WorkflowOutcome, WorkflowStage,
};
use optionpilot::ports::broker_port::BrokerPort;
use std::time::Duration;

const CONTRACT: &str = "NVDA240216C00100000";

fn fast_config() -> WorkflowConfig {
    WorkflowConfig {
        poll_attempts: 10,
        poll_interval: Duration::from_secs(1),
        cancel_on_timeout: false,
    }
}

fn plan(quantity: i64, limit: f64, hedge: bool) -> EntryPlan {
    EntryPlan {
        symbol: CONTRACT.to_string(),
        quantity,
        limit_price: Some(limit),
        hedge,
    }
}

fn workflow_parts() -> (TestClock, CancelAfter, StatusRecorder) {
    (
        TestClock::starting_at(NaiveTime::from_hms_opt(9, 30, 0).unwrap()),
        CancelAfter::never(),
        StatusRecorder::new(),
    )
}

#[test]
fn doubling_tactic_places_half_position_at_double_price() {
    let broker = PaperBroker::new(10_000.0).with_fill_after_polls(2);
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));

    match outcome {
        WorkflowOutcome::Hedged { entry, exit } => {
            assert_eq!(entry.filled_quantity, 4);
            assert_eq!(entry.filled_avg_price, Some(2.0));
            assert_eq!(exit.quantity, 2);
            assert_eq!(exit.limit_price, Some(4.0));
            assert_eq!(exit.side, OrderSide::Sell);
            assert_eq!(exit.time_in_force, TimeInForce::Gtc);
        }
        other => panic!("expected Hedged, got {:?}", other),
    }

    // Two orders total: the entry and the derived exit.
    let log = broker.order_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].side, OrderSide::Buy);
    assert_eq!(log[1].side, OrderSide::Sell);

    // Both polls slept on the configured interval.
    assert_eq!(clock.sleep_count(), 2);

    // Every transition produced a status line.
    assert!(status.contains("checking for pending orders"));
    assert!(status.contains("submitting entry"));
    assert!(status.contains("entry filled"));
    assert!(status.contains("submitting hedge"));
}

#[test]
fn fill_price_overrides_limit_when_broker_reports_it() {
    // Paper broker fills at the limit, so drive the derived numbers from a
    // realized price by polling until filled and checking the exit math.
    let broker = PaperBroker::new(10_000.0).with_fill_after_polls(1);
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(6, 1.55, true));
    match outcome {
        WorkflowOutcome::Hedged { exit, .. } => {
            assert_eq!(exit.quantity, 3);
            assert_eq!(exit.limit_price, Some(3.1));
        }
        other => panic!("expected Hedged, got {:?}", other),
    }
}

#[test]
fn timeout_without_fill_places_no_exit_order() {
    let broker = PaperBroker::new(10_000.0).with_never_fill();
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));

    match &outcome {
        WorkflowOutcome::EntryTimeout { entry, canceled } => {
            assert_eq!(entry.filled_quantity, 0);
            assert!(!canceled);
        }
        other => panic!("expected EntryTimeout, got {:?}", other),
    }
    assert_eq!(broker.order_log().len(), 1, "no exit order after timeout");
    assert_eq!(clock.sleep_count(), 10, "entire poll budget was used");
    assert!(status.contains("not filled in time"));
}

#[test]
fn timeout_can_cancel_the_stale_entry() {
    let broker = PaperBroker::new(10_000.0).with_never_fill();
    let (clock, cancel, status) = workflow_parts();
    let config = WorkflowConfig {
        cancel_on_timeout: true,
        ..fast_config()
    };
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, config);

    let outcome = workflow.execute(&plan(4, 2.0, true));
    match outcome {
        WorkflowOutcome::EntryTimeout { entry, canceled } => {
            assert!(canceled);
            assert_eq!(
                broker.get_order(&entry.id).unwrap().status,
                OrderStatus::Canceled
            );
        }
        other => panic!("expected EntryTimeout, got {:?}", other),
    }
}

#[test]
fn partial_fill_is_reported_and_survives_into_timeout() {
    let broker = PaperBroker::new(10_000.0)
        .with_never_fill()
        .with_partial_fill(2, 1);
    let (clock, cancel, status) = workflow_parts();
    let config = WorkflowConfig {
        poll_attempts: 4,
        ..fast_config()
    };
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, config);

    // never_fill keeps polls from filling, but the partial still registers.
    let outcome = workflow.execute(&plan(4, 2.0, true));
    match &outcome {
        WorkflowOutcome::EntryTimeout { entry, .. } => {
            assert_eq!(entry.status, OrderStatus::PartiallyFilled);
            assert_eq!(entry.filled_quantity, 1);
        }
        other => panic!("expected EntryTimeout, got {:?}", other),
    }
    assert!(status.contains("partial fill 1/4"));
    assert!(outcome.describe().contains("1/4"));
}

#[test]
fn existing_open_order_short_circuits() {
    let broker = PaperBroker::new(10_000.0).with_never_fill();
    broker
        .submit_order(&OrderRequest::limit(
            CONTRACT,
            OrderSide::Buy,
            1,
            1.0,
            TimeInForce::Day,
        ))
        .unwrap();

    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));
    assert_eq!(
        outcome,
        WorkflowOutcome::AlreadyPending {
            symbol: CONTRACT.to_string()
        }
    );
    assert_eq!(broker.order_log().len(), 1, "nothing new was submitted");
    assert!(status.contains("already has a pending order"));
}

#[test]
fn rejected_entry_is_terminal() {
    let broker = PaperBroker::new(10_000.0).with_rejections();
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));
    match outcome {
        WorkflowOutcome::EntryRejected { entry } => {
            assert_eq!(entry.status, OrderStatus::Rejected);
        }
        other => panic!("expected EntryRejected, got {:?}", other),
    }
    assert_eq!(clock.sleep_count(), 0, "no polling after a rejection");
}

#[test]
fn broker_failure_during_precheck_fails_without_an_entry() {
    let broker = PaperBroker::new(10_000.0);
    broker.fail_next_call("venue unavailable");
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));
    match outcome {
        WorkflowOutcome::Failed {
            stage,
            reason,
            entry,
        } => {
            assert_eq!(stage, WorkflowStage::Precheck);
            assert!(reason.contains("venue unavailable"));
            assert!(entry.is_none());
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(broker.order_log().is_empty());
}

#[test]
fn rejected_hedge_reports_live_unhedged_position() {
    let broker = PaperBroker::new(10_000.0)
        .with_fill_after_polls(1)
        .with_sell_rejections();
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));
    match &outcome {
        WorkflowOutcome::Failed {
            stage,
            entry: Some(entry),
            ..
        } => {
            assert_eq!(*stage, WorkflowStage::ExitSubmit);
            assert_eq!(entry.filled_quantity, 4);
        }
        other => panic!("expected Failed with a filled entry, got {:?}", other),
    }
    assert!(outcome.describe().contains("un-hedged"));
}

#[test]
fn cancellation_stops_polling_and_leaves_entry_working() {
    let broker = PaperBroker::new(10_000.0).with_fill_after_polls(5);
    let (clock, _, status) = workflow_parts();
    let cancel = CancelAfter::checks(2);
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, true));
    assert_eq!(
        outcome,
        WorkflowOutcome::Cancelled {
            stage: WorkflowStage::FillPoll
        }
    );
    assert_eq!(broker.order_log().len(), 1, "no exit order after cancel");
    let open = broker.list_open_orders(Some(CONTRACT)).unwrap();
    assert_eq!(open.len(), 1, "entry order stays live at the broker");
    assert!(status.contains("cancel requested"));
}

#[test]
fn plain_mode_submits_without_polling() {
    let broker = PaperBroker::new(10_000.0).with_never_fill();
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, false));
    match outcome {
        WorkflowOutcome::EntryPending { entry } => {
            assert_eq!(entry.status, OrderStatus::Accepted);
        }
        other => panic!("expected EntryPending, got {:?}", other),
    }
    assert_eq!(clock.sleep_count(), 0);
    assert_eq!(broker.order_log().len(), 1);
}

#[test]
fn plain_mode_reports_an_instant_fill() {
    let broker = PaperBroker::new(10_000.0).with_fill_after_polls(0);
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(4, 2.0, false));
    match outcome {
        WorkflowOutcome::EntryFilled { entry } => {
            assert_eq!(entry.status, OrderStatus::Filled);
        }
        other => panic!("expected EntryFilled, got {:?}", other),
    }
    assert_eq!(broker.order_log().len(), 1, "plain mode never hedges");
}

#[test]
fn single_contract_fill_cannot_be_hedged() {
    let broker = PaperBroker::new(10_000.0).with_fill_after_polls(1);
    let (clock, cancel, status) = workflow_parts();
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, fast_config());

    let outcome = workflow.execute(&plan(1, 2.0, true));
    match outcome {
        WorkflowOutcome::EntryFilled { entry } => {
            assert_eq!(entry.filled_quantity, 1);
        }
        other => panic!("expected EntryFilled, got {:?}", other),
    }
    assert_eq!(broker.order_log().len(), 1);
    assert!(status.contains("too small to hedge"));
}
