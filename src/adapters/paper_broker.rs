//! In-memory paper broker.
//!
//! Deterministic stand-in for a live brokerage: limit buys fill after a
//! configurable number of status polls, sells rest on the book, and fills
//! update positions and cash. Doubles as the test double for the workflow
//! and autopilot engines and as the CLI's execution venue (real exchange
//! connectivity is out of scope).

use crate::domain::error::OptionPilotError;
use crate::domain::order::{
    AccountSnapshot, BrokerPosition, Order, OrderRequest, OrderSide, OrderStatus, OrderType,
};
use crate::ports::broker_port::BrokerPort;
use std::cell::RefCell;
use std::collections::HashMap;

struct Inner {
    orders: Vec<Order>,
    polls: HashMap<String, u32>,
    positions: Vec<BrokerPosition>,
    cash: f64,
    next_id: u64,
    fail_next: Option<String>,
}

pub struct PaperBroker {
    inner: RefCell<Inner>,
    /// Limit buys fill on this status poll (0 = filled at submission).
    fill_after_polls: u32,
    /// Leave buy orders working forever (timeout scenarios).
    never_fill: bool,
    /// Report this partial quantity on the given poll before the fill.
    partial_fill: Option<(u32, i64)>,
    /// Reject every submission.
    reject_submissions: bool,
    /// Reject sell submissions only (hedge-failure scenarios).
    reject_sells: bool,
    /// Marks for filling market orders.
    marks: HashMap<String, f64>,
}

impl PaperBroker {
    pub fn new(cash: f64) -> Self {
        PaperBroker {
            inner: RefCell::new(Inner {
                orders: Vec::new(),
                polls: HashMap::new(),
                positions: Vec::new(),
                cash,
                next_id: 1,
                fail_next: None,
            }),
            fill_after_polls: 1,
            never_fill: false,
            partial_fill: None,
            reject_submissions: false,
            reject_sells: false,
            marks: HashMap::new(),
        }
    }

    pub fn with_fill_after_polls(mut self, polls: u32) -> Self {
        self.fill_after_polls = polls;
        self
    }

    pub fn with_never_fill(mut self) -> Self {
        self.never_fill = true;
        self
    }

    pub fn with_partial_fill(mut self, poll: u32, quantity: i64) -> Self {
        self.partial_fill = Some((poll, quantity));
        self
    }

    pub fn with_rejections(mut self) -> Self {
        self.reject_submissions = true;
        self
    }

    pub fn with_sell_rejections(mut self) -> Self {
        self.reject_sells = true;
        self
    }

    pub fn with_mark(mut self, symbol: &str, price: f64) -> Self {
        self.marks.insert(symbol.to_string(), price);
        self
    }

    pub fn with_position(self, symbol: &str, quantity: i64, avg_entry_price: f64) -> Self {
        let current_price = self.marks.get(symbol).copied().unwrap_or(avg_entry_price);
        self.inner.borrow_mut().positions.push(BrokerPosition {
            symbol: symbol.to_string(),
            quantity,
            avg_entry_price,
            current_price,
            unrealized_pnl: (current_price - avg_entry_price) * quantity as f64,
        });
        self
    }

    /// Make the next broker call fail with the given message.
    pub fn fail_next_call(&self, reason: &str) {
        self.inner.borrow_mut().fail_next = Some(reason.to_string());
    }

    /// All orders ever submitted, in submission sequence.
    pub fn order_log(&self) -> Vec<Order> {
        self.inner.borrow().orders.clone()
    }

    fn take_failure(&self) -> Option<OptionPilotError> {
        self.inner
            .borrow_mut()
            .fail_next
            .take()
            .map(|reason| OptionPilotError::Broker { reason })
    }

    fn apply_fill(inner: &mut Inner, index: usize, price: f64) {
        let order = &mut inner.orders[index];
        order.status = OrderStatus::Filled;
        order.filled_quantity = order.quantity;
        order.filled_avg_price = Some(price);
        let signed_qty = match order.side {
            OrderSide::Buy => order.quantity,
            OrderSide::Sell => -order.quantity,
        };
        inner.cash -= signed_qty as f64 * price;

        let symbol = order.symbol.clone();
        match inner.positions.iter_mut().find(|p| p.symbol == symbol) {
            Some(position) => {
                let new_qty = position.quantity + signed_qty;
                if signed_qty > 0 && new_qty != 0 {
                    position.avg_entry_price = (position.avg_entry_price
                        * position.quantity as f64
                        + price * signed_qty as f64)
                        / new_qty as f64;
                }
                position.quantity = new_qty;
                position.current_price = price;
                position.unrealized_pnl =
                    (price - position.avg_entry_price) * position.quantity as f64;
                if position.quantity == 0 {
                    inner.positions.retain(|p| p.symbol != symbol);
                }
            }
            None => {
                if signed_qty > 0 {
                    inner.positions.push(BrokerPosition {
                        symbol,
                        quantity: signed_qty,
                        avg_entry_price: price,
                        current_price: price,
                        unrealized_pnl: 0.0,
                    });
                }
            }
        }
    }
}

impl BrokerPort for PaperBroker {
    fn submit_order(&self, request: &OrderRequest) -> Result<Order, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let mut inner = self.inner.borrow_mut();
        let id = format!("PB-{}", inner.next_id);
        inner.next_id += 1;

        let status = if self.reject_submissions
            || (self.reject_sells && request.side == OrderSide::Sell)
        {
            OrderStatus::Rejected
        } else {
            OrderStatus::Accepted
        };
        let order = Order {
            id: id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            order_type: request.order_type,
            limit_price: request.limit_price,
            time_in_force: request.time_in_force,
            status,
            filled_quantity: 0,
            filled_avg_price: None,
        };
        inner.orders.push(order);
        let index = inner.orders.len() - 1;

        if status == OrderStatus::Accepted {
            // Market orders fill at the configured mark immediately; a limit
            // buy fills here only with a zero-poll schedule.
            let fill_now = match request.order_type {
                OrderType::Market => self.marks.get(&request.symbol).copied(),
                OrderType::Limit => {
                    if request.side == OrderSide::Buy
                        && !self.never_fill
                        && self.fill_after_polls == 0
                    {
                        request.limit_price
                    } else {
                        None
                    }
                }
            };
            if let Some(price) = fill_now {
                Self::apply_fill(&mut inner, index, price);
            }
        }

        Ok(inner.orders[index].clone())
    }

    fn get_order(&self, id: &str) -> Result<Order, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let mut inner = self.inner.borrow_mut();
        let index = inner
            .orders
            .iter()
            .position(|o| o.id == id)
            .ok_or_else(|| OptionPilotError::Broker {
                reason: format!("unknown order id {}", id),
            })?;

        let order = inner.orders[index].clone();
        if order.status.is_open() && order.side == OrderSide::Buy {
            let polls = inner.polls.entry(id.to_string()).or_insert(0);
            *polls += 1;
            let polls = *polls;

            if !self.never_fill && polls >= self.fill_after_polls {
                let price = order
                    .limit_price
                    .or_else(|| self.marks.get(&order.symbol).copied());
                if let Some(price) = price {
                    Self::apply_fill(&mut inner, index, price);
                }
            } else if let Some((at_poll, quantity)) = self.partial_fill {
                if polls == at_poll {
                    let order = &mut inner.orders[index];
                    order.status = OrderStatus::PartiallyFilled;
                    order.filled_quantity = quantity;
                    order.filled_avg_price = order.limit_price;
                }
            }
        }

        Ok(inner.orders[index].clone())
    }

    fn cancel_order(&self, id: &str) -> Result<bool, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let mut inner = self.inner.borrow_mut();
        match inner.orders.iter_mut().find(|o| o.id == id) {
            Some(order) if order.status.is_open() => {
                order.status = OrderStatus::Canceled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_open_orders(&self, symbol: Option<&str>) -> Result<Vec<Order>, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let inner = self.inner.borrow();
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.status.is_open())
            .filter(|o| symbol.is_none_or(|s| o.symbol == s))
            .cloned()
            .collect())
    }

    fn list_positions(&self) -> Result<Vec<BrokerPosition>, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.inner.borrow().positions.clone())
    }

    fn get_account(&self) -> Result<AccountSnapshot, OptionPilotError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let inner = self.inner.borrow();
        let position_value: f64 = inner
            .positions
            .iter()
            .map(|p| p.current_price * p.quantity as f64)
            .sum();
        let equity = inner.cash + position_value;
        Ok(AccountSnapshot {
            equity,
            cash: inner.cash,
            buying_power: inner.cash,
            last_equity: equity,
        })
    }
}
