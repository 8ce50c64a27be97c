//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: the first n bars are invalid (n price changes are needed to seed
//! the averages).

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};

/// Incremental Wilder RSI accumulator.
///
/// Feeding closes one at a time yields exactly the values of
/// [`calculate_rsi`] over the same series, so a growing series never needs a
/// full recompute.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    prev_close: Option<f64>,
    changes_seen: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl WilderRsi {
    pub fn new(period: usize) -> Self {
        WilderRsi {
            period,
            prev_close: None,
            changes_seen: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        }
    }

    /// Feed the next close. Returns `None` until the seed window is full.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        let prev = match self.prev_close.replace(close) {
            Some(p) => p,
            None => return None,
        };
        if self.period == 0 {
            return None;
        }

        let change = close - prev;
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        self.changes_seen += 1;

        if self.changes_seen < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            None
        } else if self.changes_seen == self.period {
            self.avg_gain = (self.gain_sum + gain) / self.period as f64;
            self.avg_loss = (self.loss_sum + loss) / self.period as f64;
            Some(self.rsi())
        } else {
            let n = self.period as f64;
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
            Some(self.rsi())
        }
    }
}

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut acc = WilderRsi::new(period);
    let values = bars
        .iter()
        .map(|bar| match acc.push(bar.close) {
            Some(rsi) => IndicatorPoint {
                date: bar.date,
                valid: true,
                value: rsi,
            },
            None => IndicatorPoint {
                date: bar.date,
                valid: false,
                value: 0.0,
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
