//! Technical indicator series and the latest-bar snapshot.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: a single point in an indicator time series
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values
//! - `IndicatorSnapshot`: the latest bar's indicator set, consumed by the
//!   signal classifier

pub mod sma;
pub mod rsi;

use crate::domain::bar::PriceBar;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at index `i`, or `None` during warmup / out of range.
    pub fn value_at(&self, i: usize) -> Option<f64> {
        self.values
            .get(i)
            .and_then(|p| if p.valid { Some(p.value) } else { None })
    }

    /// Value at the last index, if valid.
    pub fn latest(&self) -> Option<f64> {
        self.values
            .last()
            .and_then(|p| if p.valid { Some(p.value) } else { None })
    }
}

/// Window configuration for the standard snapshot set.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub sma_short: usize,
    pub sma_mid: usize,
    pub sma_long: usize,
    pub rsi_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            sma_short: 20,
            sma_mid: 50,
            sma_long: 200,
            rsi_period: 14,
        }
    }
}

/// Indicator values attached to the latest bar of a series.
///
/// Fields are `None` where the series is too short for the window. The
/// snapshot never looks past the last bar.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub date: NaiveDate,
    pub close: f64,
    pub sma_short: Option<f64>,
    pub sma_mid: Option<f64>,
    pub sma_long: Option<f64>,
    pub rsi: Option<f64>,
}

/// Compute the latest-bar snapshot, or `None` when fewer than
/// `rsi_period + 1` bars exist ("cannot evaluate", not an error).
pub fn compute_snapshot(bars: &[PriceBar], config: &IndicatorConfig) -> Option<IndicatorSnapshot> {
    let last = bars.last()?;
    if bars.len() < config.rsi_period + 1 {
        return None;
    }

    Some(IndicatorSnapshot {
        date: last.date,
        close: last.close,
        sma_short: sma::calculate_sma(bars, config.sma_short).latest(),
        sma_mid: sma::calculate_sma(bars, config.sma_mid).latest(),
        sma_long: sma::calculate_sma(bars, config.sma_long).latest(),
        rsi: rsi::calculate_rsi(bars, config.rsi_period).latest(),
    })
}
