//! Technical indicator series computed from klines.
//!
//! - `IndicatorPoint`: one value aligned to a bar, flagged invalid during warmup
//! - `IndicatorType`: indicator identity + parameters
//! - `IndicatorSeries`: a time series of indicator values, one point per bar

pub mod adx;
pub mod atr;
pub mod ema;
pub mod rsi;
pub mod sma;

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub time: DateTime<Utc>,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub(crate) fn invalid(time: DateTime<Utc>) -> Self {
        Self {
            time,
            valid: false,
            value: 0.0,
        }
    }

    pub(crate) fn valid(time: DateTime<Utc>, value: f64) -> Self {
        Self {
            time,
            valid: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Adx(usize),
    /// Simple average of another series or of volume.
    Sma(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at the last bar, if past warmup.
    pub fn last_valid(&self) -> Option<f64> {
        self.values
            .last()
            .filter(|p| p.valid && p.value.is_finite())
            .map(|p| p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Adx(period) => write!(f, "ADX({})", period),
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
        }
    }
}
