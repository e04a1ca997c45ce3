//! Indicator snapshots: computed values for one symbol at one point in time.

use crate::domain::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Indicator values for a single timeframe, taken at the close of `bar_time`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeframeIndicators {
    pub bar_time: DateTime<Utc>,
    pub close: f64,
    /// EMA values keyed by period.
    pub ema: BTreeMap<usize, f64>,
    pub adx: f64,
    pub rsi: f64,
    pub atr: f64,
    /// Trailing average of ATR.
    pub atr_avg: f64,
    pub volume: f64,
    /// Trailing average of volume.
    pub volume_avg: f64,
    pub range_high: Option<f64>,
    pub range_low: Option<f64>,
}

impl TimeframeIndicators {
    pub fn ema(&self, period: usize) -> Option<f64> {
        self.ema.get(&period).copied().filter(|v| v.is_finite())
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        ratio(self.volume, self.volume_avg)
    }

    pub fn atr_ratio(&self) -> Option<f64> {
        ratio(self.atr, self.atr_avg)
    }

    /// Returns the name of the first required value that is absent or unusable.
    pub fn first_missing(&self, ema_periods: &[usize]) -> Option<String> {
        for &p in ema_periods {
            if self.ema(p).is_none() {
                return Some(format!("EMA({})", p));
            }
        }
        let checks = [
            ("close", self.close > 0.0 && self.close.is_finite()),
            ("ADX", self.adx.is_finite() && self.adx >= 0.0),
            ("RSI", self.rsi.is_finite() && (0.0..=100.0).contains(&self.rsi)),
            ("ATR", self.atr.is_finite() && self.atr > 0.0),
            ("ATR average", self.atr_avg.is_finite() && self.atr_avg > 0.0),
            ("volume", self.volume.is_finite() && self.volume >= 0.0),
            (
                "volume average",
                self.volume_avg.is_finite() && self.volume_avg > 0.0,
            ),
        ];
        checks
            .iter()
            .find(|(_, ok)| !ok)
            .map(|(name, _)| name.to_string())
    }
}

fn ratio(value: f64, average: f64) -> Option<f64> {
    if average > 0.0 && value.is_finite() && average.is_finite() {
        Some(value / average)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub timeframes: BTreeMap<Timeframe, TimeframeIndicators>,
}

impl IndicatorSnapshot {
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            timeframes: BTreeMap::new(),
        }
    }

    pub fn with_timeframe(mut self, tf: Timeframe, values: TimeframeIndicators) -> Self {
        self.timeframes.insert(tf, values);
        self
    }

    pub fn get(&self, tf: Timeframe) -> Option<&TimeframeIndicators> {
        self.timeframes.get(&tf)
    }

    /// True when `tf`'s bar is more than `max_bars` bars older than the snapshot.
    /// Bars stamped after the snapshot are treated as stale too.
    pub fn is_stale(&self, tf: Timeframe, max_bars: u32) -> bool {
        match self.timeframes.get(&tf) {
            None => true,
            Some(values) => {
                let age = self.timestamp - values.bar_time;
                age < chrono::Duration::zero() || age > tf.duration() * max_bars as i32
            }
        }
    }
}
