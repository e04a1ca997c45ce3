//! Builds per-timeframe indicator values from klines.
//!
//! Mirrors the indicator set of the BTC futures report: EMA fast/slow, ATR,
//! RSI, ADX, and a trailing volume average, all taken at the last bar.

use crate::domain::error::SigtraderError;
use crate::domain::indicator::adx::calculate_adx;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::{calculate_series_sma, calculate_volume_sma};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::snapshot::{IndicatorSnapshot, TimeframeIndicators};
use crate::domain::strategy::EntryConditions;
use crate::domain::timeframe::Timeframe;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Lookback periods for indicators the strategy does not parameterize itself.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPeriods {
    pub rsi: usize,
    pub atr: usize,
    pub adx: usize,
    pub atr_avg: usize,
    pub volume_avg: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: 14,
            atr: 14,
            adx: 14,
            atr_avg: 20,
            volume_avg: 20,
        }
    }
}

impl IndicatorPeriods {
    /// Bars needed before every indicator is past warmup.
    pub fn min_bars(&self, entry: &EntryConditions) -> usize {
        [
            entry.ema_slow,
            entry.ema_fast,
            self.rsi + 1,
            self.atr + self.atr_avg - 1,
            2 * self.adx,
            self.volume_avg,
            entry.breakout_lookback + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }
}

fn last(series: &IndicatorSeries, tf: Timeframe, bars: usize, minimum: usize) -> Result<f64, SigtraderError> {
    series
        .last_valid()
        .ok_or_else(|| SigtraderError::InsufficientData {
            timeframe: tf.to_string(),
            bars,
            minimum,
        })
}

/// Indicator values at the last bar of `bars` (oldest first).
pub fn build_timeframe(
    tf: Timeframe,
    bars: &[OhlcvBar],
    entry: &EntryConditions,
    periods: &IndicatorPeriods,
) -> Result<TimeframeIndicators, SigtraderError> {
    let minimum = periods.min_bars(entry);
    let Some(last_bar) = bars.last().filter(|_| bars.len() >= minimum) else {
        return Err(SigtraderError::InsufficientData {
            timeframe: tf.to_string(),
            bars: bars.len(),
            minimum,
        });
    };
    let n = bars.len();

    let mut ema = BTreeMap::new();
    for period in [entry.ema_fast, entry.ema_slow] {
        ema.insert(period, last(&calculate_ema(bars, period), tf, n, minimum)?);
    }

    let atr_series = calculate_atr(bars, periods.atr);
    let atr = last(&atr_series, tf, n, minimum)?;
    let atr_avg = last(&calculate_series_sma(&atr_series, periods.atr_avg), tf, n, minimum)?;
    let rsi = last(&calculate_rsi(bars, periods.rsi), tf, n, minimum)?;
    let adx = last(&calculate_adx(bars, periods.adx), tf, n, minimum)?;
    let volume_avg = last(&calculate_volume_sma(bars, periods.volume_avg), tf, n, minimum)?;

    // range of the bars before the last one, so the last close can break out of it
    let window = &bars[n - 1 - entry.breakout_lookback..n - 1];
    let range_high = window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let range_low = window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    debug!(%tf, bars = n, close = last_bar.close, adx, rsi, atr, "built timeframe indicators");

    Ok(TimeframeIndicators {
        bar_time: last_bar.open_time + tf.duration(),
        close: last_bar.close,
        ema,
        adx,
        rsi,
        atr,
        atr_avg,
        volume: last_bar.volume,
        volume_avg,
        range_high: Some(range_high),
        range_low: Some(range_low),
    })
}

/// Snapshot over several timeframes, stamped at the latest bar close.
///
/// A timeframe without enough history is left out of the snapshot; the
/// evaluator holds on it only when it is a priority timeframe.
pub fn build_snapshot(
    symbol: &str,
    klines: &BTreeMap<Timeframe, Vec<OhlcvBar>>,
    entry: &EntryConditions,
    periods: &IndicatorPeriods,
) -> Result<IndicatorSnapshot, SigtraderError> {
    let timestamp = klines
        .iter()
        .filter_map(|(tf, bars)| bars.last().map(|b| b.open_time + tf.duration()))
        .max()
        .ok_or_else(|| SigtraderError::SnapshotParse {
            source_name: symbol.to_string(),
            reason: "no klines supplied".into(),
        })?;

    let mut timeframes = BTreeMap::new();
    for (&tf, bars) in klines {
        match build_timeframe(tf, bars, entry, periods) {
            Ok(values) => {
                timeframes.insert(tf, values);
            }
            Err(SigtraderError::InsufficientData { bars, minimum, .. }) => {
                warn!(%tf, bars, minimum, "not enough klines, timeframe left out of snapshot");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(IndicatorSnapshot {
        symbol: symbol.to_string(),
        timestamp,
        timeframes,
    })
}
