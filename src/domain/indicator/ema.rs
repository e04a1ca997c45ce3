//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema: Option<f64> = None;
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i + 1 < period {
                return IndicatorPoint::invalid(bar.open_time);
            }
            let next = match ema {
                None => bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64,
                Some(prev) => bar.close * k + prev * (1.0 - k),
            };
            ema = Some(next);
            IndicatorPoint::valid(bar.open_time, next)
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
