//! Simple moving averages over bar volume or over another indicator series.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use chrono::{DateTime, Utc};

fn rolling_mean(points: &[(DateTime<Utc>, Option<f64>)], period: usize) -> Vec<IndicatorPoint> {
    points
        .iter()
        .enumerate()
        .map(|(i, &(time, _))| {
            if period == 0 || i + 1 < period {
                return IndicatorPoint::invalid(time);
            }
            let window = &points[i + 1 - period..=i];
            let sum: Option<f64> = window.iter().map(|(_, v)| *v).sum();
            match sum {
                Some(s) => IndicatorPoint::valid(time, s / period as f64),
                None => IndicatorPoint::invalid(time),
            }
        })
        .collect()
}

/// Trailing average volume, e.g. the 20-bar volume MA.
pub fn calculate_volume_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let points: Vec<_> = bars.iter().map(|b| (b.open_time, Some(b.volume))).collect();
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(&points, period),
    }
}

/// Trailing average of another series; windows touching warmup are invalid.
pub fn calculate_series_sma(series: &IndicatorSeries, period: usize) -> IndicatorSeries {
    let points: Vec<_> = series
        .values
        .iter()
        .map(|p| (p.time, p.valid.then_some(p.value)))
        .collect();
    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values: rolling_mean(&points, period),
    }
}
