//! Average True Range with Wilder's smoothing.
//!
//! The first bar's true range is high - low. Seed is the mean of the first n
//! true ranges; afterwards ATR = (prev * (n-1) + TR) / n.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub(crate) fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if bars.len() < period || period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Atr(period),
            values: vec![],
        };
    }

    let tr = true_ranges(bars);
    let mut values = Vec::with_capacity(bars.len());
    let mut atr = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i < period - 1 {
            values.push(IndicatorPoint::invalid(bar.open_time));
        } else if i == period - 1 {
            atr = tr[..=i].iter().sum::<f64>() / period as f64;
            values.push(IndicatorPoint::valid(bar.open_time, atr));
        } else {
            atr = (atr * (period - 1) as f64 + tr[i]) / period as f64;
            values.push(IndicatorPoint::valid(bar.open_time, atr));
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::from_hlc;

    #[test]
    fn atr_warmup() {
        let bars = from_hlc(&[(110.0, 90.0, 100.0); 5]);
        let series = calculate_atr(&bars, 3);
        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn atr_seed_is_average() {
        let bars = from_hlc(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
        ]);
        let series = calculate_atr(&bars, 3);
        assert!((series.values[2].value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let bars = from_hlc(&[
            (110.0, 100.0, 105.0),
            (115.0, 105.0, 110.0),
            (120.0, 110.0, 115.0),
            (125.0, 115.0, 120.0),
        ]);
        let series = calculate_atr(&bars, 3);
        let expected = (10.0 * 2.0 + 10.0) / 3.0;
        assert!((series.values[3].value - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_gap_widens_range() {
        let bars = from_hlc(&[
            (110.0, 100.0, 105.0),
            (130.0, 120.0, 125.0),
            (120.0, 110.0, 115.0),
        ]);
        let series = calculate_atr(&bars, 2);
        // TR: 10, 25, 15 → seed 17.5, then (17.5 + 15) / 2
        assert!((series.values[1].value - 17.5).abs() < 1e-9);
        assert!((series.values[2].value - 16.25).abs() < 1e-9);
    }

    #[test]
    fn atr_insufficient_bars() {
        let bars = from_hlc(&[(110.0, 90.0, 100.0); 2]);
        assert!(calculate_atr(&bars, 5).values.is_empty());
    }
}
