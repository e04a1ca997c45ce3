//! Average Directional Index (Wilder).
//!
//! +DM = high - prev_high when it exceeds prev_low - low and is positive, else 0;
//! -DM mirrors it. TR, +DM and -DM are Wilder-smoothed over n bars, giving
//! +DI/-DI and DX = 100 * |+DI - -DI| / (+DI + -DI). ADX is the mean of the
//! first n DX values, then (prev * (n-1) + DX) / n.
//!
//! Warmup: the first DX lands on bar n, the first ADX on bar 2n - 1.

use crate::domain::indicator::atr::true_ranges;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

fn directional_movement(bars: &[OhlcvBar], i: usize) -> (f64, f64) {
    let up = bars[i].high - bars[i - 1].high;
    let down = bars[i - 1].low - bars[i].low;
    let plus = if up > down && up > 0.0 { up } else { 0.0 };
    let minus = if down > up && down > 0.0 { down } else { 0.0 };
    (plus, minus)
}

fn dx(tr: f64, plus_dm: f64, minus_dm: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * plus_dm / tr;
    let minus_di = 100.0 * minus_dm / tr;
    let sum = plus_di + minus_di;
    if sum == 0.0 {
        0.0
    } else {
        100.0 * (plus_di - minus_di).abs() / sum
    }
}

pub fn calculate_adx(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Adx(period);
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type,
            values: vec![],
        };
    }

    let n = period as f64;
    let tr = true_ranges(bars);
    let mut values: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    values.push(IndicatorPoint::invalid(bars[0].open_time));

    let (mut tr_s, mut plus_s, mut minus_s) = (0.0, 0.0, 0.0);
    let mut dx_sum = 0.0;
    let mut adx = 0.0;

    for i in 1..bars.len() {
        let (plus, minus) = directional_movement(bars, i);

        if i <= period {
            tr_s += tr[i];
            plus_s += plus;
            minus_s += minus;
        } else {
            tr_s = tr_s - tr_s / n + tr[i];
            plus_s = plus_s - plus_s / n + plus;
            minus_s = minus_s - minus_s / n + minus;
        }

        if i < period {
            values.push(IndicatorPoint::invalid(bars[i].open_time));
            continue;
        }

        let current_dx = dx(tr_s, plus_s, minus_s);
        let dx_index = i - period; // 0-based count of DX values so far

        if dx_index < period - 1 {
            dx_sum += current_dx;
            values.push(IndicatorPoint::invalid(bars[i].open_time));
        } else if dx_index == period - 1 {
            adx = (dx_sum + current_dx) / n;
            values.push(IndicatorPoint::valid(bars[i].open_time, adx));
        } else {
            adx = (adx * (n - 1.0) + current_dx) / n;
            values.push(IndicatorPoint::valid(bars[i].open_time, adx));
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
