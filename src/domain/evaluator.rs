//! Rule evaluation: turns an indicator snapshot into exactly one recommendation.
//!
//! # Evaluation order
//!
//! 1. Data gate: every priority timeframe must be present, complete, and fresh
//! 2. Momentum neutrality: RSI strictly inside the neutral band
//! 3. Trend filter: ADX against `adx_trend_min`
//! 4. Direction: fast EMA against slow EMA
//! 5. Momentum exhaustion: long into overbought, short into oversold
//! 6. Volatility filter: ATR against its trailing average
//! 7. Triggers: volume surge, then price breakout
//!
//! Any failed gate yields HOLD. Auxiliary timeframes only adjust the proposed
//! leverage and the rationale; they never change the position.

use crate::domain::recommendation::{
    Confidence, Position, PriceRange, TakeProfitLevel, TradeRecommendation,
};
use crate::domain::snapshot::{IndicatorSnapshot, TimeframeIndicators};
use crate::domain::strategy::{RrRange, Strategy};
use crate::domain::timeframe::Timeframe;
use tracing::debug;

/// Intermediate filter readings for the primary timeframe.
#[derive(Debug, Clone, Copy)]
struct Readings {
    direction: Position,
    trending: bool,
    low_volatility: bool,
    volume_ratio: f64,
    breakout: bool,
}

pub fn evaluate(strategy: &Strategy, snapshot: &IndicatorSnapshot) -> TradeRecommendation {
    let hold = |reason: String| {
        debug!(symbol = %snapshot.symbol, %reason, "hold");
        TradeRecommendation::hold(
            &snapshot.symbol,
            snapshot.timestamp,
            &strategy.version,
            vec![reason],
        )
    };

    let primary_tf = match strategy.primary_timeframe() {
        Some(tf) => tf,
        None => return hold("no priority timeframe configured".into()),
    };

    if let Err(reason) = check_data(strategy, snapshot) {
        return hold(reason);
    }

    // check_data guarantees presence
    let primary = match snapshot.get(primary_tf) {
        Some(v) => v,
        None => return hold(format!("missing data for {}", primary_tf)),
    };
    let filters = strategy.filters_for(primary_tf);

    if filters.rsi_is_neutral(primary.rsi) {
        return hold(format!(
            "RSI {:.1} on {} inside neutral band {:.0}-{:.0}",
            primary.rsi, primary_tf, filters.rsi_neutral_low, filters.rsi_neutral_high
        ));
    }

    let readings = match read_filters(strategy, primary_tf, primary) {
        Ok(r) => r,
        Err(reason) => return hold(reason),
    };

    let mut rationale = Vec::new();
    rationale.push(format!(
        "{}: ADX {:.1} ({}), RSI {:.1}, EMA{} {} EMA{}",
        primary_tf,
        primary.adx,
        if readings.trending { "trending" } else { "ranging" },
        primary.rsi,
        strategy.entry.ema_fast,
        if readings.direction == Position::Long { ">" } else { "<" },
        strategy.entry.ema_slow,
    ));
    rationale.push(format!(
        "volume {:.0}% of average, volatility {}",
        readings.volume_ratio * 100.0,
        if readings.low_volatility { "low" } else { "elevated" }
    ));

    let confidence = if readings.trending {
        Confidence::Standard
    } else if readings.breakout {
        rationale.push("ranging market breakout: counter-trend entry".into());
        Confidence::Reduced
    } else {
        return hold(format!(
            "ADX {:.1} on {} below {:.0} without breakout",
            primary.adx, primary_tf, filters.adx_trend_min
        ));
    };

    let (agreeing, auxiliary) = count_agreement(strategy, snapshot, readings.direction);
    if auxiliary > 0 {
        rationale.push(format!(
            "timeframe agreement {}/{}",
            agreeing, auxiliary
        ));
    }

    let leverage = propose_leverage(strategy, confidence, agreeing, auxiliary);
    let rec = build_levels(
        strategy,
        snapshot,
        primary,
        &readings,
        confidence,
        leverage,
        rationale,
    );
    debug!(
        symbol = %snapshot.symbol,
        position = %rec.position,
        leverage = rec.leverage,
        "recommendation"
    );
    rec
}

/// Every priority timeframe must be present, fresh, and fully populated.
fn check_data(strategy: &Strategy, snapshot: &IndicatorSnapshot) -> Result<(), String> {
    let periods = [strategy.entry.ema_fast, strategy.entry.ema_slow];
    for &tf in &strategy.priority_timeframes {
        let values = snapshot
            .get(tf)
            .ok_or_else(|| format!("missing data for {}", tf))?;
        if snapshot.is_stale(tf, strategy.max_stale_bars) {
            return Err(format!(
                "stale data for {}: bar {} vs snapshot {}",
                tf,
                values.bar_time.to_rfc3339(),
                snapshot.timestamp.to_rfc3339()
            ));
        }
        if let Some(name) = values.first_missing(&periods) {
            return Err(format!("missing {} for {}", name, tf));
        }
    }
    Ok(())
}

fn read_filters(
    strategy: &Strategy,
    tf: Timeframe,
    values: &TimeframeIndicators,
) -> Result<Readings, String> {
    let filters = strategy.filters_for(tf);
    let entry = &strategy.entry;

    let fast = values.ema(entry.ema_fast).unwrap_or(f64::NAN);
    let slow = values.ema(entry.ema_slow).unwrap_or(f64::NAN);
    let direction = if fast > slow {
        Position::Long
    } else if fast < slow {
        Position::Short
    } else {
        return Err(format!("EMA{} equals EMA{} on {}", entry.ema_fast, entry.ema_slow, tf));
    };

    if direction == Position::Long && values.rsi >= filters.rsi_overbought {
        return Err(format!(
            "long trend but RSI {:.1} overbought (>= {:.0})",
            values.rsi, filters.rsi_overbought
        ));
    }
    if direction == Position::Short && values.rsi <= filters.rsi_oversold {
        return Err(format!(
            "short trend but RSI {:.1} oversold (<= {:.0})",
            values.rsi, filters.rsi_oversold
        ));
    }

    let trending = values.adx >= filters.adx_trend_min;
    let atr_ratio = values.atr_ratio().unwrap_or(0.0);
    let low_volatility = atr_ratio < filters.atr_low_vol_ratio;
    debug!(%tf, trending, atr_ratio, low_volatility, "trend and volatility filters");

    if !trending && low_volatility {
        return Err(format!(
            "ranging (ADX {:.1}) with low volatility (ATR {:.0}% of average)",
            values.adx,
            atr_ratio * 100.0
        ));
    }

    let volume_ratio = values.volume_ratio().unwrap_or(0.0);
    if volume_ratio < entry.volume_surge_ratio {
        return Err(format!(
            "volume {:.0}% of average below surge threshold {:.0}%",
            volume_ratio * 100.0,
            entry.volume_surge_ratio * 100.0
        ));
    }

    let breakout = match direction {
        Position::Long => values.range_high.is_some_and(|h| values.close > h),
        Position::Short => values.range_low.is_some_and(|l| values.close < l),
        Position::Hold => false,
    };
    if entry.require_breakout && !breakout {
        return Err(format!("no {} breakout on {}", direction, tf));
    }

    Ok(Readings {
        direction,
        trending,
        low_volatility,
        volume_ratio,
        breakout,
    })
}

/// Counts auxiliary priority timeframes whose EMA direction matches `direction`.
fn count_agreement(
    strategy: &Strategy,
    snapshot: &IndicatorSnapshot,
    direction: Position,
) -> (usize, usize) {
    let mut agreeing = 0;
    let mut total = 0;
    for &tf in strategy.priority_timeframes.iter().skip(1) {
        let Some(values) = snapshot.get(tf) else {
            continue;
        };
        total += 1;
        let fast = values.ema(strategy.entry.ema_fast);
        let slow = values.ema(strategy.entry.ema_slow);
        let agrees = match (fast, slow, direction) {
            (Some(f), Some(s), Position::Long) => f > s,
            (Some(f), Some(s), Position::Short) => f < s,
            _ => false,
        };
        if agrees {
            agreeing += 1;
        }
    }
    (agreeing, total)
}

/// Minimum leverage scaled toward the maximum by auxiliary agreement.
fn propose_leverage(
    strategy: &Strategy,
    confidence: Confidence,
    agreeing: usize,
    auxiliary: usize,
) -> u32 {
    let risk = &strategy.risk;
    if confidence == Confidence::Reduced {
        return risk.min_leverage;
    }
    let agreement = if auxiliary == 0 {
        1.0
    } else {
        agreeing as f64 / auxiliary as f64
    };
    let span = risk.max_leverage.saturating_sub(risk.min_leverage) as f64;
    risk.min_leverage + (span * agreement).floor() as u32
}

fn build_levels(
    strategy: &Strategy,
    snapshot: &IndicatorSnapshot,
    values: &TimeframeIndicators,
    readings: &Readings,
    confidence: Confidence,
    leverage: u32,
    mut rationale: Vec<String>,
) -> TradeRecommendation {
    let exit = &strategy.exit;
    let sign = readings.direction.sign();
    let price = values.close;
    let band = values.atr * strategy.entry.entry_band_atr;
    let stop_distance = values.atr * exit.stop_loss_atr_mult;
    let stop_loss = price - sign * stop_distance;

    // a trend takes the wide targets; a ranging breakout scalps the counter-trend
    // target first and lets the rest run to the low-volatility target
    let range = match confidence {
        Confidence::Standard => exit.rr_high_vol,
        Confidence::Reduced => RrRange {
            min: exit.counter_trend_rr,
            max: exit.rr_low_vol.min.max(exit.counter_trend_rr),
        },
    };
    let take_profits = staged_targets(price, sign, stop_distance, range, exit.partial_exit_fraction);

    // risk fraction of balance over the stop fraction gives notional; divide by leverage for margin
    let stop_fraction = stop_distance / price;
    let size_fraction = if leverage > 0 {
        (strategy.risk.risk_per_trade_pct / 100.0 / stop_fraction / leverage as f64).min(1.0)
    } else {
        0.0
    };

    rationale.push(format!(
        "stop {:.1} ATR ({:.2}%), targets at R:R {}",
        exit.stop_loss_atr_mult,
        stop_fraction * 100.0,
        take_profits
            .iter()
            .map(|tp| format!("{:.1}", tp.rr))
            .collect::<Vec<_>>()
            .join("/")
    ));

    TradeRecommendation {
        symbol: snapshot.symbol.clone(),
        timestamp: snapshot.timestamp,
        strategy_version: strategy.version.clone(),
        position: readings.direction,
        entry: Some(PriceRange {
            low: price - band,
            high: price + band,
        }),
        stop_loss: Some(stop_loss),
        take_profits,
        leverage,
        size_fraction,
        confidence,
        rationale,
    }
}

/// First target closes `partial` of the position at the low end of the range,
/// the remainder runs to the high end.
fn staged_targets(
    price: f64,
    sign: f64,
    stop_distance: f64,
    range: RrRange,
    partial: f64,
) -> Vec<TakeProfitLevel> {
    let level = |rr: f64, fraction: f64| TakeProfitLevel {
        price: price + sign * stop_distance * rr,
        rr,
        fraction,
    };
    if (range.max - range.min).abs() < 1e-9 || partial >= 1.0 {
        vec![level(range.min, 1.0)]
    } else {
        vec![level(range.min, partial), level(range.max, 1.0 - partial)]
    }
}
