//! Strategy document validation.
//!
//! Field-level checks run before the strategy is built: required keys exist
//! and every present value parses as its expected type. Cross-field
//! consistency lives in `Strategy::validate`.

use crate::domain::error::SigtraderError;
use crate::domain::timeframe::{parse_timeframes, Timeframe};
use crate::ports::config_port::ConfigPort;

const FILTER_KEYS: [&str; 6] = [
    "adx_trend_min",
    "rsi_overbought",
    "rsi_oversold",
    "rsi_neutral_low",
    "rsi_neutral_high",
    "atr_low_vol_ratio",
];

const FLOAT_KEYS: [(&str, &str); 15] = [
    ("entry", "volume_surge_ratio"),
    ("entry", "entry_band_atr"),
    ("exit", "stop_loss_atr_mult"),
    ("exit", "rr_high_vol_min"),
    ("exit", "rr_high_vol_max"),
    ("exit", "rr_low_vol_min"),
    ("exit", "rr_low_vol_max"),
    ("exit", "min_rr"),
    ("exit", "counter_trend_rr"),
    ("exit", "partial_exit_fraction"),
    ("risk", "risk_per_trade_pct"),
    ("risk", "daily_loss_limit_pct"),
    ("review", "min_win_rate"),
    ("review", "min_profit_factor"),
    ("review", "min_achieved_rr"),
];

const COUNT_KEYS: [(&str, &str); 14] = [
    ("strategy", "max_stale_bars"),
    ("entry", "ema_fast"),
    ("entry", "ema_slow"),
    ("entry", "breakout_lookback"),
    ("risk", "max_daily_losses"),
    ("risk", "min_leverage"),
    ("risk", "max_leverage"),
    ("risk", "max_trades_per_day"),
    ("review", "min_trades"),
    ("indicators", "rsi"),
    ("indicators", "atr"),
    ("indicators", "adx"),
    ("indicators", "atr_avg"),
    ("indicators", "volume_avg"),
];

const BOOL_KEYS: [(&str, &str); 1] = [("entry", "require_breakout")];

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    validate_identity(config)?;
    validate_timeframes(config)?;
    for (section, key) in FLOAT_KEYS {
        validate_float(config, section, key)?;
    }
    for (section, key) in COUNT_KEYS {
        validate_count(config, section, key)?;
    }
    for (section, key) in BOOL_KEYS {
        validate_bool(config, section, key)?;
    }
    for key in FILTER_KEYS {
        validate_float(config, "filters", key)?;
    }
    for tf in Timeframe::ALL {
        let section = format!("filters.{}", tf);
        if config.has_section(&section) {
            for key in FILTER_KEYS {
                validate_float(config, &section, key)?;
            }
        }
    }
    Ok(())
}

fn validate_identity(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    match config.get_string("strategy", "version") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(SigtraderError::ConfigMissing {
            section: "strategy".to_string(),
            key: "version".to_string(),
        }),
    }
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<(), SigtraderError> {
    let raw = match config.get_string("strategy", "priority_timeframes") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(SigtraderError::ConfigMissing {
                section: "strategy".to_string(),
                key: "priority_timeframes".to_string(),
            })
        }
    };
    parse_timeframes(&raw)
        .map(|_| ())
        .map_err(|reason| SigtraderError::invalid("strategy", "priority_timeframes", reason))
}

fn validate_float(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SigtraderError> {
    if let Some(raw) = config.get_string(section, key) {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {}
            _ => {
                return Err(SigtraderError::invalid(
                    section,
                    key,
                    format!("'{}' is not a number", raw),
                ))
            }
        }
    }
    Ok(())
}

fn validate_count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SigtraderError> {
    if let Some(raw) = config.get_string(section, key) {
        if raw.trim().parse::<u32>().is_err() {
            return Err(SigtraderError::invalid(
                section,
                key,
                format!("'{}' is not a non-negative integer", raw),
            ));
        }
    }
    Ok(())
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SigtraderError> {
    if let Some(raw) = config.get_string(section, key) {
        let ok = matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "1" | "0"
        );
        if !ok {
            return Err(SigtraderError::invalid(
                section,
                key,
                format!("'{}' is not a boolean", raw),
            ));
        }
    }
    Ok(())
}
