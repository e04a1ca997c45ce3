//! Strategy configuration: entry conditions, filters, exit rules, and risk limits.
//!
//! A `Strategy` is immutable once loaded. Free-text fields (`description`) are
//! only echoed to human-facing output and never drive control flow.

use crate::domain::error::SigtraderError;
use crate::domain::timeframe::Timeframe;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryConditions {
    pub ema_fast: usize,
    pub ema_slow: usize,
    /// Current volume over its trailing average, e.g. 1.2 for 120%.
    pub volume_surge_ratio: f64,
    pub require_breakout: bool,
    /// Bars used for the breakout range when building snapshots from klines.
    pub breakout_lookback: usize,
    /// Half-width of the entry range, in ATRs.
    pub entry_band_atr: f64,
}

impl Default for EntryConditions {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_slow: 21,
            volume_surge_ratio: 1.2,
            require_breakout: false,
            breakout_lookback: 20,
            entry_band_atr: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterThresholds {
    pub adx_trend_min: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_neutral_low: f64,
    pub rsi_neutral_high: f64,
    /// ATR over its trailing average below this marks low volatility.
    pub atr_low_vol_ratio: f64,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            adx_trend_min: 25.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_neutral_low: 45.0,
            rsi_neutral_high: 55.0,
            atr_low_vol_ratio: 0.8,
        }
    }
}

impl FilterThresholds {
    /// True when `rsi` lies strictly inside the neutral band.
    pub fn rsi_is_neutral(&self, rsi: f64) -> bool {
        rsi > self.rsi_neutral_low && rsi < self.rsi_neutral_high
    }
}

/// Inclusive reward:risk range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrRange {
    pub min: f64,
    pub max: f64,
}

impl RrRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rr: f64) -> bool {
        rr >= self.min - 1e-9 && rr <= self.max + 1e-9
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRules {
    pub stop_loss_atr_mult: f64,
    pub rr_high_vol: RrRange,
    pub rr_low_vol: RrRange,
    pub min_rr: f64,
    /// Reward:risk for reduced-confidence counter-trend entries; exempt from `min_rr`.
    pub counter_trend_rr: f64,
    /// Fraction of the position closed at the first take-profit.
    pub partial_exit_fraction: f64,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            stop_loss_atr_mult: 1.5,
            rr_high_vol: RrRange::new(2.0, 3.0),
            rr_low_vol: RrRange::new(1.5, 2.0),
            min_rr: 1.5,
            counter_trend_rr: 1.0,
            partial_exit_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskLimits {
    pub max_daily_losses: u32,
    pub risk_per_trade_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub min_leverage: u32,
    pub max_leverage: u32,
    pub max_trades_per_day: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_losses: 3,
            risk_per_trade_pct: 1.0,
            daily_loss_limit_pct: 3.0,
            min_leverage: 3,
            max_leverage: 10,
            max_trades_per_day: 5,
        }
    }
}

/// Thresholds below which the feedback log flags the strategy for review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewThresholds {
    pub min_trades: usize,
    pub min_win_rate: f64,
    pub min_profit_factor: f64,
    pub min_achieved_rr: f64,
}

impl Default for ReviewThresholds {
    fn default() -> Self {
        Self {
            min_trades: 20,
            min_win_rate: 0.4,
            min_profit_factor: 1.2,
            min_achieved_rr: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub version: String,
    pub description: String,
    /// First entry is the primary timeframe. All entries are required.
    pub priority_timeframes: Vec<Timeframe>,
    pub max_stale_bars: u32,
    pub entry: EntryConditions,
    pub default_filters: FilterThresholds,
    pub timeframe_filters: BTreeMap<Timeframe, FilterThresholds>,
    pub exit: ExitRules,
    pub risk: RiskLimits,
    pub review: ReviewThresholds,
}

impl Strategy {
    pub fn primary_timeframe(&self) -> Option<Timeframe> {
        self.priority_timeframes.first().copied()
    }

    /// Filters for `tf`, falling back to the strategy-wide defaults.
    pub fn filters_for(&self, tf: Timeframe) -> &FilterThresholds {
        self.timeframe_filters
            .get(&tf)
            .unwrap_or(&self.default_filters)
    }

    /// Cross-field consistency checks; run once at load time.
    pub fn validate(&self) -> Result<(), SigtraderError> {
        if self.priority_timeframes.is_empty() {
            return Err(SigtraderError::invalid(
                "strategy",
                "priority_timeframes",
                "at least one timeframe is required",
            ));
        }
        if self.max_stale_bars == 0 {
            return Err(SigtraderError::invalid(
                "strategy",
                "max_stale_bars",
                "max_stale_bars must be at least 1",
            ));
        }

        self.validate_entry()?;
        self.validate_filters("filters", &self.default_filters)?;
        for (tf, filters) in &self.timeframe_filters {
            self.validate_filters(&format!("filters.{}", tf), filters)?;
        }
        self.validate_exit()?;
        self.validate_risk()?;
        Ok(())
    }

    fn validate_entry(&self) -> Result<(), SigtraderError> {
        let e = &self.entry;
        if e.ema_fast == 0 || e.ema_fast >= e.ema_slow {
            return Err(SigtraderError::invalid(
                "entry",
                "ema_fast",
                "ema_fast must be positive and shorter than ema_slow",
            ));
        }
        if e.volume_surge_ratio <= 0.0 {
            return Err(SigtraderError::invalid(
                "entry",
                "volume_surge_ratio",
                "volume_surge_ratio must be positive",
            ));
        }
        if e.breakout_lookback == 0 {
            return Err(SigtraderError::invalid(
                "entry",
                "breakout_lookback",
                "breakout_lookback must be at least 1",
            ));
        }
        if e.entry_band_atr < 0.0 {
            return Err(SigtraderError::invalid(
                "entry",
                "entry_band_atr",
                "entry_band_atr must be non-negative",
            ));
        }
        Ok(())
    }

    fn validate_filters(
        &self,
        section: &str,
        f: &FilterThresholds,
    ) -> Result<(), SigtraderError> {
        if f.adx_trend_min <= 0.0 || f.adx_trend_min > 100.0 {
            return Err(SigtraderError::invalid(
                section,
                "adx_trend_min",
                "adx_trend_min must be between 0 and 100",
            ));
        }
        if !(0.0..=100.0).contains(&f.rsi_oversold)
            || !(0.0..=100.0).contains(&f.rsi_overbought)
            || f.rsi_oversold >= f.rsi_overbought
        {
            return Err(SigtraderError::invalid(
                section,
                "rsi_overbought",
                "rsi_oversold must be below rsi_overbought, both within 0-100",
            ));
        }
        if f.rsi_neutral_low > f.rsi_neutral_high
            || f.rsi_neutral_low < f.rsi_oversold
            || f.rsi_neutral_high > f.rsi_overbought
        {
            return Err(SigtraderError::invalid(
                section,
                "rsi_neutral_low",
                "neutral band must be ordered and lie between oversold and overbought",
            ));
        }
        if f.atr_low_vol_ratio <= 0.0 {
            return Err(SigtraderError::invalid(
                section,
                "atr_low_vol_ratio",
                "atr_low_vol_ratio must be positive",
            ));
        }
        Ok(())
    }

    fn validate_exit(&self) -> Result<(), SigtraderError> {
        let x = &self.exit;
        if x.stop_loss_atr_mult <= 0.0 {
            return Err(SigtraderError::invalid(
                "exit",
                "stop_loss_atr_mult",
                "stop_loss_atr_mult must be positive",
            ));
        }
        if x.min_rr <= 0.0 {
            return Err(SigtraderError::invalid(
                "exit",
                "min_rr",
                "min_rr must be positive",
            ));
        }
        for (key, range) in [("rr_high_vol", x.rr_high_vol), ("rr_low_vol", x.rr_low_vol)] {
            if range.min > range.max {
                return Err(SigtraderError::invalid(
                    "exit",
                    &format!("{}_min", key),
                    format!("{}_min must not exceed {}_max", key, key),
                ));
            }
            if range.min < x.min_rr {
                return Err(SigtraderError::invalid(
                    "exit",
                    &format!("{}_min", key),
                    format!("{}_min must be at least min_rr ({})", key, x.min_rr),
                ));
            }
        }
        if x.counter_trend_rr <= 0.0 {
            return Err(SigtraderError::invalid(
                "exit",
                "counter_trend_rr",
                "counter_trend_rr must be positive",
            ));
        }
        if x.partial_exit_fraction <= 0.0 || x.partial_exit_fraction > 1.0 {
            return Err(SigtraderError::invalid(
                "exit",
                "partial_exit_fraction",
                "partial_exit_fraction must be between 0 and 1",
            ));
        }
        Ok(())
    }

    fn validate_risk(&self) -> Result<(), SigtraderError> {
        let r = &self.risk;
        if r.min_leverage < 1 {
            return Err(SigtraderError::invalid(
                "risk",
                "min_leverage",
                "min_leverage must be at least 1",
            ));
        }
        if r.max_leverage < r.min_leverage {
            return Err(SigtraderError::invalid(
                "risk",
                "max_leverage",
                "max_leverage must not be below min_leverage",
            ));
        }
        if r.risk_per_trade_pct <= 0.0 || r.risk_per_trade_pct > 100.0 {
            return Err(SigtraderError::invalid(
                "risk",
                "risk_per_trade_pct",
                "risk_per_trade_pct must be between 0 and 100",
            ));
        }
        if r.daily_loss_limit_pct <= 0.0 || r.daily_loss_limit_pct > 100.0 {
            return Err(SigtraderError::invalid(
                "risk",
                "daily_loss_limit_pct",
                "daily_loss_limit_pct must be between 0 and 100",
            ));
        }
        if r.max_daily_losses == 0 {
            return Err(SigtraderError::invalid(
                "risk",
                "max_daily_losses",
                "max_daily_losses must be at least 1",
            ));
        }
        if r.max_trades_per_day == 0 {
            return Err(SigtraderError::invalid(
                "risk",
                "max_trades_per_day",
                "max_trades_per_day must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            name: "Unnamed".into(),
            version: "0".into(),
            description: String::new(),
            priority_timeframes: vec![Timeframe::M15, Timeframe::H1],
            max_stale_bars: 2,
            entry: EntryConditions::default(),
            default_filters: FilterThresholds::default(),
            timeframe_filters: BTreeMap::new(),
            exit: ExitRules::default(),
            risk: RiskLimits::default(),
            review: ReviewThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_key(err: SigtraderError) -> String {
        match err {
            SigtraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn default_strategy_is_valid() {
        assert!(Strategy::default().validate().is_ok());
    }

    #[test]
    fn primary_timeframe_is_first() {
        let s = Strategy::default();
        assert_eq!(s.primary_timeframe(), Some(Timeframe::M15));
    }

    #[test]
    fn filters_fall_back_to_defaults() {
        let mut s = Strategy::default();
        let mut five = FilterThresholds::default();
        five.adx_trend_min = 20.0;
        s.timeframe_filters.insert(Timeframe::M5, five);

        assert_eq!(s.filters_for(Timeframe::M5).adx_trend_min, 20.0);
        assert_eq!(s.filters_for(Timeframe::H1).adx_trend_min, 25.0);
    }

    #[test]
    fn neutral_band_is_exclusive() {
        let f = FilterThresholds::default();
        assert!(f.rsi_is_neutral(50.0));
        assert!(!f.rsi_is_neutral(45.0));
        assert!(!f.rsi_is_neutral(55.0));
    }

    #[test]
    fn max_leverage_below_min_rejected() {
        let mut s = Strategy::default();
        s.risk.min_leverage = 5;
        s.risk.max_leverage = 3;
        assert_eq!(invalid_key(s.validate().unwrap_err()), "max_leverage");
    }

    #[test]
    fn zero_min_leverage_rejected() {
        let mut s = Strategy::default();
        s.risk.min_leverage = 0;
        assert_eq!(invalid_key(s.validate().unwrap_err()), "min_leverage");
    }

    #[test]
    fn empty_timeframes_rejected() {
        let mut s = Strategy::default();
        s.priority_timeframes.clear();
        assert_eq!(
            invalid_key(s.validate().unwrap_err()),
            "priority_timeframes"
        );
    }

    #[test]
    fn ema_fast_must_be_shorter() {
        let mut s = Strategy::default();
        s.entry.ema_fast = 21;
        assert_eq!(invalid_key(s.validate().unwrap_err()), "ema_fast");
    }

    #[test]
    fn rr_range_below_min_rr_rejected() {
        let mut s = Strategy::default();
        s.exit.rr_low_vol = RrRange::new(1.0, 2.0);
        assert_eq!(invalid_key(s.validate().unwrap_err()), "rr_low_vol_min");
    }

    #[test]
    fn inverted_rr_range_rejected() {
        let mut s = Strategy::default();
        s.exit.rr_high_vol = RrRange::new(3.0, 2.0);
        assert_eq!(invalid_key(s.validate().unwrap_err()), "rr_high_vol_min");
    }

    #[test]
    fn neutral_band_outside_momentum_bounds_rejected() {
        let mut s = Strategy::default();
        s.default_filters.rsi_neutral_high = 75.0;
        assert_eq!(invalid_key(s.validate().unwrap_err()), "rsi_neutral_low");
    }

    #[test]
    fn per_timeframe_filters_validated() {
        let mut s = Strategy::default();
        let mut bad = FilterThresholds::default();
        bad.atr_low_vol_ratio = 0.0;
        s.timeframe_filters.insert(Timeframe::H4, bad);
        match s.validate().unwrap_err() {
            SigtraderError::ConfigInvalid { section, key, .. } => {
                assert_eq!(section, "filters.4h");
                assert_eq!(key, "atr_low_vol_ratio");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_exit_fraction_bounds() {
        let mut s = Strategy::default();
        s.exit.partial_exit_fraction = 1.5;
        assert_eq!(
            invalid_key(s.validate().unwrap_err()),
            "partial_exit_fraction"
        );
    }

    #[test]
    fn rr_range_contains_is_inclusive() {
        let r = RrRange::new(2.0, 3.0);
        assert!(r.contains(2.0));
        assert!(r.contains(3.0));
        assert!(!r.contains(3.5));
    }
}
