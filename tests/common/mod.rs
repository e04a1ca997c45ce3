#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sigtrader::domain::error::SigtraderError;
pub use sigtrader::domain::ohlcv::OhlcvBar;
use sigtrader::domain::snapshot::{IndicatorSnapshot, TimeframeIndicators};
use sigtrader::domain::strategy::Strategy;
use sigtrader::domain::timeframe::Timeframe;
use sigtrader::ports::kline_port::KlinePort;
use std::collections::{BTreeMap, HashMap};

pub struct MockKlinePort {
    pub data: BTreeMap<Timeframe, Vec<OhlcvBar>>,
    pub errors: HashMap<Timeframe, String>,
}

impl MockKlinePort {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, tf: Timeframe, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(tf, bars);
        self
    }

    pub fn with_error(mut self, tf: Timeframe, reason: &str) -> Self {
        self.data.entry(tf).or_default();
        self.errors.insert(tf, reason.to_string());
        self
    }
}

impl KlinePort for MockKlinePort {
    fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<OhlcvBar>, SigtraderError> {
        if let Some(reason) = self.errors.get(&timeframe) {
            return Err(SigtraderError::SnapshotParse {
                source_name: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(&timeframe).cloned().unwrap_or_default())
    }

    fn timeframes(&self) -> Vec<Timeframe> {
        self.data.keys().copied().collect()
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 10, 10, 0, 0).unwrap()
}

/// Trending long on the primary timeframe: ADX 30, EMA9 > EMA21, RSI 60,
/// volume 130% of average, ATR above its average.
pub fn trending_long() -> TimeframeIndicators {
    TimeframeIndicators {
        bar_time: now(),
        close: 97_000.0,
        ema: BTreeMap::from([(9, 97_100.0), (21, 96_800.0)]),
        adx: 30.0,
        rsi: 60.0,
        atr: 400.0,
        atr_avg: 350.0,
        volume: 1_300.0,
        volume_avg: 1_000.0,
        range_high: Some(97_200.0),
        range_low: Some(95_500.0),
    }
}

pub fn trending_short() -> TimeframeIndicators {
    TimeframeIndicators {
        ema: BTreeMap::from([(9, 96_800.0), (21, 97_100.0)]),
        rsi: 40.0,
        ..trending_long()
    }
}

pub fn with_rsi(mut values: TimeframeIndicators, rsi: f64) -> TimeframeIndicators {
    values.rsi = rsi;
    values
}

pub fn single_tf_strategy() -> Strategy {
    Strategy {
        name: "Test".into(),
        version: "test-1".into(),
        priority_timeframes: vec![Timeframe::M15],
        ..Strategy::default()
    }
}

pub fn two_tf_strategy() -> Strategy {
    Strategy {
        priority_timeframes: vec![Timeframe::M15, Timeframe::H1],
        ..single_tf_strategy()
    }
}

pub fn snapshot(values: TimeframeIndicators) -> IndicatorSnapshot {
    IndicatorSnapshot::new("BTCUSDT", now()).with_timeframe(Timeframe::M15, values)
}

/// Steady uptrend with a volume spike on the final bar.
pub fn generate_uptrend(tf: Timeframe, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let step = tf.duration();
    let start = now() - step * count as i32;
    (0..count)
        .map(|i| {
            let base = start_price * (1.0 + 0.002 * i as f64);
            OhlcvBar {
                open_time: start + step * i as i32,
                open: base * 0.999,
                high: base * 1.003,
                low: base * 0.997,
                close: base * 1.001,
                volume: if i + 1 == count { 2_500.0 } else { 1_000.0 },
            }
        })
        .collect()
}

pub fn klines_csv(bars: &[OhlcvBar]) -> String {
    let mut out = String::from("open_time,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.open_time.timestamp_millis(),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
