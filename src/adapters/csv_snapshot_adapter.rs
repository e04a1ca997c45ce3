//! CSV indicator snapshot adapter.
//!
//! One row per timeframe:
//!
//! ```text
//! timeframe,bar_time,close,ema_9,ema_21,adx,rsi,atr,atr_avg,volume,volume_avg,range_high,range_low
//! 15m,2025-02-10T10:00:00Z,97000,97100,96800,30,60,400,350,1300,1000,96900,95500
//! ```
//!
//! Any number of `ema_<period>` columns may appear. `range_high` and
//! `range_low` are optional and may be left empty. An optional `symbol`
//! column restricts rows to the requested symbol. A blank indicator cell is
//! read as a missing value, which the evaluator turns into a HOLD.

use crate::adapters::csv_klines_adapter::parse_time;
use crate::domain::error::SigtraderError;
use crate::domain::snapshot::{IndicatorSnapshot, TimeframeIndicators};
use crate::domain::timeframe::Timeframe;
use crate::ports::snapshot_port::SnapshotPort;
use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

const REQUIRED: [&str; 10] = [
    "timeframe",
    "bar_time",
    "close",
    "adx",
    "rsi",
    "atr",
    "atr_avg",
    "volume",
    "volume_avg",
    "ema_*",
];

pub struct CsvSnapshotAdapter {
    path: PathBuf,
    as_of: Option<DateTime<Utc>>,
}

struct Columns {
    named: BTreeMap<String, usize>,
    ema: Vec<(usize, usize)>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, String> {
        let mut named = BTreeMap::new();
        let mut ema = Vec::new();
        for (i, h) in headers.iter().enumerate() {
            let h = h.to_lowercase();
            if let Some(period) = h.strip_prefix("ema_") {
                let period = period
                    .parse::<usize>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| format!("bad EMA column '{}'", h))?;
                ema.push((period, i));
            } else {
                named.insert(h, i);
            }
        }
        for name in REQUIRED {
            let present = if name == "ema_*" {
                !ema.is_empty()
            } else {
                named.contains_key(name)
            };
            if !present {
                return Err(format!("missing {} column", name));
            }
        }
        Ok(Self { named, ema })
    }

    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.named
            .get(name)
            .and_then(|&i| record.get(i))
            .filter(|s| !s.is_empty())
    }
}

impl CsvSnapshotAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            as_of: None,
        }
    }

    /// Evaluation time for staleness checks; defaults to the latest bar time.
    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn parse(
        content: &str,
        source_name: &str,
        symbol: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<IndicatorSnapshot, SigtraderError> {
        let err = |reason: String| SigtraderError::SnapshotParse {
            source_name: source_name.to_string(),
            reason,
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| err(format!("CSV header error: {}", e)))?
            .clone();
        let cols = Columns::from_headers(&headers).map_err(err)?;

        let mut timeframes = BTreeMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| err(format!("CSV parse error: {}", e)))?;
            let row = line + 1;

            if let Some(sym) = cols.get(&record, "symbol") {
                if !sym.eq_ignore_ascii_case(symbol) {
                    continue;
                }
            }

            let text = |name: &str| {
                cols.get(&record, name)
                    .ok_or_else(|| err(format!("row {}: missing {}", row, name)))
            };
            let number = |raw: &str, name: &str| {
                raw.parse::<f64>()
                    .map_err(|_| err(format!("row {}: invalid {} value '{}'", row, name, raw)))
            };
            let indicator = |name: &str| {
                cols.get(&record, name)
                    .map_or(Ok(f64::NAN), |raw| number(raw, name))
            };
            let optional = |name: &str| {
                cols.get(&record, name)
                    .map(|raw| number(raw, name))
                    .transpose()
            };

            let tf: Timeframe = text("timeframe")?
                .parse()
                .map_err(|e: String| err(format!("row {}: {}", row, e)))?;
            let bar_time =
                parse_time(text("bar_time")?).map_err(|e| err(format!("row {}: {}", row, e)))?;

            let mut ema = BTreeMap::new();
            for &(period, i) in &cols.ema {
                let name = format!("ema_{}", period);
                if let Some(raw) = record.get(i).filter(|s| !s.is_empty()) {
                    ema.insert(period, number(raw, &name)?);
                }
            }

            let values = TimeframeIndicators {
                bar_time,
                close: indicator("close")?,
                ema,
                adx: indicator("adx")?,
                rsi: indicator("rsi")?,
                atr: indicator("atr")?,
                atr_avg: indicator("atr_avg")?,
                volume: indicator("volume")?,
                volume_avg: indicator("volume_avg")?,
                range_high: optional("range_high")?,
                range_low: optional("range_low")?,
            };

            if timeframes.insert(tf, values).is_some() {
                return Err(err(format!("row {}: duplicate timeframe {}", row, tf)));
            }
        }

        let latest = timeframes.values().map(|v| v.bar_time).max();
        let timestamp = as_of
            .or(latest)
            .ok_or_else(|| err(format!("no rows for {}", symbol)))?;

        Ok(IndicatorSnapshot {
            symbol: symbol.to_string(),
            timestamp,
            timeframes,
        })
    }
}

impl SnapshotPort for CsvSnapshotAdapter {
    fn fetch_snapshot(&self, symbol: &str) -> Result<IndicatorSnapshot, SigtraderError> {
        let content = fs::read_to_string(&self.path)?;
        let snapshot = Self::parse(
            &content,
            &self.path.display().to_string(),
            symbol,
            self.as_of,
        )?;
        debug!(
            path = %self.path.display(),
            symbol,
            timeframes = snapshot.timeframes.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}
