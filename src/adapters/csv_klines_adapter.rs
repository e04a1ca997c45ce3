//! CSV kline adapter.
//!
//! One file per timeframe with a header row naming at least
//! `open_time,open,high,low,close,volume`. Extra columns (Binance dumps carry
//! `close_time`, `quote_volume`, ...) are ignored. `open_time` is RFC 3339 or
//! epoch milliseconds.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::kline_port::KlinePort;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const COLUMNS: [&str; 6] = ["open_time", "open", "high", "low", "close", "volume"];

/// Parses an RFC 3339 timestamp or integer epoch milliseconds.
pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| format!("epoch milliseconds out of range: {}", ms));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}

pub struct CsvKlinesAdapter {
    files: BTreeMap<Timeframe, PathBuf>,
}

impl CsvKlinesAdapter {
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, timeframe: Timeframe, path: impl Into<PathBuf>) -> Self {
        self.files.insert(timeframe, path.into());
        self
    }

    /// Parses kline CSV text; `source_name` only labels errors.
    pub fn parse(content: &str, source_name: &str) -> Result<Vec<OhlcvBar>, SigtraderError> {
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

        let mut idx = [0usize; 6];
        for (slot, name) in idx.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| err(format!("missing {} column", name)))?;
        }

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| err(format!("CSV parse error: {}", e)))?;
            let field = |i: usize| {
                record
                    .get(idx[i])
                    .ok_or_else(|| err(format!("row {}: missing {} value", line + 1, COLUMNS[i])))
            };
            let number = |i: usize| -> Result<f64, SigtraderError> {
                let raw = field(i)?;
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        err(format!("row {}: invalid {} value '{}'", line + 1, COLUMNS[i], raw))
                    })
            };

            let open_time =
                parse_time(field(0)?).map_err(|e| err(format!("row {}: {}", line + 1, e)))?;
            let bar = OhlcvBar {
                open_time,
                open: number(1)?,
                high: number(2)?,
                low: number(3)?,
                close: number(4)?,
                volume: number(5)?,
            };
            if bar.high < bar.low {
                return Err(err(format!("row {}: high below low", line + 1)));
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.open_time);
        // a re-downloaded bar replaces the earlier copy
        bars.reverse();
        bars.dedup_by_key(|b| b.open_time);
        bars.reverse();
        Ok(bars)
    }

    pub fn read_file(path: &Path) -> Result<Vec<OhlcvBar>, SigtraderError> {
        let content = fs::read_to_string(path)?;
        let bars = Self::parse(&content, &path.display().to_string())?;
        debug!(path = %path.display(), bars = bars.len(), "loaded klines");
        Ok(bars)
    }
}

impl Default for CsvKlinesAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl KlinePort for CsvKlinesAdapter {
    fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<OhlcvBar>, SigtraderError> {
        let path = self
            .files
            .get(&timeframe)
            .ok_or_else(|| SigtraderError::SnapshotParse {
                source_name: symbol.to_string(),
                reason: format!("no kline file for {}", timeframe),
            })?;
        Self::read_file(path)
    }

    fn timeframes(&self) -> Vec<Timeframe> {
        self.files.keys().copied().collect()
    }
}
