//! Kline (OHLCV) source port trait.

use crate::domain::error::SigtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;

pub trait KlinePort {
    /// Bars for `symbol` on `timeframe`, oldest first.
    fn fetch_klines(&self, symbol: &str, timeframe: Timeframe)
        -> Result<Vec<OhlcvBar>, SigtraderError>;

    /// Timeframes this source can serve.
    fn timeframes(&self) -> Vec<Timeframe>;
}
