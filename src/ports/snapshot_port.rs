//! Indicator snapshot source port trait.

use crate::domain::error::SigtraderError;
use crate::domain::snapshot::IndicatorSnapshot;

pub trait SnapshotPort {
    /// Latest snapshot for `symbol`.
    fn fetch_snapshot(&self, symbol: &str) -> Result<IndicatorSnapshot, SigtraderError>;
}
