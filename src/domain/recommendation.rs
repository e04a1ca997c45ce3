//! Trade recommendations produced by the rule evaluator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Long,
    Short,
    Hold,
}

impl Position {
    /// +1 for long, -1 for short, 0 for hold.
    pub fn sign(self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Short => -1.0,
            Position::Hold => 0.0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Long => f.write_str("LONG"),
            Position::Short => f.write_str("SHORT"),
            Position::Hold => f.write_str("HOLD"),
        }
    }
}

/// Standard entries honor the configured minimum R:R; reduced-confidence
/// (counter-trend) entries are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Standard,
    Reduced,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceRange {
    pub low: f64,
    pub high: f64,
}

impl PriceRange {
    pub fn mid(&self) -> f64 {
        (self.low + self.high) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TakeProfitLevel {
    pub price: f64,
    pub rr: f64,
    /// Fraction of the original position closed at this level.
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecommendation {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub strategy_version: String,
    pub position: Position,
    pub entry: Option<PriceRange>,
    pub stop_loss: Option<f64>,
    pub take_profits: Vec<TakeProfitLevel>,
    pub leverage: u32,
    pub size_fraction: f64,
    pub confidence: Confidence,
    pub rationale: Vec<String>,
}

impl TradeRecommendation {
    pub fn hold(
        symbol: &str,
        timestamp: DateTime<Utc>,
        strategy_version: &str,
        rationale: Vec<String>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp,
            strategy_version: strategy_version.to_string(),
            position: Position::Hold,
            entry: None,
            stop_loss: None,
            take_profits: Vec::new(),
            leverage: 0,
            size_fraction: 0.0,
            confidence: Confidence::Standard,
            rationale,
        }
    }

    /// Stable identifier linking outcomes back to this recommendation.
    pub fn id(&self) -> String {
        format!(
            "{}@{}#{}",
            self.symbol,
            self.timestamp.to_rfc3339(),
            self.strategy_version
        )
    }

    pub fn is_actionable(&self) -> bool {
        self.position != Position::Hold
    }

    pub fn reference_price(&self) -> Option<f64> {
        self.entry.map(|e| e.mid())
    }

    pub fn stop_distance(&self) -> Option<f64> {
        match (self.reference_price(), self.stop_loss) {
            (Some(entry), Some(stop)) => Some((entry - stop).abs()),
            _ => None,
        }
    }

    /// Checks the reward:risk invariant. HOLD and reduced-confidence
    /// recommendations always pass.
    pub fn meets_min_rr(&self, min_rr: f64) -> bool {
        if !self.is_actionable() || self.confidence == Confidence::Reduced {
            return true;
        }
        !self.take_profits.is_empty() && self.take_profits.iter().all(|tp| tp.rr >= min_rr - 1e-9)
    }

    /// A copy carrying final leverage and size; the original is left untouched.
    pub fn with_sizing(&self, leverage: u32, size_fraction: f64) -> Self {
        let mut sized = self.clone();
        sized.leverage = leverage;
        sized.size_fraction = size_fraction;
        sized
    }
}

impl fmt::Display for TradeRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Symbol:      {}", self.symbol)?;
        writeln!(f, "Time:        {}", self.timestamp.to_rfc3339())?;
        writeln!(f, "Strategy:    {}", self.strategy_version)?;
        match self.confidence {
            Confidence::Standard => writeln!(f, "Position:    {}", self.position)?,
            Confidence::Reduced => {
                writeln!(f, "Position:    {} (reduced confidence)", self.position)?
            }
        }
        if self.is_actionable() {
            writeln!(f, "Leverage:    {}x", self.leverage)?;
            writeln!(f, "Size:        {:.1}% of balance", self.size_fraction * 100.0)?;
            if let Some(entry) = self.entry {
                writeln!(f, "Entry:       {:.2} - {:.2}", entry.low, entry.high)?;
            }
            if let Some(stop) = self.stop_loss {
                writeln!(f, "Stop-loss:   {:.2}", stop)?;
            }
            for (i, tp) in self.take_profits.iter().enumerate() {
                writeln!(
                    f,
                    "TP{}:         {:.2} (R:R {:.2}, close {:.0}%)",
                    i + 1,
                    tp.price,
                    tp.rr,
                    tp.fraction * 100.0
                )?;
            }
        }
        writeln!(f, "Rationale:")?;
        for line in &self.rationale {
            writeln!(f, "  - {}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn long_rec() -> TradeRecommendation {
        TradeRecommendation {
            symbol: "BTCUSDT".into(),
            timestamp: Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap(),
            strategy_version: "v1".into(),
            position: Position::Long,
            entry: Some(PriceRange {
                low: 99.0,
                high: 101.0,
            }),
            stop_loss: Some(97.0),
            take_profits: vec![
                TakeProfitLevel {
                    price: 106.0,
                    rr: 2.0,
                    fraction: 0.5,
                },
                TakeProfitLevel {
                    price: 109.0,
                    rr: 3.0,
                    fraction: 0.5,
                },
            ],
            leverage: 5,
            size_fraction: 0.2,
            confidence: Confidence::Standard,
            rationale: vec!["trend".into()],
        }
    }

    #[test]
    fn stop_distance_from_entry_mid() {
        let rec = long_rec();
        assert!((rec.stop_distance().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn hold_has_no_levels() {
        let rec = TradeRecommendation::hold(
            "BTCUSDT",
            Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap(),
            "v1",
            vec!["neutral".into()],
        );
        assert!(!rec.is_actionable());
        assert!(rec.stop_distance().is_none());
        assert!(rec.meets_min_rr(1.5));
    }

    #[test]
    fn min_rr_check() {
        let rec = long_rec();
        assert!(rec.meets_min_rr(2.0));
        assert!(!rec.meets_min_rr(2.5));
    }

    #[test]
    fn reduced_confidence_exempt_from_min_rr() {
        let mut rec = long_rec();
        rec.confidence = Confidence::Reduced;
        rec.take_profits.truncate(1);
        rec.take_profits[0].rr = 1.0;
        assert!(rec.meets_min_rr(1.5));
    }

    #[test]
    fn with_sizing_leaves_original() {
        let rec = long_rec();
        let sized = rec.with_sizing(8, 0.35);
        assert_eq!(rec.leverage, 5);
        assert_eq!(sized.leverage, 8);
        assert!((sized.size_fraction - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn id_is_stable() {
        let rec = long_rec();
        assert_eq!(rec.id(), "BTCUSDT@2025-02-10T09:00:00+00:00#v1");
        assert_eq!(rec.id(), rec.clone().id());
    }

    #[test]
    fn display_lists_levels() {
        let text = long_rec().to_string();
        assert!(text.contains("Position:    LONG"));
        assert!(text.contains("Stop-loss:   97.00"));
        assert!(text.contains("TP2:"));
    }

    #[test]
    fn serializes_position_uppercase() {
        let json = serde_json::to_value(long_rec()).unwrap();
        assert_eq!(json["position"], "LONG");
        assert_eq!(json["confidence"], "standard");
    }
}
