//! Append-only feedback log of recommendations and realized outcomes.
//!
//! The log never changes a strategy. `review` only reports which thresholds
//! were missed; acting on them is an explicit external step.

use crate::domain::error::SigtraderError;
use crate::domain::recommendation::TradeRecommendation;
use crate::domain::strategy::ReviewThresholds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeOutcome {
    pub recommendation_id: String,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Execution slippage against the recommended entry, in price units.
    pub slippage: f64,
    pub pnl: f64,
    pub closed_at: DateTime<Utc>,
}

impl TradeOutcome {
    /// Realized move in units of the planned stop distance (R multiple).
    pub fn r_multiple(&self, rec: &TradeRecommendation) -> Option<f64> {
        let risk = rec.stop_distance().filter(|d| *d > 0.0)?;
        Some((self.exit_price - self.entry_price) * rec.position.sign() / risk)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub recommendation: TradeRecommendation,
    pub outcome: TradeOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Window {
    All,
    /// The most recent `n` entries.
    Last(usize),
    /// Entries closed at or after the given time.
    Since(DateTime<Utc>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSummary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    pub win_rate: f64,
    /// Average win over average loss.
    pub achieved_rr: f64,
    pub avg_r_multiple: f64,
    pub profit_factor: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewFlag {
    TooFewTrades { trades: usize, minimum: usize },
    LowWinRate { win_rate: f64, minimum: f64 },
    LowProfitFactor { profit_factor: f64, minimum: f64 },
    LowAchievedRr { achieved_rr: f64, minimum: f64 },
}

impl fmt::Display for ReviewFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewFlag::TooFewTrades { trades, minimum } => {
                write!(f, "only {} trades in window (need {})", trades, minimum)
            }
            ReviewFlag::LowWinRate { win_rate, minimum } => write!(
                f,
                "win rate {:.1}% below {:.1}%",
                win_rate * 100.0,
                minimum * 100.0
            ),
            ReviewFlag::LowProfitFactor {
                profit_factor,
                minimum,
            } => write!(f, "profit factor {:.2} below {:.2}", profit_factor, minimum),
            ReviewFlag::LowAchievedRr {
                achieved_rr,
                minimum,
            } => write!(f, "achieved R:R {:.2} below {:.2}", achieved_rr, minimum),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackLog {
    entries: Vec<FeedbackEntry>,
}

impl FeedbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FeedbackEntry] {
        &self.entries
    }

    pub fn append(
        &mut self,
        recommendation: TradeRecommendation,
        outcome: TradeOutcome,
    ) -> Result<(), SigtraderError> {
        if !recommendation.is_actionable() {
            return Err(SigtraderError::FeedbackRejected {
                reason: "HOLD recommendations have no outcome".into(),
            });
        }
        let id = recommendation.id();
        if outcome.recommendation_id != id {
            return Err(SigtraderError::FeedbackRejected {
                reason: format!(
                    "outcome references {} but recommendation is {}",
                    outcome.recommendation_id, id
                ),
            });
        }
        if !outcome.pnl.is_finite() {
            return Err(SigtraderError::FeedbackRejected {
                reason: "outcome pnl is not finite".into(),
            });
        }
        self.entries.push(FeedbackEntry {
            recommendation,
            outcome,
        });
        Ok(())
    }

    fn window(&self, window: Window) -> Vec<&FeedbackEntry> {
        match window {
            Window::All => self.entries.iter().collect(),
            Window::Last(n) => {
                let start = self.entries.len().saturating_sub(n);
                self.entries[start..].iter().collect()
            }
            Window::Since(t) => self
                .entries
                .iter()
                .filter(|e| e.outcome.closed_at >= t)
                .collect(),
        }
    }

    pub fn summary(&self, window: Window) -> FeedbackSummary {
        let entries = self.window(window);

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut r_sum = 0.0_f64;
        let mut r_count = 0usize;

        for entry in &entries {
            let pnl = entry.outcome.pnl;
            if pnl > 0.0 {
                wins += 1;
                total_wins += pnl;
            } else if pnl < 0.0 {
                losses += 1;
                total_losses += pnl.abs();
            } else {
                breakeven += 1;
            }
            if let Some(r) = entry.outcome.r_multiple(&entry.recommendation) {
                r_sum += r;
                r_count += 1;
            }
        }

        let trades = entries.len();
        let win_rate = if trades > 0 {
            wins as f64 / trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if wins > 0 {
            total_wins / wins as f64
        } else {
            0.0
        };
        let avg_loss = if losses > 0 {
            total_losses / losses as f64
        } else {
            0.0
        };
        let achieved_rr = if avg_loss > 0.0 {
            avg_win / avg_loss
        } else if avg_win > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_r_multiple = if r_count > 0 {
            r_sum / r_count as f64
        } else {
            0.0
        };

        FeedbackSummary {
            trades,
            wins,
            losses,
            breakeven,
            win_rate,
            achieved_rr,
            avg_r_multiple,
            profit_factor,
            total_pnl: total_wins - total_losses,
        }
    }

    /// Thresholds missed over `window`. With too few trades only that flag is
    /// returned; the ratios are not meaningful yet.
    pub fn review(&self, thresholds: &ReviewThresholds, window: Window) -> Vec<ReviewFlag> {
        let s = self.summary(window);
        if s.trades < thresholds.min_trades {
            return vec![ReviewFlag::TooFewTrades {
                trades: s.trades,
                minimum: thresholds.min_trades,
            }];
        }

        let mut flags = Vec::new();
        if s.win_rate < thresholds.min_win_rate {
            flags.push(ReviewFlag::LowWinRate {
                win_rate: s.win_rate,
                minimum: thresholds.min_win_rate,
            });
        }
        if s.profit_factor < thresholds.min_profit_factor {
            flags.push(ReviewFlag::LowProfitFactor {
                profit_factor: s.profit_factor,
                minimum: thresholds.min_profit_factor,
            });
        }
        if s.achieved_rr < thresholds.min_achieved_rr {
            flags.push(ReviewFlag::LowAchievedRr {
                achieved_rr: s.achieved_rr,
                minimum: thresholds.min_achieved_rr,
            });
        }
        flags
    }
}
