//! Risk sizing: final leverage and position size against account limits.

use crate::domain::error::SigtraderError;
use crate::domain::recommendation::TradeRecommendation;
use crate::domain::strategy::RiskLimits;
use serde::Serialize;
use tracing::{debug, info};

/// Account state for the current trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    /// Realized loss so far today, as a positive amount.
    pub realized_loss_today: f64,
    pub losses_today: u32,
    pub trades_today: u32,
}

impl AccountState {
    pub fn new(balance: f64) -> Self {
        Self {
            balance,
            realized_loss_today: 0.0,
            losses_today: 0,
            trades_today: 0,
        }
    }

    /// Loss still allowed today before the daily ceiling is hit.
    pub fn remaining_loss_budget(&self, limits: &RiskLimits) -> f64 {
        self.balance * limits.daily_loss_limit_pct / 100.0 - self.realized_loss_today
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizedTrade {
    pub leverage: u32,
    /// Margin as a fraction of balance.
    pub size_fraction: f64,
    pub notional: f64,
    pub margin: f64,
    /// Loss if the stop is hit.
    pub risk_amount: f64,
}

impl SizedTrade {
    pub fn none() -> Self {
        Self {
            leverage: 0,
            size_fraction: 0.0,
            notional: 0.0,
            margin: 0.0,
            risk_amount: 0.0,
        }
    }

    /// New recommendation carrying this sizing.
    pub fn apply(&self, rec: &TradeRecommendation) -> TradeRecommendation {
        rec.with_sizing(self.leverage, self.size_fraction)
    }
}

pub fn size(
    rec: &TradeRecommendation,
    account: &AccountState,
    limits: &RiskLimits,
) -> Result<SizedTrade, SigtraderError> {
    if !rec.is_actionable() {
        return Ok(SizedTrade::none());
    }

    if account.balance <= 0.0 || !account.balance.is_finite() {
        return Err(SigtraderError::risk(format!(
            "account balance {:.2} is not positive",
            account.balance
        )));
    }
    if account.realized_loss_today < 0.0 || !account.realized_loss_today.is_finite() {
        return Err(SigtraderError::risk(format!(
            "realized loss today {:.2} must be a non-negative amount",
            account.realized_loss_today
        )));
    }
    if account.losses_today >= limits.max_daily_losses {
        return Err(SigtraderError::risk(format!(
            "{} losing trades today, limit is {}",
            account.losses_today, limits.max_daily_losses
        )));
    }
    if account.trades_today >= limits.max_trades_per_day {
        return Err(SigtraderError::risk(format!(
            "{} trades today, limit is {}",
            account.trades_today, limits.max_trades_per_day
        )));
    }

    let budget = account.remaining_loss_budget(limits);
    if budget <= 0.0 {
        return Err(SigtraderError::risk(format!(
            "daily loss budget exhausted ({:.2} realized)",
            account.realized_loss_today
        )));
    }

    let risk_amount = account.balance * limits.risk_per_trade_pct / 100.0;
    if risk_amount > budget {
        return Err(SigtraderError::risk(format!(
            "risk per trade {:.2} exceeds remaining daily loss budget {:.2}",
            risk_amount, budget
        )));
    }

    let (entry, stop_distance) = match (rec.reference_price(), rec.stop_distance()) {
        (Some(e), Some(d)) if e > 0.0 && d > 0.0 => (e, d),
        _ => {
            return Err(SigtraderError::risk(
                "recommendation has no positive stop-loss distance",
            ));
        }
    };

    let stop_fraction = stop_distance / entry;
    let notional = risk_amount / stop_fraction;

    // start from the proposed leverage, raise it only as far as needed for margin to fit
    let mut leverage = rec.leverage.clamp(limits.min_leverage, limits.max_leverage);
    let needed = (notional / account.balance).ceil().max(1.0) as u32;
    if needed > leverage {
        leverage = needed.min(limits.max_leverage);
    }

    let mut margin = notional / leverage as f64;
    let mut notional = notional;
    if margin > account.balance {
        margin = account.balance;
        notional = margin * leverage as f64;
        debug!(notional, "notional capped by balance at max leverage");
    }
    let size_fraction = margin / account.balance;
    let risk_amount = notional * stop_fraction;

    info!(
        symbol = %rec.symbol,
        leverage,
        size_fraction,
        risk_amount,
        remaining_budget = budget,
        "sized trade"
    );

    Ok(SizedTrade {
        leverage,
        size_fraction,
        notional,
        margin,
        risk_amount,
    })
}
