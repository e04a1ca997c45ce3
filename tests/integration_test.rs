//! Integration tests for the evaluate / size / feedback flow.
//!
//! Tests cover:
//! - Reference scenarios (trending long, neutral RSI, risk budget exceeded)
//! - Multi-timeframe agreement and missing or stale timeframes
//! - Sizing of evaluated recommendations against account state
//! - Feedback log fed by evaluated recommendations
//! - Universal properties over generated snapshots (proptest)

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use sigtrader::domain::error::SigtraderError;
use sigtrader::domain::evaluator::evaluate;
use sigtrader::domain::feedback::{FeedbackLog, ReviewFlag, TradeOutcome, Window};
use sigtrader::domain::recommendation::{Confidence, Position};
use sigtrader::domain::sizer::{size, AccountState};
use sigtrader::domain::snapshot::TimeframeIndicators;
use sigtrader::domain::strategy::ReviewThresholds;
use sigtrader::domain::timeframe::Timeframe;
use std::collections::BTreeMap;

mod reference_scenarios {
    use super::*;

    #[test]
    fn trending_long_with_volume_surge_goes_long() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(trending_long()));

        assert_eq!(rec.position, Position::Long);
        assert_eq!(rec.confidence, Confidence::Standard);
        assert!(!rec.take_profits.is_empty());
        for tp in &rec.take_profits {
            assert!(strategy.exit.rr_high_vol.contains(tp.rr), "R:R {} out of range", tp.rr);
            assert!(tp.price > 97_000.0);
        }
        assert!(rec.meets_min_rr(strategy.exit.min_rr));

        // 1.5 ATR stop below the close
        assert_relative_eq!(rec.stop_loss.unwrap(), 97_000.0 - 600.0);
        assert_relative_eq!(rec.stop_distance().unwrap(), 600.0);
        assert!(rec.leverage >= strategy.risk.min_leverage);
        assert!(rec.leverage <= strategy.risk.max_leverage);
    }

    #[test]
    fn neutral_rsi_holds_even_when_trending() {
        let rec = evaluate(&single_tf_strategy(), &snapshot(with_rsi(trending_long(), 50.0)));
        assert_eq!(rec.position, Position::Hold);
        assert!(rec.entry.is_none());
        assert!(rec.stop_loss.is_none());
        assert!(rec.take_profits.is_empty());
        assert_eq!(rec.leverage, 0);
    }

    #[test]
    fn risk_above_remaining_budget_is_rejected() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(trending_long()));
        assert!(rec.is_actionable());

        // 3% of 1000 is 30; 25 already lost leaves 5, a trade risks 10
        let account = AccountState {
            realized_loss_today: 25.0,
            ..AccountState::new(1_000.0)
        };
        let err = size(&rec, &account, &strategy.risk).unwrap_err();
        assert!(matches!(err, SigtraderError::RiskLimitExceeded { .. }));
    }

    #[test]
    fn trending_short_mirrors_long() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(trending_short()));
        assert_eq!(rec.position, Position::Short);
        assert!(rec.stop_loss.unwrap() > 97_000.0);
        assert!(rec.take_profits.iter().all(|tp| tp.price < 97_000.0));
    }
}

mod timeframes {
    use super::*;

    #[test]
    fn missing_required_timeframe_holds() {
        let rec = evaluate(&two_tf_strategy(), &snapshot(trending_long()));
        assert_eq!(rec.position, Position::Hold);
        assert!(rec.rationale[0].contains("missing data for 1h"));
    }

    #[test]
    fn stale_primary_holds() {
        let mut values = trending_long();
        values.bar_time = now() - minutes(45);
        let rec = evaluate(&single_tf_strategy(), &snapshot(values));
        assert_eq!(rec.position, Position::Hold);
        assert!(rec.rationale[0].contains("stale"));
    }

    #[test]
    fn within_stale_allowance_still_trades() {
        let mut values = trending_long();
        values.bar_time = now() - minutes(30);
        let rec = evaluate(&single_tf_strategy(), &snapshot(values));
        assert_eq!(rec.position, Position::Long);
    }

    #[test]
    fn agreeing_higher_timeframe_raises_leverage() {
        let strategy = two_tf_strategy();
        let agree = snapshot(trending_long()).with_timeframe(Timeframe::H1, trending_long());
        let disagree = snapshot(trending_long()).with_timeframe(Timeframe::H1, trending_short());

        let with_agreement = evaluate(&strategy, &agree);
        let without = evaluate(&strategy, &disagree);

        assert_eq!(with_agreement.position, Position::Long);
        assert_eq!(without.position, Position::Long);
        assert_eq!(with_agreement.leverage, strategy.risk.max_leverage);
        assert_eq!(without.leverage, strategy.risk.min_leverage);
        assert!(with_agreement
            .rationale
            .iter()
            .any(|r| r.contains("timeframe agreement 1/1")));
    }
}

mod sizing {
    use super::*;

    #[test]
    fn sized_recommendation_respects_risk_per_trade() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(trending_long()));
        let account = AccountState::new(10_000.0);

        let sized = size(&rec, &account, &strategy.risk).unwrap();
        assert_relative_eq!(sized.risk_amount, 100.0, max_relative = 1e-9);
        assert!(sized.margin <= account.balance);
        assert!(sized.leverage >= strategy.risk.min_leverage);
        assert!(sized.leverage <= strategy.risk.max_leverage);

        let final_rec = sized.apply(&rec);
        assert_eq!(final_rec.leverage, sized.leverage);
        assert_relative_eq!(final_rec.size_fraction, sized.margin / account.balance);
        // levels untouched by sizing
        assert_eq!(final_rec.stop_loss, rec.stop_loss);
        assert_eq!(final_rec.take_profits, rec.take_profits);
    }

    #[test]
    fn hold_sizes_to_nothing() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(with_rsi(trending_long(), 50.0)));
        let sized = size(&rec, &AccountState::new(10_000.0), &strategy.risk).unwrap();
        assert_eq!(sized.leverage, 0);
        assert_eq!(sized.margin, 0.0);
    }

    #[test]
    fn daily_loss_count_blocks_trading() {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(trending_long()));
        let account = AccountState {
            losses_today: strategy.risk.max_daily_losses,
            ..AccountState::new(10_000.0)
        };
        assert!(matches!(
            size(&rec, &account, &strategy.risk),
            Err(SigtraderError::RiskLimitExceeded { .. })
        ));
    }
}

mod feedback {
    use super::*;

    #[test]
    fn evaluated_trades_feed_the_review() {
        let strategy = single_tf_strategy();
        let mut log = FeedbackLog::new();

        for i in 0..4 {
            let mut values = trending_long();
            values.bar_time = now() + minutes(15 * i);
            let mut snap = snapshot(values);
            snap.timestamp = now() + minutes(15 * i);
            let rec = evaluate(&strategy, &snap);
            assert!(rec.is_actionable());

            let exit_price = if i % 2 == 0 { 98_200.0 } else { 96_400.0 };
            let outcome = TradeOutcome {
                recommendation_id: rec.id(),
                entry_price: 97_000.0,
                exit_price,
                slippage: 0.0,
                pnl: exit_price - 97_000.0,
                closed_at: snap.timestamp + minutes(60),
            };
            log.append(rec, outcome).unwrap();
        }

        let summary = log.summary(Window::All);
        assert_eq!(summary.trades, 4);
        assert_eq!(summary.wins, 2);
        assert_relative_eq!(summary.win_rate, 0.5);
        assert_relative_eq!(summary.achieved_rr, 2.0);
        assert_relative_eq!(summary.avg_r_multiple, 0.5);

        let thresholds = ReviewThresholds {
            min_trades: 4,
            ..ReviewThresholds::default()
        };
        assert!(log.review(&thresholds, Window::All).is_empty());

        let flags = log.review(&ReviewThresholds::default(), Window::All);
        assert!(matches!(flags[0], ReviewFlag::TooFewTrades { trades: 4, minimum: 20 }));
    }

    #[test]
    fn hold_is_not_loggable() {
        let rec = evaluate(&single_tf_strategy(), &snapshot(with_rsi(trending_long(), 50.0)));
        let outcome = TradeOutcome {
            recommendation_id: rec.id(),
            entry_price: 97_000.0,
            exit_price: 97_100.0,
            slippage: 0.0,
            pnl: 100.0,
            closed_at: now(),
        };
        let mut log = FeedbackLog::new();
        assert!(matches!(
            log.append(rec, outcome),
            Err(SigtraderError::FeedbackRejected { .. })
        ));
        assert!(log.is_empty());
    }
}

fn arb_values() -> impl Strategy<Value = TimeframeIndicators> {
    (
        10_000.0..150_000.0f64,
        -0.02..0.02f64,
        0.0..60.0f64,
        0.0..100.0f64,
        1.0..2_000.0f64,
        0.5..1.5f64,
        0.0..3.0f64,
        proptest::bool::ANY,
    )
        .prop_map(|(close, ema_gap, adx, rsi, atr, atr_ratio, vol_ratio, breakout)| {
            let range_high = if breakout { close * 0.995 } else { close * 1.01 };
            let range_low = if breakout { close * 1.005 } else { close * 0.99 };
            TimeframeIndicators {
                bar_time: now(),
                close,
                ema: BTreeMap::from([(9, close * (1.0 + ema_gap)), (21, close)]),
                adx,
                rsi,
                atr,
                atr_avg: atr / atr_ratio,
                volume: 1_000.0 * vol_ratio,
                volume_avg: 1_000.0,
                range_high: Some(range_high),
                range_low: Some(range_low),
            }
        })
}

proptest! {
    #[test]
    fn neutral_rsi_always_holds(values in arb_values(), rsi in 45.001..54.999f64) {
        let rec = evaluate(&single_tf_strategy(), &snapshot(with_rsi(values, rsi)));
        prop_assert_eq!(rec.position, Position::Hold);
    }

    #[test]
    fn actionable_recommendations_have_a_protective_stop(values in arb_values()) {
        let strategy = single_tf_strategy();
        let close = values.close;
        let rec = evaluate(&strategy, &snapshot(values));
        if rec.is_actionable() {
            let stop = rec.stop_loss.unwrap();
            prop_assert!(rec.stop_distance().unwrap() > 0.0);
            prop_assert!((close - stop) * rec.position.sign() > 0.0);
            prop_assert!(rec.meets_min_rr(strategy.exit.min_rr));
            prop_assert!(rec.leverage >= strategy.risk.min_leverage);
            prop_assert!(rec.leverage <= strategy.risk.max_leverage);
            for tp in &rec.take_profits {
                prop_assert!((tp.price - close) * rec.position.sign() > 0.0);
            }
        } else {
            prop_assert!(rec.stop_loss.is_none());
        }
    }

    #[test]
    fn trending_long_targets_ignore_atr_regime(atr_ratio in 0.3..2.5f64) {
        let strategy = single_tf_strategy();
        let mut values = trending_long();
        values.atr_avg = values.atr / atr_ratio;
        let rec = evaluate(&strategy, &snapshot(values));
        prop_assert_eq!(rec.position, Position::Long);
        prop_assert!(!rec.take_profits.is_empty());
        for tp in &rec.take_profits {
            prop_assert!(strategy.exit.rr_high_vol.contains(tp.rr));
        }
    }

    #[test]
    fn evaluation_is_idempotent(values in arb_values()) {
        let strategy = two_tf_strategy();
        let snap = snapshot(values.clone()).with_timeframe(Timeframe::H1, values);
        prop_assert_eq!(evaluate(&strategy, &snap), evaluate(&strategy, &snap));
    }

    #[test]
    fn sizing_never_exceeds_limits(values in arb_values(), balance in 100.0..1_000_000.0f64) {
        let strategy = single_tf_strategy();
        let rec = evaluate(&strategy, &snapshot(values));
        let account = AccountState::new(balance);
        if let Ok(sized) = size(&rec, &account, &strategy.risk) {
            prop_assert!(sized.margin <= balance * (1.0 + 1e-9));
            prop_assert!(sized.risk_amount <= balance * strategy.risk.risk_per_trade_pct / 100.0 * (1.0 + 1e-9));
            if rec.is_actionable() {
                prop_assert!(sized.leverage >= strategy.risk.min_leverage);
                prop_assert!(sized.leverage <= strategy.risk.max_leverage);
            }
        }
    }
}
