//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use crate::adapters::csv_klines_adapter::{parse_time, CsvKlinesAdapter};
use crate::adapters::csv_snapshot_adapter::CsvSnapshotAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::validate_strategy_config;
use crate::domain::error::SigtraderError;
use crate::domain::evaluator::evaluate;
use crate::domain::recommendation::TradeRecommendation;
use crate::domain::sizer::{self, AccountState, SizedTrade};
use crate::domain::snapshot::IndicatorSnapshot;
use crate::domain::snapshot_builder::{build_snapshot, IndicatorPeriods};
use crate::domain::strategy::{
    EntryConditions, ExitRules, FilterThresholds, ReviewThresholds, RiskLimits, RrRange, Strategy,
};
use crate::domain::timeframe::{parse_timeframes, Timeframe};
use crate::ports::config_port::ConfigPort;
use crate::ports::kline_port::KlinePort;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Rule-based futures trade recommendations")]
pub struct Cli {
    /// Debug-level logs for this crate
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Evaluate a strategy against an indicator snapshot
    Evaluate {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        /// Evaluation time (RFC 3339 or epoch ms); defaults to the latest bar
        #[arg(long, value_parser = parse_time)]
        as_of: Option<DateTime<Utc>>,
        #[arg(long)]
        json: bool,
    },
    /// Evaluate, then size the trade against account risk limits
    Size {
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(long, value_parser = parse_time)]
        as_of: Option<DateTime<Utc>>,
        #[arg(long)]
        balance: f64,
        /// Loss realized so far today, as a positive amount
        #[arg(long, default_value_t = 0.0)]
        realized_loss: f64,
        #[arg(long, default_value_t = 0)]
        losses_today: u32,
        #[arg(long, default_value_t = 0)]
        trades_today: u32,
        #[arg(long)]
        json: bool,
    },
    /// Build a snapshot from kline CSVs and evaluate it
    Snapshot {
        #[arg(short, long)]
        strategy: PathBuf,
        /// `<timeframe>=<csv path>`, repeatable
        #[arg(long = "klines", value_parser = parse_kline_arg, required = true)]
        klines: Vec<(Timeframe, PathBuf)>,
        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(long)]
        json: bool,
    },
}

pub fn parse_kline_arg(raw: &str) -> Result<(Timeframe, PathBuf), String> {
    let (tf, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <timeframe>=<path>, got '{}'", raw))?;
    if path.trim().is_empty() {
        return Err(format!("empty path for {}", tf));
    }
    Ok((tf.trim().parse()?, PathBuf::from(path.trim())))
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Evaluate {
            strategy,
            snapshot,
            symbol,
            as_of,
            json,
        } => run_evaluate(&strategy, &snapshot, &symbol, as_of, json),
        Command::Size {
            strategy,
            snapshot,
            symbol,
            as_of,
            balance,
            realized_loss,
            losses_today,
            trades_today,
            json,
        } => {
            let account = AccountState {
                balance,
                realized_loss_today: realized_loss,
                losses_today,
                trades_today,
            };
            run_size(&strategy, &snapshot, &symbol, as_of, &account, json)
        }
        Command::Snapshot {
            strategy,
            klines,
            symbol,
            json,
        } => run_snapshot(&strategy, klines, &symbol, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SigtraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| SigtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn filters_from(config: &dyn ConfigPort, section: &str, base: &FilterThresholds) -> FilterThresholds {
    FilterThresholds {
        adx_trend_min: config.get_double(section, "adx_trend_min", base.adx_trend_min),
        rsi_overbought: config.get_double(section, "rsi_overbought", base.rsi_overbought),
        rsi_oversold: config.get_double(section, "rsi_oversold", base.rsi_oversold),
        rsi_neutral_low: config.get_double(section, "rsi_neutral_low", base.rsi_neutral_low),
        rsi_neutral_high: config.get_double(section, "rsi_neutral_high", base.rsi_neutral_high),
        atr_low_vol_ratio: config.get_double(section, "atr_low_vol_ratio", base.atr_low_vol_ratio),
    }
}

fn rr_range(config: &dyn ConfigPort, prefix: &str, base: RrRange) -> RrRange {
    RrRange::new(
        config.get_double("exit", &format!("{prefix}_min"), base.min),
        config.get_double("exit", &format!("{prefix}_max"), base.max),
    )
}

fn count(config: &dyn ConfigPort, section: &str, key: &str, default: u32) -> u32 {
    u32::try_from(config.get_int(section, key, i64::from(default))).unwrap_or(default)
}

/// Builds and validates a strategy from its INI document.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, SigtraderError> {
    validate_strategy_config(config)?;

    let defaults = Strategy::default();
    let version = config
        .get_string("strategy", "version")
        .unwrap_or(defaults.version);
    let priority_timeframes = match config.get_string("strategy", "priority_timeframes") {
        Some(raw) => parse_timeframes(&raw)
            .map_err(|reason| SigtraderError::invalid("strategy", "priority_timeframes", reason))?,
        None => defaults.priority_timeframes,
    };

    let e = EntryConditions::default();
    let entry = EntryConditions {
        ema_fast: count(config, "entry", "ema_fast", e.ema_fast as u32) as usize,
        ema_slow: count(config, "entry", "ema_slow", e.ema_slow as u32) as usize,
        volume_surge_ratio: config.get_double("entry", "volume_surge_ratio", e.volume_surge_ratio),
        require_breakout: config.get_bool("entry", "require_breakout", e.require_breakout),
        breakout_lookback: count(config, "entry", "breakout_lookback", e.breakout_lookback as u32)
            as usize,
        entry_band_atr: config.get_double("entry", "entry_band_atr", e.entry_band_atr),
    };

    let default_filters = filters_from(config, "filters", &FilterThresholds::default());
    let mut timeframe_filters = BTreeMap::new();
    for tf in Timeframe::ALL {
        let section = format!("filters.{}", tf);
        if config.has_section(&section) {
            timeframe_filters.insert(tf, filters_from(config, &section, &default_filters));
        }
    }

    let x = ExitRules::default();
    let exit = ExitRules {
        stop_loss_atr_mult: config.get_double("exit", "stop_loss_atr_mult", x.stop_loss_atr_mult),
        rr_high_vol: rr_range(config, "rr_high_vol", x.rr_high_vol),
        rr_low_vol: rr_range(config, "rr_low_vol", x.rr_low_vol),
        min_rr: config.get_double("exit", "min_rr", x.min_rr),
        counter_trend_rr: config.get_double("exit", "counter_trend_rr", x.counter_trend_rr),
        partial_exit_fraction: config.get_double(
            "exit",
            "partial_exit_fraction",
            x.partial_exit_fraction,
        ),
    };

    let r = RiskLimits::default();
    let risk = RiskLimits {
        max_daily_losses: count(config, "risk", "max_daily_losses", r.max_daily_losses),
        risk_per_trade_pct: config.get_double("risk", "risk_per_trade_pct", r.risk_per_trade_pct),
        daily_loss_limit_pct: config.get_double(
            "risk",
            "daily_loss_limit_pct",
            r.daily_loss_limit_pct,
        ),
        min_leverage: count(config, "risk", "min_leverage", r.min_leverage),
        max_leverage: count(config, "risk", "max_leverage", r.max_leverage),
        max_trades_per_day: count(config, "risk", "max_trades_per_day", r.max_trades_per_day),
    };

    let v = ReviewThresholds::default();
    let review = ReviewThresholds {
        min_trades: count(config, "review", "min_trades", v.min_trades as u32) as usize,
        min_win_rate: config.get_double("review", "min_win_rate", v.min_win_rate),
        min_profit_factor: config.get_double("review", "min_profit_factor", v.min_profit_factor),
        min_achieved_rr: config.get_double("review", "min_achieved_rr", v.min_achieved_rr),
    };

    let strategy = Strategy {
        name: config
            .get_string("strategy", "name")
            .unwrap_or(defaults.name),
        version,
        description: config
            .get_string("strategy", "description")
            .unwrap_or_default(),
        priority_timeframes,
        max_stale_bars: count(config, "strategy", "max_stale_bars", defaults.max_stale_bars),
        entry,
        default_filters,
        timeframe_filters,
        exit,
        risk,
        review,
    };
    strategy.validate()?;
    Ok(strategy)
}

/// Lookbacks for snapshots built from klines, from the `[indicators]` section.
pub fn build_indicator_periods(config: &dyn ConfigPort) -> Result<IndicatorPeriods, SigtraderError> {
    let d = IndicatorPeriods::default();
    let periods = IndicatorPeriods {
        rsi: count(config, "indicators", "rsi", d.rsi as u32) as usize,
        atr: count(config, "indicators", "atr", d.atr as u32) as usize,
        adx: count(config, "indicators", "adx", d.adx as u32) as usize,
        atr_avg: count(config, "indicators", "atr_avg", d.atr_avg as u32) as usize,
        volume_avg: count(config, "indicators", "volume_avg", d.volume_avg as u32) as usize,
    };
    for (key, value) in [
        ("rsi", periods.rsi),
        ("atr", periods.atr),
        ("adx", periods.adx),
        ("atr_avg", periods.atr_avg),
        ("volume_avg", periods.volume_avg),
    ] {
        if value == 0 {
            return Err(SigtraderError::invalid(
                "indicators",
                key,
                "period must be at least 1",
            ));
        }
    }
    Ok(periods)
}

pub fn load_strategy(path: &Path) -> Result<Strategy, SigtraderError> {
    let config = load_config(path)?;
    let strategy = build_strategy(&config)?;
    info!(
        name = %strategy.name,
        version = %strategy.version,
        path = %path.display(),
        "strategy loaded"
    );
    Ok(strategy)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), SigtraderError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{text}");
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), SigtraderError> {
    let strategy = load_strategy(strategy_path)?;
    let timeframes: Vec<_> = strategy
        .priority_timeframes
        .iter()
        .map(|tf| tf.to_string())
        .collect();
    println!("{} ({}) is valid", strategy.name, strategy.version);
    println!("  timeframes: {}", timeframes.join(", "));
    println!(
        "  leverage:   {}x - {}x",
        strategy.risk.min_leverage, strategy.risk.max_leverage
    );
    println!(
        "  risk:       {}% per trade, {}% daily",
        strategy.risk.risk_per_trade_pct, strategy.risk.daily_loss_limit_pct
    );
    if !strategy.description.is_empty() {
        println!("  {}", strategy.description);
    }
    Ok(())
}

fn load_snapshot(
    path: &Path,
    symbol: &str,
    as_of: Option<DateTime<Utc>>,
) -> Result<IndicatorSnapshot, SigtraderError> {
    let mut adapter = CsvSnapshotAdapter::new(path);
    if let Some(t) = as_of {
        adapter = adapter.with_as_of(t);
    }
    adapter.fetch_snapshot(symbol)
}

fn emit(rec: &TradeRecommendation, json: bool) -> Result<(), SigtraderError> {
    if json {
        print_json(rec)
    } else {
        print!("{rec}");
        Ok(())
    }
}

fn run_evaluate(
    strategy_path: &Path,
    snapshot_path: &Path,
    symbol: &str,
    as_of: Option<DateTime<Utc>>,
    json: bool,
) -> Result<(), SigtraderError> {
    let strategy = load_strategy(strategy_path)?;
    let snapshot = load_snapshot(snapshot_path, symbol, as_of)?;
    let rec = evaluate(&strategy, &snapshot);
    info!(id = %rec.id(), position = %rec.position, "evaluated");
    emit(&rec, json)
}

#[derive(Serialize)]
struct SizedOutput<'a> {
    recommendation: &'a TradeRecommendation,
    sizing: &'a SizedTrade,
}

fn run_size(
    strategy_path: &Path,
    snapshot_path: &Path,
    symbol: &str,
    as_of: Option<DateTime<Utc>>,
    account: &AccountState,
    json: bool,
) -> Result<(), SigtraderError> {
    let strategy = load_strategy(strategy_path)?;
    let snapshot = load_snapshot(snapshot_path, symbol, as_of)?;
    let rec = evaluate(&strategy, &snapshot);
    let sized = sizer::size(&rec, account, &strategy.risk)?;
    let rec = sized.apply(&rec);

    if json {
        return print_json(&SizedOutput {
            recommendation: &rec,
            sizing: &sized,
        });
    }
    print!("{rec}");
    if rec.is_actionable() {
        println!("Notional:    {:.2}", sized.notional);
        println!("Margin:      {:.2}", sized.margin);
        println!("At risk:     {:.2}", sized.risk_amount);
    }
    Ok(())
}

#[derive(Serialize)]
struct SnapshotOutput<'a> {
    snapshot: &'a IndicatorSnapshot,
    recommendation: &'a TradeRecommendation,
}

fn run_snapshot(
    strategy_path: &Path,
    klines: Vec<(Timeframe, PathBuf)>,
    symbol: &str,
    json: bool,
) -> Result<(), SigtraderError> {
    let config = load_config(strategy_path)?;
    let strategy = build_strategy(&config)?;
    let periods = build_indicator_periods(&config)?;

    let source = klines
        .into_iter()
        .fold(CsvKlinesAdapter::new(), |a, (tf, path)| a.with_file(tf, path));
    let snapshot = snapshot_from_klines(&source, symbol, &strategy.entry, &periods)?;
    let rec = evaluate(&strategy, &snapshot);
    info!(id = %rec.id(), position = %rec.position, "evaluated");

    if json {
        return print_json(&SnapshotOutput {
            snapshot: &snapshot,
            recommendation: &rec,
        });
    }
    print!("{rec}");
    Ok(())
}

/// Fetches every timeframe the source serves and builds one snapshot.
pub fn snapshot_from_klines(
    source: &dyn KlinePort,
    symbol: &str,
    entry: &EntryConditions,
    periods: &IndicatorPeriods,
) -> Result<IndicatorSnapshot, SigtraderError> {
    let mut klines = BTreeMap::new();
    for tf in source.timeframes() {
        klines.insert(tf, source.fetch_klines(symbol, tf)?);
    }
    build_snapshot(symbol, &klines, entry, periods)
}
