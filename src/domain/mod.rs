//! Core domain types and logic.

pub mod timeframe;
pub mod ohlcv;
pub mod indicator;
pub mod snapshot;
pub mod snapshot_builder;
pub mod strategy;
pub mod config_validation;
pub mod recommendation;
pub mod evaluator;
pub mod sizer;
pub mod feedback;
pub mod error;
