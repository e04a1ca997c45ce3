//! Logging initialization for the binary.
//!
//! Logs go to stderr so stdout carries only the recommendation. `RUST_LOG`
//! overrides the level picked from `--verbose`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "sigtrader=debug,info"
    } else {
        "warn"
    }
}

/// Installs the global subscriber. Call once, from `main`.
pub fn init_logging(verbose: bool, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(verbose)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
