// src/logging.rs
// =============================================================================
// Sets up `tracing` output.
//
// Verbose mode turns on the per-URL trace lines (debug level) for this crate;
// otherwise only lifecycle messages and failures show up. When RUST_LOG is
// set it replaces these defaults entirely, --verbose included.
// =============================================================================

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system
pub fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = build_filter(verbose, std::env::var("RUST_LOG").ok())?;

    // Logs go to stderr so stdout stays clean
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

// RUST_LOG wins when present; otherwise warn everywhere and info/debug for us
fn build_filter(verbose: bool, rust_log: Option<String>) -> Result<EnvFilter> {
    let directives = match rust_log.filter(|value| !value.trim().is_empty()) {
        Some(value) => value,
        None => {
            let crate_level = if verbose { "debug" } else { "info" };
            format!("warn,site_spider={}", crate_level)
        }
    };

    Ok(EnvFilter::try_new(directives)?)
}
