//! Logging setup: `log` records from the library are forwarded into a
//! `tracing` fmt subscriber on stderr.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Default filter for a `-v` count; `RUST_LOG` takes precedence when set.
pub fn default_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    format!("warn,grist={}", level)
}

pub fn init(verbose: u8) -> Result<()> {
    tracing_log::LogTracer::init().context("Failed to install log bridge")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(verbose >= 2)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    Ok(())
}
