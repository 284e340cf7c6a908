//! Tracing subscriber setup
//!
//! The kernel itself only emits `tracing` events. Hosts that have no
//! subscriber of their own can install one with [`init_logging`].

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{ApplyError, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = match config.level.trim() {
        "" => "info",
        level => level,
    };
    EnvFilter::try_new(level).map_err(|e| ApplyError::Logging(format!("filter '{level}': {e}")))
}

/// Install a global subscriber for `config`
///
/// Returns `Ok(true)` when this call installed the subscriber and `Ok(false)`
/// when one was already present (ours or the host's).
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }

    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
            .is_ok(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .is_ok(),
    };

    let _ = INSTALLED.set(());
    if installed {
        tracing::info!(level = %config.level, format = ?config.format, "logging initialized");
    }
    Ok(installed)
}
