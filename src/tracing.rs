//! Log subscriber initialization for the hosting process.

use anyhow::anyhow;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Installs the global subscriber: a compact fmt layer behind an
/// environment-driven filter, defaulting to `info`.
pub fn initialize() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!("failed to initialize env filter: {}", e))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().compact())
        .with(filter_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize subscribers: {}", e))?;

    Ok(())
}
