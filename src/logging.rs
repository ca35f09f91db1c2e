use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_GUARD: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
/// Logs go to stderr so stdout stays free for the run summary.
pub fn init_tracing(default_level: &str) -> Result<()> {
    if TRACING_GUARD.get().is_some() {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|err| anyhow!("invalid log level '{default_level}': {err}"))?,
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise tracing: {err}"))?;
    let _ = TRACING_GUARD.set(());
    Ok(())
}
