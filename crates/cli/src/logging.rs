//! Tracing initialisation.

use eyre::{Context, Result};

/// Initialize the tracing subscriber for logging.
///
/// # Arguments
///
/// * `level` - The log level string (trace, debug, info, warn, error)
///
/// # Errors
///
/// Returns an error if the log filter cannot be constructed.
pub fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .wrap_err("failed to create log filter")?;

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    Ok(())
}
