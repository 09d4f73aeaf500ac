/*!
 * Logging functionality for meshdrivers.
 *
 * Drivers report everything through `tracing`; this module installs the
 * subscriber and provides the per-device span used as the diagnostic channel.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "meshdrivers_devices=debug")
///
/// `RUST_LOG` takes precedence when it is set.
pub fn init_with_filter(filter: &str) -> Result<()> {
    install(filter, true)
}

/// Initialize the logging system from the logging section of the configuration
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    install(&config.level, config.with_target)
}

fn install(filter: &str, with_target: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(with_target))
        .with(filter)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to initialize logging: {}", e)))
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create the span every driver callback for one device runs in
///
/// # Arguments
///
/// * `driver` - The driver id (e.g. "ZB_WallController_8")
/// * `device` - The device id
pub fn device_span(driver: &str, device: &str) -> Span {
    tracing::info_span!("device", driver = %driver, id = %device)
}
