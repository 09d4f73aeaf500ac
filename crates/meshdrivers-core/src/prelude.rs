/*!
 * Prelude module for meshdrivers core.
 *
 * Re-exports the commonly used types so drivers can import them in one line.
 */

pub use crate::error::{Error, Result};

pub use crate::types::{Id, Value};

pub use crate::config::{Config, ConfigBuilder, DriversConfig, ReportIntervals, SharedConfig};

pub use tracing::{debug, error, info, trace, warn};

pub use crate::init;
