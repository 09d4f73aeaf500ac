/*!
 * Mesh Drivers Devices
 *
 * Device drivers for Zigbee and Z-Wave nodes paired with a home automation
 * hub. Drivers map mesh clusters onto hub capabilities and fire flow trigger
 * cards for remote controllers. The mesh stack, the hub and the persisted
 * store are reached through the traits in [`mesh`] and [`host`].
 */

#![warn(missing_docs)]

// Re-export core types
pub use meshdrivers_core::prelude;

pub mod capability;
pub mod device;
pub mod driver;
pub mod drivers;
pub mod flow;
pub mod host;
pub mod i18n;
pub mod memory;
pub mod mesh;
pub mod registry;

pub use capability::{Capability, CapabilityBinding};
pub use device::{DeviceError, DeviceInfo, MeshDevice};
pub use driver::{Driver, DriverDevice, DriverManifest, ReportOutcome};
pub use mesh::{AttributeReport, ClusterCommand, Endpoint, MeshNode, MeshProtocol};
pub use registry::{DeviceRegistry, RegistryEvent};

/// Mesh drivers devices crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the device system
pub fn init() -> Result<(), meshdrivers_core::error::Error> {
    tracing::info!("Mesh Drivers Devices {} initialized", VERSION);
    Ok(())
}
