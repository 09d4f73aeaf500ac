/*!
 * Driver trait and the device/driver pairing.
 *
 * A driver is stateless: it describes one device model and reacts to the
 * lifecycle of every [`MeshDevice`] paired with it.
 */
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn, Instrument};

use meshdrivers_core::logging::device_span;
use meshdrivers_core::types::Value;

use crate::capability::Capability;
use crate::device::{DeviceError, MeshDevice, Result};
use crate::flow::{AutocompleteItem, AutocompleteKind};
use crate::mesh::{AttributeReport, ClusterCommand, MeshProtocol};

/// Static description of a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverManifest {
    /// Driver id (e.g. `ZB_WallController_8`)
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Mesh protocol of the supported model
    pub protocol: MeshProtocol,
    /// Capabilities devices are paired with
    pub capabilities: Vec<Capability>,
}

/// What happened to an attribute report
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Handed to the driver's listener
    Listener,
    /// Parsed by a capability binding and stored
    Capability(Capability, Value),
    /// Nobody registered interest
    Ignored,
}

/// A device model driver
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Get the driver manifest
    fn manifest(&self) -> &DriverManifest;

    /// Get the driver id
    fn id(&self) -> &str {
        &self.manifest().id
    }

    /// Register capabilities, listeners and bindings for a freshly started device
    async fn on_mesh_init(&self, device: &MeshDevice) -> Result<()>;

    /// Handle a report for an attribute the driver registered a listener for
    async fn on_attribute_report(&self, device: &MeshDevice, report: &AttributeReport) -> Result<()> {
        debug!("{} ignoring report {}/{}", device.id(), report.cluster, report.attribute);
        Ok(())
    }

    /// Handle a command sent by the device
    async fn on_command(&self, device: &MeshDevice, command: &ClusterCommand) -> Result<()> {
        debug!("{} ignoring command {}", device.id(), command.attr);
        Ok(())
    }

    /// Suggestions for a flow card argument
    async fn autocomplete(
        &self,
        _device: &MeshDevice,
        _kind: AutocompleteKind,
        _query: &str,
    ) -> Result<Vec<AutocompleteItem>> {
        Ok(Vec::new())
    }
}

/// A paired device and the driver handling it
#[derive(Debug)]
pub struct DriverDevice {
    driver: Arc<dyn Driver>,
    device: MeshDevice,
}

impl DriverDevice {
    /// Pair a driver with a device
    pub fn new(driver: Arc<dyn Driver>, device: MeshDevice) -> Self {
        Self { driver, device }
    }

    /// Get the driver
    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Get the device
    pub fn device(&self) -> &MeshDevice {
        &self.device
    }

    fn span(&self) -> tracing::Span {
        device_span(self.driver.id(), self.device.id().as_str())
    }

    /// Run the driver's init hook; failures are logged, never retried
    pub async fn init(&self) {
        let result = self
            .driver
            .on_mesh_init(&self.device)
            .instrument(self.span())
            .await;
        if let Err(e) = result {
            warn!("{} init failed for {}: {}", self.driver.id(), self.device.id(), e);
        }
    }

    /// Route an attribute report
    ///
    /// Listeners registered for the report's endpoint go to the driver first;
    /// otherwise a capability bound to the cluster on that endpoint parses the
    /// value.
    pub async fn handle_report(&self, report: &AttributeReport) -> Result<ReportOutcome> {
        let device = &self.device;
        async {
            if device.listens_to(report.endpoint, &report.cluster, &report.attribute).await {
                self.driver.on_attribute_report(device, report).await?;
                return Ok(ReportOutcome::Listener);
            }

            if let Some(binding) = device.binding_for_cluster(report.endpoint, &report.cluster).await {
                if let Some(value) = binding.report_value(&report.attribute, &report.value) {
                    device.set_capability_value(binding.capability, value.clone()).await?;
                    return Ok(ReportOutcome::Capability(binding.capability, value));
                }
            }

            debug!("No listener for {}/{} on endpoint {}", report.cluster, report.attribute, report.endpoint);
            Ok(ReportOutcome::Ignored)
        }
        .instrument(self.span())
        .await
    }

    /// Route a command sent by the device
    pub async fn handle_command(&self, command: &ClusterCommand) -> Result<()> {
        self.driver
            .on_command(&self.device, command)
            .instrument(self.span())
            .await
    }

    /// Apply a capability value set from the hub
    pub async fn set_capability(&self, capability: Capability, value: Value) -> Result<()> {
        let binding = self
            .device
            .binding_for_capability(capability)
            .await
            .ok_or_else(|| DeviceError::CapabilityNotRegistered(capability.to_string()))?;
        let command = binding.set_command(self.device.node().protocol(), &value)?;
        self.device.node().send_command(command).await
    }

    /// Suggestions for a flow card argument
    pub async fn autocomplete(&self, kind: AutocompleteKind, query: &str) -> Result<Vec<AutocompleteItem>> {
        self.driver.autocomplete(&self.device, kind, query).await
    }
}
