/*!
 * Z-Wave in-wall switch (`ZW_InWallSwitch`).
 */
use async_trait::async_trait;
use tracing::warn;

use crate::capability::{Capability, COMMAND_CLASS_SWITCH_BINARY};
use crate::device::{MeshDevice, Result};
use crate::driver::{Driver, DriverManifest};
use crate::mesh::MeshProtocol;

/// Driver id
pub const DRIVER_ID: &str = "ZW_InWallSwitch";

/// Z-Wave in-wall switch driver
///
/// Everything goes through the `onoff` binding on the binary switch command
/// class: reports update the capability and the hub switches it.
#[derive(Debug, Clone)]
pub struct ZwaveInWallSwitch {
    manifest: DriverManifest,
}

impl ZwaveInWallSwitch {
    /// Create the driver
    pub fn new() -> Self {
        Self {
            manifest: DriverManifest {
                id: DRIVER_ID.to_string(),
                name: "Z-Wave In-Wall Switch".to_string(),
                protocol: MeshProtocol::ZWave,
                capabilities: vec![Capability::OnOff],
            },
        }
    }
}

impl Default for ZwaveInWallSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for ZwaveInWallSwitch {
    fn manifest(&self) -> &DriverManifest {
        &self.manifest
    }

    async fn on_mesh_init(&self, device: &MeshDevice) -> Result<()> {
        device.enable_debug().await;
        device.print_node();

        if let Err(e) = device
            .register_capability(Capability::OnOff, COMMAND_CLASS_SWITCH_BINARY)
            .await
        {
            warn!("failed to register onoff capability: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use meshdrivers_core::types::Value;

    use crate::driver::{DriverDevice, ReportOutcome};
    use crate::memory::{memory_device, MemoryNode, MemoryStore};
    use crate::mesh::{AttributeReport, Endpoint};

    #[tokio::test]
    async fn test_switch_binary_roundtrip() {
        let node = Arc::new(MemoryNode::new(
            "inwall",
            MeshProtocol::ZWave,
            vec![Endpoint::new(0, ["BASIC", COMMAND_CLASS_SWITCH_BINARY])],
        ));
        let (device, host) = memory_device(node.clone(), Arc::new(MemoryStore::new()), vec![Capability::OnOff]);
        let paired = DriverDevice::new(Arc::new(ZwaveInWallSwitch::new()), device);
        paired.init().await;

        let outcome = paired
            .handle_report(&AttributeReport::new(0, COMMAND_CLASS_SWITCH_BINARY, "Value", 255))
            .await
            .unwrap();
        assert_eq!(outcome, ReportOutcome::Capability(Capability::OnOff, Value::Bool(true)));
        assert_eq!(host.value(paired.device().id(), Capability::OnOff).await, Some(Value::Bool(true)));

        paired.set_capability(Capability::OnOff, Value::Bool(false)).await.unwrap();
        let commands = node.commands().await;
        assert_eq!(commands[0].command, "SWITCH_BINARY_SET");
        assert_eq!(commands[0].parameters.field("Switch Value"), Some(&Value::Integer(0)));
    }

    #[tokio::test]
    async fn test_missing_command_class_is_not_fatal() {
        let node = Arc::new(MemoryNode::new("inwall", MeshProtocol::ZWave, vec![Endpoint::new(0, ["BASIC"])]));
        let (device, _host) = memory_device(node, Arc::new(MemoryStore::new()), vec![Capability::OnOff]);
        let paired = DriverDevice::new(Arc::new(ZwaveInWallSwitch::new()), device);
        paired.init().await;

        assert!(paired.device().is_debug().await);
        assert!(paired.device().binding_for_capability(Capability::OnOff).await.is_none());
    }
}
