/*!
 * Zigbee switch (`ZB_Switch`).
 *
 * A mains powered switch that also exposes a Green Power proxy. The on/off
 * attribute is reported on endpoint 0 unless the proxy lives there.
 */
use async_trait::async_trait;
use tracing::{info, warn};

use meshdrivers_core::types::Value;

use crate::capability::{Capability, ATTR_ON_OFF, CLUSTER_GREEN_POWER_PROXY, CLUSTER_ON_OFF};
use crate::device::{MeshDevice, Result};
use crate::driver::{Driver, DriverManifest};
use crate::mesh::{AttributeReport, MeshProtocol};

/// Driver id
pub const DRIVER_ID: &str = "ZB_Switch";

/// Zigbee switch driver
#[derive(Debug, Clone)]
pub struct ZigbeeSwitch {
    manifest: DriverManifest,
}

impl ZigbeeSwitch {
    /// Create the driver
    pub fn new() -> Self {
        Self {
            manifest: DriverManifest {
                id: DRIVER_ID.to_string(),
                name: "Zigbee Switch".to_string(),
                protocol: MeshProtocol::Zigbee,
                capabilities: vec![Capability::OnOff],
            },
        }
    }
}

impl Default for ZigbeeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for ZigbeeSwitch {
    fn manifest(&self) -> &DriverManifest {
        &self.manifest
    }

    async fn on_mesh_init(&self, device: &MeshDevice) -> Result<()> {
        device.enable_debug().await;
        device.print_node();

        if let Err(e) = device.register_capability(Capability::OnOff, CLUSTER_ON_OFF).await {
            warn!("failed to register onoff capability: {}", e);
        }

        let proxy = device.node().cluster_endpoint(CLUSTER_GREEN_POWER_PROXY);
        info!("GreenPowerProxy endpoint: {:?}", proxy);

        if proxy != Some(0) {
            if let Err(e) = device
                .register_attr_report_listener(CLUSTER_ON_OFF, ATTR_ON_OFF, 1, 300, 1, 0)
                .await
            {
                warn!("failed to register attr report listener: {}", e);
            }
        }
        Ok(())
    }

    async fn on_attribute_report(&self, device: &MeshDevice, report: &AttributeReport) -> Result<()> {
        if report.cluster == CLUSTER_ON_OFF && report.attribute == ATTR_ON_OFF {
            info!("onoff {}", report.value);
            let on = report.value.as_integer() == Some(1);
            device.set_capability_value(Capability::OnOff, Value::Bool(on)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::driver::{DriverDevice, ReportOutcome};
    use crate::memory::{memory_device, MemoryHost, MemoryNode, MemoryStore};
    use crate::mesh::Endpoint;

    async fn start(endpoints: Vec<Endpoint>) -> (DriverDevice, Arc<MemoryNode>, Arc<MemoryHost>) {
        let node = Arc::new(MemoryNode::new("switch", MeshProtocol::Zigbee, endpoints));
        let (device, host) = memory_device(node.clone(), Arc::new(MemoryStore::new()), vec![Capability::OnOff]);
        let paired = DriverDevice::new(Arc::new(ZigbeeSwitch::new()), device);
        paired.init().await;
        (paired, node, host)
    }

    #[tokio::test]
    async fn test_listener_registered_when_proxy_elsewhere() {
        let (paired, node, _host) = start(vec![
            Endpoint::new(0, ["genBasic", CLUSTER_ON_OFF]),
            Endpoint::new(242, [CLUSTER_GREEN_POWER_PROXY]),
        ])
        .await;

        assert!(paired.device().is_debug().await);
        let reporting = node.reporting().await;
        assert_eq!(reporting.len(), 1);
        assert_eq!(reporting[0].cluster, CLUSTER_ON_OFF);
        assert_eq!(
            (reporting[0].min_interval, reporting[0].max_interval, reporting[0].min_change, reporting[0].endpoint),
            (1, 300, 1, 0)
        );
    }

    #[tokio::test]
    async fn test_listener_registered_without_proxy() {
        let (_paired, node, _host) = start(vec![Endpoint::new(0, [CLUSTER_ON_OFF])]).await;
        assert_eq!(node.reporting().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_listener_when_proxy_on_endpoint_zero() {
        let (paired, node, _host) =
            start(vec![Endpoint::new(0, [CLUSTER_GREEN_POWER_PROXY, CLUSTER_ON_OFF])]).await;
        assert!(node.reporting().await.is_empty());
        assert!(!paired.device().listens_to(0, CLUSTER_ON_OFF, ATTR_ON_OFF).await);
    }

    #[tokio::test]
    async fn test_onoff_is_true_only_for_one() {
        let (paired, _node, host) = start(vec![Endpoint::new(0, [CLUSTER_ON_OFF])]).await;
        let id = paired.device().id().clone();

        let outcome = paired
            .handle_report(&AttributeReport::new(0, CLUSTER_ON_OFF, ATTR_ON_OFF, 1))
            .await
            .unwrap();
        assert_eq!(outcome, ReportOutcome::Listener);
        assert_eq!(host.value(&id, Capability::OnOff).await, Some(Value::Bool(true)));

        for raw in [Value::Integer(0), Value::Integer(2), Value::Bool(true)] {
            paired
                .handle_report(&AttributeReport::new(0, CLUSTER_ON_OFF, ATTR_ON_OFF, raw))
                .await
                .unwrap();
            assert_eq!(host.value(&id, Capability::OnOff).await, Some(Value::Bool(false)));
        }
    }

    #[tokio::test]
    async fn test_second_gang_does_not_drive_onoff() {
        let (paired, _node, host) = start(vec![
            Endpoint::new(0, [CLUSTER_ON_OFF]),
            Endpoint::new(1, [CLUSTER_ON_OFF]),
        ])
        .await;

        let outcome = paired
            .handle_report(&AttributeReport::new(1, CLUSTER_ON_OFF, ATTR_ON_OFF, 1))
            .await
            .unwrap();
        assert_eq!(outcome, ReportOutcome::Ignored);
        assert_eq!(host.value(paired.device().id(), Capability::OnOff).await, None);
    }

    #[tokio::test]
    async fn test_hub_can_switch_it() {
        let (paired, node, _host) = start(vec![Endpoint::new(0, [CLUSTER_ON_OFF])]).await;
        paired.set_capability(Capability::OnOff, Value::Bool(true)).await.unwrap();
        assert_eq!(node.commands().await[0].command, "on");
    }
}
