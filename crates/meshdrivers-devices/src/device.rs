/*!
 * The mesh device a driver operates on.
 *
 * [`MeshDevice`] composes a paired [`MeshNode`] with the host services and
 * the device's persisted store. It carries everything a driver registers at
 * init time: capability bindings and attribute report listeners.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use meshdrivers_core::{
    config::DriversConfig,
    error::Error as CoreError,
    types::{Id, Value},
};

use crate::capability::{Capability, CapabilityBinding};
use crate::host::{DeviceStore, HostServices};
use crate::mesh::{MeshNode, MeshProtocol, ReportConfig};

/// Error type for device operations
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The capability is not known to the hub
    #[error("Capability not supported: {0}")]
    CapabilityNotSupported(String),

    /// The capability was never registered on this device
    #[error("Capability not registered: {0}")]
    CapabilityNotRegistered(String),

    /// The capability cannot be set by the hub
    #[error("Capability is read-only: {0}")]
    CapabilityNotSettable(String),

    /// The value type is not valid for the capability
    #[error("Invalid value type for {0}: expected {1}, got {2}")]
    InvalidValueType(String, String, String),

    /// No endpoint on the node exposes the cluster
    #[error("Cluster {0} not found on any endpoint")]
    ClusterNotFound(String),

    /// A command came from an endpoint with no button mapping
    #[error("No button mapped to endpoint {0}")]
    UnknownButton(u8),

    /// A command resolved to a key with no scene mapping
    #[error("No scene mapped to command {0}")]
    UnknownScene(String),

    /// Binding a cluster failed
    #[error("Bind failed for {cluster} on endpoint {endpoint}: {reason}")]
    BindFailed {
        /// Endpoint id
        endpoint: u8,
        /// Cluster name
        cluster: String,
        /// Failure reported by the mesh
        reason: String,
    },

    /// Configuring attribute reporting failed
    #[error("Reporting configuration failed: {0}")]
    ReportingFailed(String),

    /// A flow card could not be triggered
    #[error("Flow trigger error: {0}")]
    TriggerError(String),

    /// No driver with the given id
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// No paired device with the given id
    #[error("Device not found: {0}")]
    DeviceNotFound(Id),

    /// A device with the id is already paired
    #[error("Device already registered: {0}")]
    AlreadyRegistered(Id),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),

    /// Core error
    #[error("Core error: {0}")]
    CoreError(#[from] CoreError),
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Device information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// The device ID
    pub id: Id,
    /// The device name
    pub name: String,
    /// The id of the driver handling the device
    pub driver_id: String,
    /// The mesh protocol
    pub protocol: MeshProtocol,
    /// Capabilities the device was paired with
    pub capabilities: Vec<Capability>,
    /// When the device was paired
    pub paired_at: DateTime<Utc>,
}

impl DeviceInfo {
    /// Create device information for a freshly paired device
    pub fn new<S: Into<String>, D: Into<String>>(
        id: Id,
        name: S,
        driver_id: D,
        protocol: MeshProtocol,
        capabilities: Vec<Capability>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            driver_id: driver_id.into(),
            protocol,
            capabilities,
            paired_at: Utc::now(),
        }
    }
}

/// Registrations a driver made during init
#[derive(Debug, Default)]
struct Registrations {
    debug: bool,
    bindings: Vec<CapabilityBinding>,
    listeners: HashMap<(u8, String, String), ReportConfig>,
}

/// A paired mesh device with its collaborators
#[derive(Debug)]
pub struct MeshDevice {
    info: DeviceInfo,
    node: Arc<dyn MeshNode>,
    host: HostServices,
    store: Arc<dyn DeviceStore>,
    settings: DriversConfig,
    registrations: RwLock<Registrations>,
}

impl MeshDevice {
    /// Create a new mesh device
    pub fn new(
        info: DeviceInfo,
        node: Arc<dyn MeshNode>,
        host: HostServices,
        store: Arc<dyn DeviceStore>,
        settings: DriversConfig,
    ) -> Self {
        let registrations = Registrations {
            debug: settings.force_debug,
            ..Registrations::default()
        };
        Self {
            info,
            node,
            host,
            store,
            settings,
            registrations: RwLock::new(registrations),
        }
    }

    /// Get the device information
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Get the device ID
    pub fn id(&self) -> &Id {
        &self.info.id
    }

    /// Get the device name
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Get the paired node
    pub fn node(&self) -> &Arc<dyn MeshNode> {
        &self.node
    }

    /// Get the driver settings
    pub fn settings(&self) -> &DriversConfig {
        &self.settings
    }

    /// Turn on debug diagnostics for this device
    pub async fn enable_debug(&self) {
        self.registrations.write().await.debug = true;
        debug!("Debug enabled for {}", self.info.id);
    }

    /// Whether debug diagnostics are on
    pub async fn is_debug(&self) -> bool {
        self.registrations.read().await.debug
    }

    /// Log the node's endpoints and clusters
    pub fn print_node(&self) {
        info!("------------------------------------------");
        info!("Node: {}", self.node.node_id());
        info!("- Protocol: {}", self.node.protocol());
        info!("- Battery: {}", self.node.is_battery());
        let endpoints = self.node.endpoints();
        info!("- Endpoints: {}", endpoints.len());
        for endpoint in endpoints {
            info!("-- Endpoint {} clusters:", endpoint.id);
            for cluster in &endpoint.clusters {
                info!("--- {}", cluster);
            }
        }
        info!("------------------------------------------");
    }

    /// Back a capability with a cluster
    ///
    /// Reports on the cluster without an explicit listener update the
    /// capability, and the hub can set the capability through it.
    pub async fn register_capability(&self, capability: Capability, cluster: &str) -> Result<()> {
        let endpoint = self
            .node
            .cluster_endpoint(cluster)
            .ok_or_else(|| DeviceError::ClusterNotFound(cluster.to_string()))?;

        let mut registrations = self.registrations.write().await;
        registrations.bindings.retain(|b| b.capability != capability);
        registrations.bindings.push(CapabilityBinding {
            capability,
            cluster: cluster.to_string(),
            endpoint,
        });

        if registrations.debug {
            debug!("Registered capability {} on {} (endpoint {})", capability, cluster, endpoint);
        }
        Ok(())
    }

    /// Route reports of an attribute to the driver and ask the node to report it
    ///
    /// Only reports from `endpoint` reach the listener. The listener stays registered even when the node rejects the reporting
    /// configuration; unsolicited reports are still delivered.
    pub async fn register_attr_report_listener(
        &self,
        cluster: &str,
        attribute: &str,
        min_interval: u16,
        max_interval: u16,
        min_change: u32,
        endpoint: u8,
    ) -> Result<()> {
        let config = ReportConfig {
            cluster: cluster.to_string(),
            attribute: attribute.to_string(),
            min_interval,
            max_interval,
            min_change,
            endpoint,
        };

        self.registrations
            .write()
            .await
            .listeners
            .insert((endpoint, cluster.to_string(), attribute.to_string()), config.clone());

        self.node.configure_reporting(&config).await
    }

    /// Check if an attribute on an endpoint has a registered listener
    pub async fn listens_to(&self, endpoint: u8, cluster: &str, attribute: &str) -> bool {
        self.registrations
            .read()
            .await
            .listeners
            .contains_key(&(endpoint, cluster.to_string(), attribute.to_string()))
    }

    /// The capability binding for a cluster on an endpoint, if any
    pub async fn binding_for_cluster(&self, endpoint: u8, cluster: &str) -> Option<CapabilityBinding> {
        self.registrations
            .read()
            .await
            .bindings
            .iter()
            .find(|b| b.endpoint == endpoint && b.cluster == cluster)
            .cloned()
    }

    /// The binding registered for a capability, if any
    pub async fn binding_for_capability(&self, capability: Capability) -> Option<CapabilityBinding> {
        self.registrations
            .read()
            .await
            .bindings
            .iter()
            .find(|b| b.capability == capability)
            .cloned()
    }

    /// Bind the listed clusters on every endpoint that exposes them
    ///
    /// Each (endpoint, cluster) pair is bound at most once: a successful bind
    /// persists `"{endpoint}_{cluster}_bind" = true` and later calls skip it.
    /// Failures are logged and left unset. Returns the number of new binds.
    pub async fn bind_clusters(&self, clusters: &[&str]) -> usize {
        let mut pending = Vec::new();
        for endpoint in self.node.endpoints() {
            debug!("- Endpoint: {}", endpoint.id);
            for cluster in clusters.iter().copied().filter(|c| endpoint.has_cluster(c)) {
                let key = bind_key(endpoint.id, cluster);
                match self.get_store_value(&key).await {
                    Ok(Some(Value::Bool(true))) => {
                        debug!("{} already bound on endpoint {}", cluster, endpoint.id);
                    }
                    Ok(_) => pending.push((endpoint.id, cluster, key)),
                    Err(e) => warn!("Could not read bind flag {}: {}", key, e),
                }
            }
        }

        let attempts = pending.into_iter().map(|(endpoint, cluster, key)| async move {
            debug!("binding: {} on endpoint {}", cluster, endpoint);
            match self.node.bind(endpoint, cluster).await {
                Ok(()) => match self.set_store_value(&key, Value::Bool(true)).await {
                    Ok(()) => {
                        info!("Registered {} cluster on endpoint {}", cluster, endpoint);
                        true
                    }
                    Err(e) => {
                        warn!("Bound {} on endpoint {} but could not persist flag: {}", cluster, endpoint, e);
                        true
                    }
                },
                Err(e) => {
                    warn!(
                        "Something went wrong while binding the {} cluster on endpoint {}: {}",
                        cluster, endpoint, e
                    );
                    false
                }
            }
        });

        join_all(attempts).await.into_iter().filter(|bound| *bound).count()
    }

    /// Store a new capability value on the host
    pub async fn set_capability_value(&self, capability: Capability, value: Value) -> Result<()> {
        if self.is_debug().await {
            debug!("{} = {}", capability, value);
        }
        self.host
            .capabilities
            .set_capability_value(&self.info.id, capability, value)
            .await
    }

    /// Check if the device was paired with a capability
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.host.capabilities.has_capability(&self.info.id, capability)
    }

    /// Get a persisted value
    pub async fn get_store_value(&self, key: &str) -> Result<Option<Value>> {
        self.store.get(key).await
    }

    /// Persist a value
    pub async fn set_store_value(&self, key: &str, value: Value) -> Result<()> {
        self.store.set(key, value).await
    }

    /// All persisted values
    pub async fn store_snapshot(&self) -> Result<HashMap<String, Value>> {
        self.store.snapshot().await
    }

    /// Fire a flow trigger card for this device
    pub async fn trigger_flow(&self, card: &str, tokens: Option<Value>, state: Option<Value>) -> Result<()> {
        self.host.flows.trigger(card, &self.info.id, tokens, state).await
    }

    /// Translate a display string
    pub fn translate(&self, key: &str) -> String {
        self.host.translator.translate(key)
    }

    /// The host's translator
    pub fn translator(&self) -> &dyn crate::host::Translator {
        self.host.translator.as_ref()
    }
}

/// Store key marking a completed bind
pub fn bind_key(endpoint: u8, cluster: &str) -> String {
    format!("{}_{}_bind", endpoint, cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, CLUSTER_POWER_CONFIG};
    use crate::memory::{memory_device, MemoryNode, MemoryStore};
    use crate::mesh::Endpoint;

    fn remote_node() -> MemoryNode {
        MemoryNode::new(
            "remote",
            MeshProtocol::Zigbee,
            vec![
                Endpoint::new(0, [CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL, CLUSTER_POWER_CONFIG]),
                Endpoint::new(1, [CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL]),
            ],
        )
        .with_battery(true)
    }

    #[test]
    fn test_bind_key_format() {
        assert_eq!(bind_key(0, "genOnOff"), "0_genOnOff_bind");
    }

    #[tokio::test]
    async fn test_bind_clusters_binds_each_pair_once() {
        let node = Arc::new(remote_node());
        let store = Arc::new(MemoryStore::new());
        let (device, _host) = memory_device(node.clone(), store.clone(), vec![]);

        let bound = device.bind_clusters(&[CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL]).await;
        assert_eq!(bound, 4);
        assert_eq!(node.binds().await.len(), 4);
        assert_eq!(store.get("1_genLevelCtrl_bind").await.unwrap(), Some(Value::Bool(true)));

        // A second init must not bind again.
        let bound = device.bind_clusters(&[CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL]).await;
        assert_eq!(bound, 0);
        assert_eq!(node.binds().await.len(), 4);
    }

    #[tokio::test]
    async fn test_bind_clusters_skips_absent_clusters() {
        let node = Arc::new(remote_node());
        let (device, _host) = memory_device(node.clone(), Arc::new(MemoryStore::new()), vec![]);

        let bound = device.bind_clusters(&[CLUSTER_POWER_CONFIG]).await;
        assert_eq!(bound, 1);
        assert_eq!(node.binds().await, vec![(0, CLUSTER_POWER_CONFIG.to_string())]);
    }

    #[tokio::test]
    async fn test_failed_bind_is_retried_on_next_init() {
        let node = Arc::new(remote_node().failing_bind(1, CLUSTER_ON_OFF));
        let store = Arc::new(MemoryStore::new());
        let (device, _host) = memory_device(node.clone(), store.clone(), vec![]);

        assert_eq!(device.bind_clusters(&[CLUSTER_ON_OFF]).await, 1);
        assert_eq!(store.get("1_genOnOff_bind").await.unwrap(), None);

        node.clear_failures().await;
        assert_eq!(device.bind_clusters(&[CLUSTER_ON_OFF]).await, 1);
        assert_eq!(store.get("1_genOnOff_bind").await.unwrap(), Some(Value::Bool(true)));
        assert_eq!(device.bind_clusters(&[CLUSTER_ON_OFF]).await, 0);
    }

    #[tokio::test]
    async fn test_register_capability_requires_cluster() {
        let (device, _host) = memory_device(Arc::new(remote_node()), Arc::new(MemoryStore::new()), vec![]);

        device.register_capability(Capability::MeasureBattery, CLUSTER_POWER_CONFIG).await.unwrap();
        let binding = device.binding_for_capability(Capability::MeasureBattery).await.unwrap();
        assert_eq!(binding.endpoint, 0);
        assert!(device.binding_for_cluster(0, CLUSTER_POWER_CONFIG).await.is_some());
        assert!(device.binding_for_cluster(1, CLUSTER_POWER_CONFIG).await.is_none());

        assert!(matches!(
            device.register_capability(Capability::OnOff, "SWITCH_BINARY").await,
            Err(DeviceError::ClusterNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_report_listener_passes_parameters_through() {
        let node = Arc::new(remote_node());
        let (device, _host) = memory_device(node.clone(), Arc::new(MemoryStore::new()), vec![]);

        device
            .register_attr_report_listener(CLUSTER_POWER_CONFIG, "batteryPercentageRemaining", 10, 60, 1, 0)
            .await
            .unwrap();

        assert!(device.listens_to(0, CLUSTER_POWER_CONFIG, "batteryPercentageRemaining").await);
        assert!(!device.listens_to(1, CLUSTER_POWER_CONFIG, "batteryPercentageRemaining").await);
        assert!(!device.listens_to(0, CLUSTER_POWER_CONFIG, "batteryVoltage").await);
        let configs = node.reporting().await;
        assert_eq!(configs.len(), 1);
        assert_eq!((configs[0].min_interval, configs[0].max_interval, configs[0].min_change), (10, 60, 1));
    }

    #[tokio::test]
    async fn test_listener_survives_rejected_reporting() {
        let node = Arc::new(remote_node().rejecting_reporting());
        let (device, _host) = memory_device(node, Arc::new(MemoryStore::new()), vec![]);

        let result = device
            .register_attr_report_listener(CLUSTER_ON_OFF, "onOff", 1, 300, 1, 0)
            .await;
        assert!(matches!(result, Err(DeviceError::ReportingFailed(_))));
        assert!(device.listens_to(0, CLUSTER_ON_OFF, "onOff").await);
    }

    #[tokio::test]
    async fn test_debug_flag() {
        let (device, _host) = memory_device(Arc::new(remote_node()), Arc::new(MemoryStore::new()), vec![]);
        assert!(!device.is_debug().await);
        device.enable_debug().await;
        assert!(device.is_debug().await);
    }
}
