/*!
 * In-memory collaborators.
 *
 * Stand-ins for the mesh stack, the host application and the persisted store.
 * They record every call so drivers can be exercised without a radio.
 */
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::trace;

use meshdrivers_core::config::DriversConfig;
use meshdrivers_core::types::{Id, Value};

use crate::capability::Capability;
use crate::device::{DeviceError, DeviceInfo, MeshDevice, Result};
use crate::host::{CapabilityHost, DeviceStore, FlowHost, HostServices, Translator};
use crate::i18n::Catalog;
use crate::mesh::{Endpoint, MeshNode, MeshProtocol, NodeCommand, ReportConfig};

/// A mesh node kept in memory
#[derive(Debug)]
pub struct MemoryNode {
    id: Id,
    protocol: MeshProtocol,
    battery: bool,
    endpoints: Vec<Endpoint>,
    reject_reporting: bool,
    failing_binds: RwLock<HashSet<(u8, String)>>,
    binds: RwLock<Vec<(u8, String)>>,
    reporting: RwLock<Vec<ReportConfig>>,
    commands: RwLock<Vec<NodeCommand>>,
}

impl MemoryNode {
    /// Create a node with the given endpoints
    pub fn new<I: Into<Id>>(id: I, protocol: MeshProtocol, mut endpoints: Vec<Endpoint>) -> Self {
        endpoints.sort_by_key(|endpoint| endpoint.id);
        Self {
            id: id.into(),
            protocol,
            battery: false,
            endpoints,
            reject_reporting: false,
            failing_binds: RwLock::new(HashSet::new()),
            binds: RwLock::new(Vec::new()),
            reporting: RwLock::new(Vec::new()),
            commands: RwLock::new(Vec::new()),
        }
    }

    /// Mark the node as battery powered
    pub fn with_battery(mut self, battery: bool) -> Self {
        self.battery = battery;
        self
    }

    /// Make binds of a cluster on an endpoint fail
    pub fn failing_bind(mut self, endpoint: u8, cluster: &str) -> Self {
        self.failing_binds.get_mut().insert((endpoint, cluster.to_string()));
        self
    }

    /// Make every reporting configuration fail
    pub fn rejecting_reporting(mut self) -> Self {
        self.reject_reporting = true;
        self
    }

    /// Let all binds succeed from now on
    pub async fn clear_failures(&self) {
        self.failing_binds.write().await.clear();
    }

    /// Successful binds, in order
    pub async fn binds(&self) -> Vec<(u8, String)> {
        self.binds.read().await.clone()
    }

    /// Accepted reporting configurations, in order
    pub async fn reporting(&self) -> Vec<ReportConfig> {
        self.reporting.read().await.clone()
    }

    /// Commands sent to the node, in order
    pub async fn commands(&self) -> Vec<NodeCommand> {
        self.commands.read().await.clone()
    }
}

#[async_trait]
impl MeshNode for MemoryNode {
    fn node_id(&self) -> &Id {
        &self.id
    }

    fn protocol(&self) -> MeshProtocol {
        self.protocol
    }

    fn is_battery(&self) -> bool {
        self.battery
    }

    fn endpoints(&self) -> Vec<Endpoint> {
        self.endpoints.clone()
    }

    async fn bind(&self, endpoint: u8, cluster: &str) -> Result<()> {
        if self.failing_binds.read().await.contains(&(endpoint, cluster.to_string())) {
            return Err(DeviceError::BindFailed {
                endpoint,
                cluster: cluster.to_string(),
                reason: "no response from node".to_string(),
            });
        }
        trace!("bind {} on endpoint {}", cluster, endpoint);
        // Suspend like a radio round trip would.
        tokio::task::yield_now().await;
        self.binds.write().await.push((endpoint, cluster.to_string()));
        Ok(())
    }

    async fn configure_reporting(&self, config: &ReportConfig) -> Result<()> {
        if self.reject_reporting {
            return Err(DeviceError::ReportingFailed(format!(
                "{}/{} rejected by node",
                config.cluster, config.attribute
            )));
        }
        self.reporting.write().await.push(config.clone());
        Ok(())
    }

    async fn send_command(&self, command: NodeCommand) -> Result<()> {
        self.commands.write().await.push(command);
        Ok(())
    }
}

/// A flow trigger recorded by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    /// Card id
    pub card: String,
    /// Device the card fired for
    pub device: Id,
    /// Tokens passed to the card
    pub tokens: Option<Value>,
    /// State passed to the card
    pub state: Option<Value>,
    /// When the card fired
    pub at: DateTime<Utc>,
}

/// Host capability store and flow engine kept in memory
#[derive(Debug, Default)]
pub struct MemoryHost {
    declared: std::sync::RwLock<HashMap<Id, HashSet<Capability>>>,
    values: RwLock<HashMap<(Id, Capability), Value>>,
    history: RwLock<Vec<(Id, Capability, Value)>>,
    triggers: RwLock<Vec<TriggerRecord>>,
    failing_cards: std::sync::RwLock<HashSet<String>>,
}

impl MemoryHost {
    /// Create an empty host
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the capabilities a device was paired with
    pub fn declare<I: IntoIterator<Item = Capability>>(&self, device: &Id, capabilities: I) {
        if let Ok(mut declared) = self.declared.write() {
            declared.entry(device.clone()).or_default().extend(capabilities);
        }
    }

    /// Make a trigger card fail
    pub fn fail_card(&self, card: &str) {
        if let Ok(mut failing) = self.failing_cards.write() {
            failing.insert(card.to_string());
        }
    }

    /// The current value of a capability
    pub async fn value(&self, device: &Id, capability: Capability) -> Option<Value> {
        self.values.read().await.get(&(device.clone(), capability)).cloned()
    }

    /// Every capability write, in order
    pub async fn history(&self) -> Vec<(Id, Capability, Value)> {
        self.history.read().await.clone()
    }

    /// Every fired trigger, in order
    pub async fn triggers(&self) -> Vec<TriggerRecord> {
        self.triggers.read().await.clone()
    }
}

#[async_trait]
impl CapabilityHost for MemoryHost {
    async fn set_capability_value(&self, device: &Id, capability: Capability, value: Value) -> Result<()> {
        self.values
            .write()
            .await
            .insert((device.clone(), capability), value.clone());
        self.history.write().await.push((device.clone(), capability, value));
        Ok(())
    }

    fn has_capability(&self, device: &Id, capability: Capability) -> bool {
        self.declared
            .read()
            .map(|declared| declared.get(device).is_some_and(|caps| caps.contains(&capability)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FlowHost for MemoryHost {
    async fn trigger(&self, card: &str, device: &Id, tokens: Option<Value>, state: Option<Value>) -> Result<()> {
        let failing = self
            .failing_cards
            .read()
            .map(|failing| failing.contains(card))
            .unwrap_or(false);
        if failing {
            return Err(DeviceError::TriggerError(format!("card {} is unavailable", card)));
        }

        self.triggers.write().await.push(TriggerRecord {
            card: card.to_string(),
            device: device.clone(),
            tokens,
            state,
            at: Utc::now(),
        });
        Ok(())
    }
}

/// A persisted store kept in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn snapshot(&self) -> Result<HashMap<String, Value>> {
        Ok(self.values.read().await.clone())
    }
}

/// Host services backed by one [`MemoryHost`] and a catalog
pub fn memory_services(host: Arc<MemoryHost>, translator: Arc<dyn Translator>) -> HostServices {
    HostServices::new(host.clone(), host, translator)
}

/// Build a [`MeshDevice`] over a node with in-memory host services
///
/// The device id is the node id and the device is declared with the given
/// capabilities.
pub fn memory_device(
    node: Arc<MemoryNode>,
    store: Arc<MemoryStore>,
    capabilities: Vec<Capability>,
) -> (MeshDevice, Arc<MemoryHost>) {
    let host = Arc::new(MemoryHost::new());
    let id = node.node_id().clone();
    host.declare(&id, capabilities.iter().copied());

    let info = DeviceInfo::new(id.clone(), id.to_string(), "memory", node.protocol(), capabilities);
    let services = memory_services(host.clone(), Arc::new(Catalog::identity()));
    let device = MeshDevice::new(info, node, services, store, DriversConfig::default());
    (device, host)
}
