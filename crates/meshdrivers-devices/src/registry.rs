/*!
 * Device registry.
 *
 * Keeps the driver catalog and every paired device, and routes mesh traffic
 * and hub requests to the driver handling the device.
 */
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use meshdrivers_core::config::SharedConfig;
use meshdrivers_core::types::{Id, Value};

use crate::capability::Capability;
use crate::device::{DeviceError, DeviceInfo, MeshDevice, Result};
use crate::driver::{Driver, DriverDevice, ReportOutcome};
use crate::flow::{AutocompleteItem, AutocompleteKind};
use crate::host::{DeviceStore, HostServices};
use crate::mesh::{AttributeReport, ClusterCommand, MeshNode};

/// Event types for device registry
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// A device was paired and initialised
    DeviceAdded(DeviceInfo),
    /// A device was removed
    DeviceRemoved(Id),
}

/// Device registry
#[derive(Debug)]
pub struct DeviceRegistry {
    config: SharedConfig,
    host: HostServices,
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    devices: RwLock<HashMap<Id, Arc<DriverDevice>>>,
    pairing: Mutex<HashSet<Id>>,
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl DeviceRegistry {
    /// Create a new device registry
    pub fn new(config: SharedConfig, host: HostServices) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        Self {
            config,
            host,
            drivers: RwLock::new(HashMap::new()),
            devices: RwLock::new(HashMap::new()),
            pairing: Mutex::new(HashSet::new()),
            event_sender,
        }
    }

    /// Create a registry with every built-in driver
    pub fn with_builtin_drivers(config: SharedConfig, host: HostServices) -> Result<Self> {
        let registry = Self::new(config, host);
        for driver in crate::drivers::builtin() {
            registry.register_driver(driver)?;
        }
        Ok(registry)
    }

    fn lock_error(what: &str) -> DeviceError {
        DeviceError::Other(format!("Failed to acquire lock on {}", what))
    }

    /// Add a driver to the catalog, replacing one with the same id
    pub fn register_driver(&self, driver: Arc<dyn Driver>) -> Result<()> {
        let mut drivers = self.drivers.write().map_err(|_| Self::lock_error("driver catalog"))?;
        let id = driver.id().to_string();
        if drivers.insert(id.clone(), driver).is_some() {
            warn!("Replaced driver {}", id);
        } else {
            debug!("Registered driver {}", id);
        }
        Ok(())
    }

    /// Look up a driver by id
    pub fn driver(&self, id: &str) -> Result<Arc<dyn Driver>> {
        let drivers = self.drivers.read().map_err(|_| Self::lock_error("driver catalog"))?;
        drivers
            .get(id)
            .cloned()
            .ok_or_else(|| DeviceError::DriverNotFound(id.to_string()))
    }

    /// Ids of the drivers in the catalog, sorted
    pub fn driver_ids(&self) -> Result<Vec<String>> {
        let drivers = self.drivers.read().map_err(|_| Self::lock_error("driver catalog"))?;
        let mut ids: Vec<_> = drivers.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Pair a node with a driver and run the driver's init
    ///
    /// The id is reserved before init runs, so a concurrent pairing of the
    /// same id is rejected without touching the node.
    pub async fn add_device(
        &self,
        driver_id: &str,
        mut info: DeviceInfo,
        node: Arc<dyn MeshNode>,
        store: Arc<dyn DeviceStore>,
    ) -> Result<Id> {
        let driver = self.driver(driver_id)?;
        let id = info.id.clone();
        self.reserve(&id)?;

        info.driver_id = driver_id.to_string();
        let settings = self.config.get().drivers.clone();
        let device = MeshDevice::new(info.clone(), node, self.host.clone(), store, settings);
        let paired = Arc::new(DriverDevice::new(driver, device));
        paired.init().await;

        let inserted = self
            .devices
            .write()
            .map_err(|_| Self::lock_error("device registry"))
            .map(|mut devices| {
                devices.insert(id.clone(), paired);
            });
        self.release(&id);
        inserted?;

        info!("Added {} device {}", driver_id, id);
        let _ = self.event_sender.send(RegistryEvent::DeviceAdded(info));
        Ok(id)
    }

    fn reserve(&self, id: &Id) -> Result<()> {
        let mut pairing = self.pairing.lock().map_err(|_| Self::lock_error("pairing set"))?;
        if pairing.contains(id) || self.has_device(id)? {
            return Err(DeviceError::AlreadyRegistered(id.clone()));
        }
        pairing.insert(id.clone());
        Ok(())
    }

    fn release(&self, id: &Id) {
        if let Ok(mut pairing) = self.pairing.lock() {
            pairing.remove(id);
        }
    }

    /// Remove a paired device
    pub fn remove_device(&self, id: &Id) -> Result<()> {
        let mut devices = self.devices.write().map_err(|_| Self::lock_error("device registry"))?;
        if devices.remove(id).is_none() {
            return Err(DeviceError::DeviceNotFound(id.clone()));
        }

        let _ = self.event_sender.send(RegistryEvent::DeviceRemoved(id.clone()));
        debug!("Removed device {}", id);
        Ok(())
    }

    /// Get a device by ID
    pub fn get_device(&self, id: &Id) -> Result<Arc<DriverDevice>> {
        let devices = self.devices.read().map_err(|_| Self::lock_error("device registry"))?;
        devices
            .get(id)
            .cloned()
            .ok_or_else(|| DeviceError::DeviceNotFound(id.clone()))
    }

    /// Get all device IDs
    pub fn device_ids(&self) -> Result<Vec<Id>> {
        let devices = self.devices.read().map_err(|_| Self::lock_error("device registry"))?;
        Ok(devices.keys().cloned().collect())
    }

    /// Count paired devices
    pub fn count_devices(&self) -> Result<usize> {
        let devices = self.devices.read().map_err(|_| Self::lock_error("device registry"))?;
        Ok(devices.len())
    }

    /// Check if a device is paired
    pub fn has_device(&self, id: &Id) -> Result<bool> {
        let devices = self.devices.read().map_err(|_| Self::lock_error("device registry"))?;
        Ok(devices.contains_key(id))
    }

    /// Deliver an attribute report from a node
    pub async fn dispatch_report(&self, id: &Id, report: &AttributeReport) -> Result<ReportOutcome> {
        let device = self.get_device(id)?;
        device.handle_report(report).await.map_err(|e| {
            warn!("Report {}/{} for {} failed: {}", report.cluster, report.attribute, id, e);
            e
        })
    }

    /// Deliver a cluster command sent by a node
    pub async fn dispatch_command(&self, id: &Id, command: &ClusterCommand) -> Result<()> {
        let device = self.get_device(id)?;
        device.handle_command(command).await.map_err(|e| {
            warn!("Command {} from {} failed: {}", command.attr, id, e);
            e
        })
    }

    /// Set a capability from the hub
    pub async fn set_capability(&self, id: &Id, capability: Capability, value: Value) -> Result<()> {
        let device = self.get_device(id)?;
        device.set_capability(capability, value).await.map_err(|e| {
            warn!("Setting {} on {} failed: {}", capability, id, e);
            e
        })
    }

    /// Flow card argument suggestions for a device
    pub async fn autocomplete(&self, id: &Id, kind: AutocompleteKind, query: &str) -> Result<Vec<AutocompleteItem>> {
        let device = self.get_device(id)?;
        device.autocomplete(kind, query).await
    }

    /// Subscribe to registry events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }
}
