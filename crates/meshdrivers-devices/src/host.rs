/*!
 * Host application collaborators.
 *
 * The hub owns capability storage, flow cards, display strings and per-device
 * persistence. Drivers reach them only through these traits.
 */
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use meshdrivers_core::types::{Id, Value};

use crate::capability::Capability;
use crate::device::Result;

/// Capability value storage on the host
#[async_trait]
pub trait CapabilityHost: Send + Sync + Debug {
    /// Store a new value for a device capability
    async fn set_capability_value(&self, device: &Id, capability: Capability, value: Value) -> Result<()>;

    /// Check if the device was paired with a capability
    fn has_capability(&self, device: &Id, capability: Capability) -> bool;
}

/// Flow trigger cards on the host
#[async_trait]
pub trait FlowHost: Send + Sync + Debug {
    /// Fire a trigger card for a device
    ///
    /// `tokens` are exposed to the user's automation, `state` is matched
    /// against the card's arguments.
    async fn trigger(
        &self,
        card: &str,
        device: &Id,
        tokens: Option<Value>,
        state: Option<Value>,
    ) -> Result<()>;
}

/// Display string lookup
pub trait Translator: Send + Sync + Debug {
    /// Translate a key into the user's language
    fn translate(&self, key: &str) -> String;
}

/// Per-device persisted key/value store
#[async_trait]
pub trait DeviceStore: Send + Sync + Debug {
    /// Get a stored value
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// All stored values
    async fn snapshot(&self) -> Result<HashMap<String, Value>>;
}

/// The host services shared by every device
#[derive(Debug, Clone)]
pub struct HostServices {
    /// Capability storage
    pub capabilities: Arc<dyn CapabilityHost>,
    /// Flow cards
    pub flows: Arc<dyn FlowHost>,
    /// Display strings
    pub translator: Arc<dyn Translator>,
}

impl HostServices {
    /// Bundle host services
    pub fn new(
        capabilities: Arc<dyn CapabilityHost>,
        flows: Arc<dyn FlowHost>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            capabilities,
            flows,
            translator,
        }
    }
}
