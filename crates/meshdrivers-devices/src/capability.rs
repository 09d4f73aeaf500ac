/*!
 * Hub capabilities and their cluster bindings.
 */
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use meshdrivers_core::types::Value;

use crate::device::DeviceError;
use crate::mesh::{MeshProtocol, NodeCommand};

/// Zigbee on/off cluster
pub const CLUSTER_ON_OFF: &str = "genOnOff";
/// Zigbee level control cluster
pub const CLUSTER_LEVEL_CONTROL: &str = "genLevelCtrl";
/// Zigbee power configuration cluster
pub const CLUSTER_POWER_CONFIG: &str = "genPowerCfg";
/// Zigbee Green Power proxy cluster
pub const CLUSTER_GREEN_POWER_PROXY: &str = "genGreenPowerProxy";
/// Z-Wave binary switch command class
pub const COMMAND_CLASS_SWITCH_BINARY: &str = "SWITCH_BINARY";

/// On/off attribute of the on/off cluster
pub const ATTR_ON_OFF: &str = "onOff";
/// Remaining battery percentage attribute of the power configuration cluster
pub const ATTR_BATTERY_PERCENTAGE_REMAINING: &str = "batteryPercentageRemaining";

/// A device property the hub can read or control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// Switch state
    #[serde(rename = "onoff")]
    OnOff,
    /// Battery percentage
    #[serde(rename = "measure_battery")]
    MeasureBattery,
    /// Low battery alarm
    #[serde(rename = "alarm_battery")]
    AlarmBattery,
}

impl Capability {
    /// All capabilities
    pub const ALL: [Capability; 3] = [
        Capability::OnOff,
        Capability::MeasureBattery,
        Capability::AlarmBattery,
    ];

    /// Convert to the hub's capability id
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::OnOff => "onoff",
            Capability::MeasureBattery => "measure_battery",
            Capability::AlarmBattery => "alarm_battery",
        }
    }

    /// Whether the hub can set this capability on the device
    pub fn is_settable(&self) -> bool {
        matches!(self, Capability::OnOff)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|capability| capability.as_str() == s)
            .ok_or_else(|| DeviceError::CapabilityNotSupported(s.to_string()))
    }
}

/// A capability backed by a cluster, as registered by a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityBinding {
    /// The capability
    pub capability: Capability,
    /// Cluster or command class carrying it
    pub cluster: String,
    /// Endpoint the cluster was found on
    pub endpoint: u8,
}

impl CapabilityBinding {
    /// Translate an attribute report on the bound cluster into a capability value
    ///
    /// Returns `None` for attributes the capability does not track.
    pub fn report_value(&self, attribute: &str, value: &Value) -> Option<Value> {
        match (self.capability, self.cluster.as_str()) {
            (Capability::OnOff, CLUSTER_ON_OFF) if attribute == ATTR_ON_OFF => switch_state(value),
            (Capability::OnOff, COMMAND_CLASS_SWITCH_BINARY) => switch_state(value),
            (Capability::MeasureBattery, CLUSTER_POWER_CONFIG)
                if attribute == ATTR_BATTERY_PERCENTAGE_REMAINING =>
            {
                value.as_integer().map(Value::Integer)
            }
            _ => None,
        }
    }

    /// Build the node command that applies a capability value set by the hub
    pub fn set_command(&self, protocol: MeshProtocol, value: &Value) -> Result<NodeCommand, DeviceError> {
        if !self.capability.is_settable() {
            return Err(DeviceError::CapabilityNotSettable(self.capability.to_string()));
        }

        let on = value.as_bool().ok_or_else(|| {
            DeviceError::InvalidValueType(
                self.capability.to_string(),
                "boolean".to_string(),
                value.to_string(),
            )
        })?;

        let (command, parameters) = match protocol {
            MeshProtocol::Zigbee => (if on { "on" } else { "off" }, Value::Null),
            MeshProtocol::ZWave => {
                let mut parameters = std::collections::HashMap::new();
                parameters.insert("Switch Value".to_string(), Value::Integer(if on { 255 } else { 0 }));
                ("SWITCH_BINARY_SET", Value::Object(parameters))
            }
        };

        Ok(NodeCommand {
            endpoint: self.endpoint,
            cluster: self.cluster.clone(),
            command: command.to_string(),
            parameters,
        })
    }
}

fn switch_state(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        other => other.as_integer().map(|i| Value::Bool(i != 0)),
    }
}
