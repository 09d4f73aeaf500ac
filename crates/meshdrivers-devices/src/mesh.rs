/*!
 * Mesh network collaborator.
 *
 * The Zigbee and Z-Wave stacks live outside this crate. Drivers only see a
 * node through [`MeshNode`]: its endpoints and clusters, bind and reporting
 * requests, and outgoing cluster commands. Z-Wave command classes are treated
 * as clusters on endpoint 0.
 */
use std::fmt::{self, Debug};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use meshdrivers_core::types::{Id, Value};

use crate::device::Result;

/// The mesh technology a node is paired over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshProtocol {
    /// Zigbee
    Zigbee,
    /// Z-Wave
    ZWave,
}

impl MeshProtocol {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshProtocol::Zigbee => "zigbee",
            MeshProtocol::ZWave => "zwave",
        }
    }
}

impl fmt::Display for MeshProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An addressable sub-unit of a node and the clusters it exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint id
    pub id: u8,
    /// Names of the clusters on this endpoint (e.g. `genOnOff`)
    pub clusters: Vec<String>,
}

impl Endpoint {
    /// Create an endpoint exposing the given clusters
    pub fn new<I, S>(id: u8, clusters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            clusters: clusters.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if the endpoint exposes a cluster
    pub fn has_cluster(&self, cluster: &str) -> bool {
        self.clusters.iter().any(|c| c == cluster)
    }
}

/// Attribute reporting request, passed to the mesh unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Cluster name
    pub cluster: String,
    /// Attribute name
    pub attribute: String,
    /// Minimum reporting interval in seconds
    pub min_interval: u16,
    /// Maximum reporting interval in seconds
    pub max_interval: u16,
    /// Minimum change that triggers a report
    pub min_change: u32,
    /// Endpoint the attribute lives on
    pub endpoint: u8,
}

/// An attribute value pushed from the device to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeReport {
    /// Source endpoint
    pub endpoint: u8,
    /// Cluster name
    pub cluster: String,
    /// Attribute name
    pub attribute: String,
    /// Raw attribute value
    pub value: Value,
}

impl AttributeReport {
    /// Create a new report
    pub fn new<C: Into<String>, A: Into<String>>(
        endpoint: u8,
        cluster: C,
        attribute: A,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            endpoint,
            cluster: cluster.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// A cluster command sent by a remote (e.g. a wall controller) to the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCommand {
    /// Endpoint the command was sent from
    pub endpoint: u8,
    /// Command name (e.g. `on`, `moveWithOnOff`)
    pub attr: String,
    /// Command payload
    #[serde(default)]
    pub value: Value,
}

impl ClusterCommand {
    /// Create a new command
    pub fn new<S: Into<String>>(endpoint: u8, attr: S, value: Value) -> Self {
        Self {
            endpoint,
            attr: attr.into(),
            value,
        }
    }

    /// The `movemode` field of a move command payload, if present
    pub fn movemode(&self) -> Option<i64> {
        self.value.field("movemode").and_then(Value::as_integer)
    }
}

/// A command sent from the hub to a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommand {
    /// Target endpoint
    pub endpoint: u8,
    /// Cluster or command class name
    pub cluster: String,
    /// Command name
    pub command: String,
    /// Command parameters
    pub parameters: Value,
}

/// A paired mesh node as seen by a driver
#[async_trait]
pub trait MeshNode: Send + Sync + Debug {
    /// Get the node ID
    fn node_id(&self) -> &Id;

    /// Get the mesh protocol
    fn protocol(&self) -> MeshProtocol;

    /// Whether the node runs on battery
    fn is_battery(&self) -> bool;

    /// Get the node's endpoints in ascending id order
    fn endpoints(&self) -> Vec<Endpoint>;

    /// The first endpoint exposing a cluster
    fn cluster_endpoint(&self, cluster: &str) -> Option<u8> {
        self.endpoints()
            .into_iter()
            .find(|endpoint| endpoint.has_cluster(cluster))
            .map(|endpoint| endpoint.id)
    }

    /// Bind a cluster on an endpoint to the hub
    async fn bind(&self, endpoint: u8, cluster: &str) -> Result<()>;

    /// Ask the node to report an attribute
    async fn configure_reporting(&self, config: &ReportConfig) -> Result<()>;

    /// Send a command to the node
    async fn send_command(&self, command: NodeCommand) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_clusters() {
        let endpoint = Endpoint::new(1, ["genOnOff", "genLevelCtrl"]);
        assert!(endpoint.has_cluster("genLevelCtrl"));
        assert!(!endpoint.has_cluster("genPowerCfg"));
    }

    #[test]
    fn test_command_movemode() {
        let command: ClusterCommand = serde_json::from_str(
            r#"{"endpoint": 0, "attr": "moveWithOnOff", "value": {"movemode": 1, "rate": 50}}"#,
        )
        .unwrap();
        assert_eq!(command.movemode(), Some(1));

        let command: ClusterCommand =
            serde_json::from_str(r#"{"endpoint": 2, "attr": "on"}"#).unwrap();
        assert_eq!(command.value, Value::Null);
        assert_eq!(command.movemode(), None);
    }

    #[test]
    fn test_protocol_display() {
        assert_eq!(MeshProtocol::Zigbee.to_string(), "zigbee");
        assert_eq!(MeshProtocol::ZWave.as_str(), "zwave");
    }
}
