/*!
 * Zigbee wall controllers (`ZB_WallController_2`, `ZB_WallController_8`).
 *
 * Battery powered remotes. Every key press arrives as an `onOff` or
 * `levelCtrl` cluster command from the endpoint of the pressed button group
 * and fires two trigger cards: one matched on button and scene, one carrying
 * them as tokens.
 */
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::capability::{
    Capability, ATTR_BATTERY_PERCENTAGE_REMAINING, CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF,
    CLUSTER_POWER_CONFIG,
};
use crate::device::{DeviceError, MeshDevice, Result};
use crate::driver::{Driver, DriverManifest};
use crate::drivers::battery::apply_battery_report;
use crate::flow::{
    autocomplete, AutocompleteItem, AutocompleteKind, RemoteValue, WALL_CONTROLLER_BUTTON_CARD,
    WALL_CONTROLLER_SCENE_CARD,
};
use crate::mesh::{AttributeReport, ClusterCommand, MeshProtocol};

/// Driver id of the two button model
pub const TWO_BUTTON_ID: &str = "ZB_WallController_2";
/// Driver id of the eight button model
pub const EIGHT_BUTTON_ID: &str = "ZB_WallController_8";

const MOVE_WITH_ON_OFF: &str = "moveWithOnOff";

/// Command keys and the scenes they stand for, in display order
const SCENES: [(&str, &str); 5] = [
    ("on", "Switched ON"),
    ("off", "Switched OFF"),
    ("moveWithOnOff_move_up", "Dimming UP"),
    ("moveWithOnOff_move_down", "Dimming DOWN"),
    ("stopWithOnOff", "Dimming STOP"),
];

/// Derive the scene table key of a command
///
/// Move commands are split on direction: `movemode == 1` is up, anything
/// else (including a missing payload) is down.
pub fn scene_key(command: &ClusterCommand) -> String {
    if command.attr == MOVE_WITH_ON_OFF {
        let direction = if command.movemode() == Some(1) { "up" } else { "down" };
        format!("{}_move_{}", MOVE_WITH_ON_OFF, direction)
    } else {
        command.attr.clone()
    }
}

/// Zigbee wall controller driver
#[derive(Debug, Clone)]
pub struct WallController {
    manifest: DriverManifest,
    buttons: Vec<(u8, String)>,
    debug: bool,
}

impl WallController {
    fn new(id: &str, name: &str, groups: u8, debug: bool) -> Self {
        Self {
            manifest: DriverManifest {
                id: id.to_string(),
                name: name.to_string(),
                protocol: MeshProtocol::Zigbee,
                capabilities: vec![Capability::MeasureBattery, Capability::AlarmBattery],
            },
            buttons: (0..groups).map(|i| (i, format!("Group{}", i + 1))).collect(),
            debug,
        }
    }

    /// The two button model, a single group on endpoint 0
    pub fn two_button() -> Self {
        Self::new(TWO_BUTTON_ID, "Wall Controller (2 buttons)", 1, true)
    }

    /// The eight button model, four groups on endpoints 0 to 3
    pub fn eight_button() -> Self {
        Self::new(EIGHT_BUTTON_ID, "Wall Controller (8 buttons)", 4, false)
    }

    /// Label of the button group on an endpoint
    pub fn button(&self, endpoint: u8) -> Option<&str> {
        self.buttons
            .iter()
            .find(|(id, _)| *id == endpoint)
            .map(|(_, label)| label.as_str())
    }

    /// Label of the scene for a command key
    pub fn scene(&self, key: &str) -> Option<&'static str> {
        SCENES.iter().find(|(k, _)| *k == key).map(|(_, label)| *label)
    }

    /// Resolve a command to the pressed button and scene
    pub fn resolve(&self, command: &ClusterCommand) -> Result<RemoteValue> {
        let button = self
            .button(command.endpoint)
            .ok_or(DeviceError::UnknownButton(command.endpoint))?;
        let key = scene_key(command);
        let scene = self.scene(&key).ok_or(DeviceError::UnknownScene(key))?;
        Ok(RemoteValue {
            button: button.to_string(),
            scene: scene.to_string(),
        })
    }
}

#[async_trait]
impl Driver for WallController {
    fn manifest(&self) -> &DriverManifest {
        &self.manifest
    }

    async fn on_mesh_init(&self, device: &MeshDevice) -> Result<()> {
        if self.debug {
            device.enable_debug().await;
            device.print_node();
        }

        match device.store_snapshot().await {
            Ok(store) => debug!("store: {:?}", store),
            Err(e) => warn!("could not read store: {}", e),
        }

        if let Err(e) = device
            .register_capability(Capability::MeasureBattery, CLUSTER_POWER_CONFIG)
            .await
        {
            warn!("failed to register measure_battery capability: {}", e);
        }

        let intervals = &device.settings().battery_report;
        match device
            .register_attr_report_listener(
                CLUSTER_POWER_CONFIG,
                ATTR_BATTERY_PERCENTAGE_REMAINING,
                intervals.min_interval,
                intervals.max_interval,
                intervals.min_change,
                0,
            )
            .await
        {
            Ok(()) => info!("registered attr report listener"),
            Err(e) => warn!("failed to register attr report listener: {}", e),
        }

        device.bind_clusters(&[CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL]).await;
        Ok(())
    }

    async fn on_attribute_report(&self, device: &MeshDevice, report: &AttributeReport) -> Result<()> {
        if report.cluster == CLUSTER_POWER_CONFIG && report.attribute == ATTR_BATTERY_PERCENTAGE_REMAINING {
            apply_battery_report(device, &report.value).await?;
        }
        Ok(())
    }

    async fn on_command(&self, device: &MeshDevice, command: &ClusterCommand) -> Result<()> {
        debug!("{} command {} from endpoint {}", device.id(), command.attr, command.endpoint);
        let remote = self.resolve(command)?;
        debug!("remote value: {:?}", remote);

        if let Err(e) = device
            .trigger_flow(WALL_CONTROLLER_SCENE_CARD, None, Some(remote.to_value()))
            .await
        {
            warn!("{} trigger failed: {}", WALL_CONTROLLER_SCENE_CARD, e);
        }
        if let Err(e) = device
            .trigger_flow(WALL_CONTROLLER_BUTTON_CARD, Some(remote.to_value()), None)
            .await
        {
            warn!("{} trigger failed: {}", WALL_CONTROLLER_BUTTON_CARD, e);
        }
        Ok(())
    }

    async fn autocomplete(
        &self,
        device: &MeshDevice,
        kind: AutocompleteKind,
        query: &str,
    ) -> Result<Vec<AutocompleteItem>> {
        let items = match kind {
            AutocompleteKind::Scene => autocomplete(SCENES.iter().map(|(_, label)| *label), query, device.translator()),
            AutocompleteKind::Button => autocomplete(
                self.buttons.iter().map(|(_, label)| label.as_str()),
                query,
                device.translator(),
            ),
        };
        Ok(items)
    }
}
