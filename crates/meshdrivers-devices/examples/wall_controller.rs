use std::collections::HashMap;
use std::sync::Arc;

use meshdrivers_core::config::{ConfigBuilder, SharedConfig};
use meshdrivers_core::logging;
use meshdrivers_core::types::{Id, Value};
use meshdrivers_devices::capability::{
    ATTR_BATTERY_PERCENTAGE_REMAINING, CLUSTER_LEVEL_CONTROL, CLUSTER_ON_OFF, CLUSTER_POWER_CONFIG,
};
use meshdrivers_devices::flow::AutocompleteKind;
use meshdrivers_devices::i18n::Catalog;
use meshdrivers_devices::memory::{memory_services, MemoryHost, MemoryNode, MemoryStore};
use meshdrivers_devices::{
    AttributeReport, Capability, ClusterCommand, DeviceInfo, DeviceRegistry, Endpoint, MeshProtocol,
    RegistryEvent,
};

use tracing::info;

const CATALOGS: &str = r#"{
    "en": {},
    "nl": {"Dimming UP": "Dimmen omhoog", "Dimming DOWN": "Dimmen omlaag", "Group3": "Groep 3"}
}"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from MESHDRIVERS__* variables
    let config = ConfigBuilder::new().with_environment_prefix("MESHDRIVERS").build()?;
    logging::init_from_config(&config.logging)?;
    info!("{} starting with locale {}", config.general.app_name, config.general.locale);

    let host = Arc::new(MemoryHost::new());
    let catalog = Catalog::for_locale(CATALOGS, &config.general.locale)?;
    let services = memory_services(host.clone(), Arc::new(catalog));
    let registry = DeviceRegistry::with_builtin_drivers(SharedConfig::new(config), services)?;
    let mut events = registry.subscribe();

    // An eight button remote: one group per endpoint
    let mut endpoints = vec![Endpoint::new(0, [CLUSTER_POWER_CONFIG, CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL])];
    endpoints.extend((1..4).map(|id| Endpoint::new(id, [CLUSTER_ON_OFF, CLUSTER_LEVEL_CONTROL])));
    let node = Arc::new(MemoryNode::new("living-room-remote", MeshProtocol::Zigbee, endpoints).with_battery(true));

    let capabilities = vec![Capability::MeasureBattery, Capability::AlarmBattery];
    let id = Id::from("living-room-remote");
    host.declare(&id, capabilities.iter().copied());
    let info = DeviceInfo::new(id.clone(), "Living Room Remote", "", MeshProtocol::Zigbee, capabilities);

    registry
        .add_device("ZB_WallController_8", info, node.clone(), Arc::new(MemoryStore::new()))
        .await?;
    if let Ok(RegistryEvent::DeviceAdded(info)) = events.recv().await {
        info!("Paired {} with {}", info.name, info.driver_id);
    }
    info!("Bound {} clusters", node.binds().await.len());

    // Battery drops below the alarm threshold
    let report = AttributeReport::new(0, CLUSTER_POWER_CONFIG, ATTR_BATTERY_PERCENTAGE_REMAINING, 8);
    registry.dispatch_report(&id, &report).await?;
    info!(
        "Battery: {:?}, alarm: {:?}",
        host.value(&id, Capability::MeasureBattery).await,
        host.value(&id, Capability::AlarmBattery).await
    );

    // Hold the third group's up key
    let mut payload = HashMap::new();
    payload.insert("movemode".to_string(), Value::Integer(1));
    registry
        .dispatch_command(&id, &ClusterCommand::new(2, "moveWithOnOff", Value::Object(payload)))
        .await?;
    for trigger in host.triggers().await {
        info!("Fired {} tokens={:?} state={:?}", trigger.card, trigger.tokens, trigger.state);
    }

    for item in registry.autocomplete(&id, AutocompleteKind::Scene, "dim").await? {
        info!("Scene suggestion: {} ({})", item.name, item.id);
    }

    Ok(())
}
