/*!
 * Battery percentage handling shared by battery powered remotes.
 */
use tracing::info;

use meshdrivers_core::types::Value;

use crate::capability::Capability;
use crate::device::{DeviceError, MeshDevice, Result};

/// Whether a battery percentage should raise the low battery alarm
pub fn battery_alarm(percentage: i64, threshold: i64) -> bool {
    percentage < threshold
}

/// Store a battery percentage report
///
/// `alarm_battery` is only written when the device was paired with it;
/// `measure_battery` always receives the raw reading.
pub async fn apply_battery_report(device: &MeshDevice, value: &Value) -> Result<()> {
    info!("onPowerCfgBatteryPercentageRemainingReport {}", value);
    let percentage = value.as_integer().ok_or_else(|| {
        DeviceError::InvalidValueType(
            Capability::MeasureBattery.to_string(),
            "integer".to_string(),
            value.to_string(),
        )
    })?;

    if device.has_capability(Capability::AlarmBattery) {
        let alarm = battery_alarm(percentage, device.settings().battery_alarm_threshold);
        device
            .set_capability_value(Capability::AlarmBattery, Value::Bool(alarm))
            .await?;
    }
    device
        .set_capability_value(Capability::MeasureBattery, Value::Integer(percentage))
        .await
}
