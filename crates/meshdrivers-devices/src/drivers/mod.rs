/*!
 * Built-in drivers.
 */
use std::sync::Arc;

use crate::driver::Driver;

pub mod battery;
pub mod zb_switch;
pub mod zb_wall_controller;
pub mod zw_in_wall_switch;

pub use zb_switch::ZigbeeSwitch;
pub use zb_wall_controller::WallController;
pub use zw_in_wall_switch::ZwaveInWallSwitch;

/// All built-in drivers
pub fn builtin() -> Vec<Arc<dyn Driver>> {
    vec![
        Arc::new(ZigbeeSwitch::new()),
        Arc::new(WallController::two_button()),
        Arc::new(WallController::eight_button()),
        Arc::new(ZwaveInWallSwitch::new()),
    ]
}

/// Find a built-in driver by id
pub fn find(id: &str) -> Option<Arc<dyn Driver>> {
    builtin().into_iter().find(|driver| driver.id() == id)
}
