//! Control commands emitted on the device-control channel.

use serde::Serialize;

use crate::rule::Action;
use crate::time::Timestamp;

/// Protocol tag expected by the device-control service.
pub const PROTOCOL_TYPE: &str = "Modular";

/// Pin write payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinWrite {
    pub pin: u16,
    pub data: u8,
}

/// A device write request as published on the device-control channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlCommand {
    pub mac: String,
    pub protocol_type: &'static str,
    pub device: String,
    pub function: &'static str,
    pub value: PinWrite,
    pub address: serde_json::Value,
    pub device_bus: serde_json::Value,
    #[serde(rename = "Timestamp")]
    pub timestamp: Timestamp,
}

impl ControlCommand {
    /// Build the pin write for `action` given the transition direction.
    #[must_use]
    pub fn for_action(mac: &str, action: &Action, entered: bool, timestamp: Timestamp) -> Self {
        Self {
            mac: mac.to_string(),
            protocol_type: PROTOCOL_TYPE,
            device: action.device_name.clone(),
            function: "write",
            value: PinWrite {
                pin: action.pin,
                data: action.action_type.resolve(entered),
            },
            address: action.address.clone(),
            device_bus: action.device_bus.clone(),
            timestamp,
        }
    }
}
