//! Action — a device write performed when a rule fires.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// What to write to the target pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    On,
    Off,
    /// Follows the transition direction: `1` on entry, `0` on exit.
    ///
    /// This is not a read-modify-write of the device's current state.
    Toggle,
}

impl ActionType {
    /// Resolve the value written to the pin for a given transition.
    #[must_use]
    pub fn resolve(self, entered: bool) -> u8 {
        match self {
            Self::On => 1,
            Self::Off => 0,
            Self::Toggle => u8::from(entered),
        }
    }
}

/// A single device write, optionally delayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(alias = "deviceName")]
    pub device_name: String,
    #[serde(default = "default_pin")]
    pub pin: u16,
    #[serde(alias = "actionType")]
    pub action_type: ActionType,
    /// Opaque routing value forwarded verbatim to the device-control channel.
    #[serde(default)]
    pub address: serde_json::Value,
    /// Opaque bus selector forwarded verbatim to the device-control channel.
    #[serde(default, alias = "deviceBus")]
    pub device_bus: serde_json::Value,
    /// Seconds to wait before writing. Fractions are allowed.
    #[serde(default, alias = "delaySeconds")]
    pub delay_seconds: f64,
}

fn default_pin() -> u16 {
    1
}

impl Action {
    /// Convenience constructor for an immediate action with default routing.
    #[must_use]
    pub fn new(device_name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            device_name: device_name.into(),
            pin: default_pin(),
            action_type,
            address: serde_json::Value::Null,
            device_bus: serde_json::Value::Null,
            delay_seconds: 0.0,
        }
    }

    #[must_use]
    pub fn with_pin(mut self, pin: u16) -> Self {
        self.pin = pin;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_routing(mut self, address: serde_json::Value, device_bus: serde_json::Value) -> Self {
        self.address = address;
        self.device_bus = device_bus;
        self
    }

    /// `true` when the write must wait before being sent.
    #[must_use]
    pub fn is_delayed(&self) -> bool {
        self.delay_seconds > 0.0
    }

    /// The delay as a [`Duration`]. Invalid delays collapse to zero.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_seconds).unwrap_or_default()
    }

    /// Check that the delay is a finite non-negative number.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDelay`] otherwise.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.delay_seconds.is_finite() && self.delay_seconds >= 0.0 {
            Ok(())
        } else {
            Err(ValidationError::InvalidDelay(self.delay_seconds))
        }
    }
}
