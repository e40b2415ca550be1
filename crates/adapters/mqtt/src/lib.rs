//! # geohub-adapter-mqtt
//!
//! MQTT adapter — carries geohub traffic over an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to the broker and keep the event loop running, reconnecting on failure
//! - Re-subscribe to every known topic after each reconnection
//! - Fan incoming publishes out to [`MessageBus::messages`](geohub_app::ports::MessageBus::messages) receivers
//! - Refuse to publish while disconnected instead of queueing silently
//!
//! ## Dependency rule
//! Same as other adapters: depends on `geohub-app` and `geohub-domain`.

pub mod bus;
pub mod config;
pub mod error;

pub use bus::MqttBus;
pub use config::MqttConfig;
