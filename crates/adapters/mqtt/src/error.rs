//! MQTT adapter error types.

use geohub_domain::error::GeohubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No broker connection is currently established.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[from] rumqttc::ClientError),
}

impl MqttError {
    /// Convert into a [`GeohubError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> GeohubError {
        GeohubError::Transport(Box::new(self))
    }
}

impl From<MqttError> for GeohubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
