//! Message bus port — publish/subscribe transport.

use std::future::Future;

use serde::Serialize;
use tokio::sync::broadcast;

use geohub_domain::error::GeohubError;

/// A message received from the bus on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Best-effort publish/subscribe transport.
///
/// Delivery is at-least-once with no deduplication. Incoming messages for
/// every subscribed topic are fanned out through [`messages`](Self::messages).
pub trait MessageBus: Send + Sync {
    /// Publish a raw payload on `topic`.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), GeohubError>> + Send;

    /// Start receiving messages published on `topic`.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), GeohubError>> + Send;

    /// A receiver yielding every message on subscribed topics from now on.
    fn messages(&self) -> broadcast::Receiver<BusMessage>;

    /// Serialize `value` as JSON and publish it on `topic`.
    fn publish_json<T: Serialize + ?Sized>(
        &self,
        topic: &str,
        value: &T,
    ) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let encoded =
            serde_json::to_vec(value).map_err(|err| GeohubError::Transport(Box::new(err)));
        async move { self.publish(topic, encoded?).await }
    }
}

impl<T: MessageBus> MessageBus for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), GeohubError>> + Send {
        (**self).publish(topic, payload)
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), GeohubError>> + Send {
        (**self).subscribe(topic)
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        (**self).messages()
    }
}
