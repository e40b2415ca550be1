//! In-process message bus backed by tokio broadcast channels.

use std::collections::HashSet;
use std::future::Future;

use tokio::sync::{RwLock, broadcast};

use geohub_domain::error::GeohubError;

use crate::ports::{BusMessage, MessageBus};

/// In-process [`MessageBus`] using tokio [`broadcast`] channels.
///
/// Only messages on subscribed topics reach [`messages`](MessageBus::messages);
/// [`tap`](Self::tap) sees everything, which is handy for observers and tests.
/// Publishing succeeds even when there are no receivers (the message is
/// simply dropped).
pub struct InProcessBus {
    delivered: broadcast::Sender<BusMessage>,
    tapped: broadcast::Sender<BusMessage>,
    subscriptions: RwLock<HashSet<String>>,
}

impl InProcessBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (delivered, _) = broadcast::channel(capacity);
        let (tapped, _) = broadcast::channel(capacity);
        Self {
            delivered,
            tapped,
            subscriptions: RwLock::new(HashSet::new()),
        }
    }

    /// Observe every message published on the bus, subscribed or not.
    #[must_use]
    pub fn tap(&self) -> broadcast::Receiver<BusMessage> {
        self.tapped.subscribe()
    }
}

impl MessageBus for InProcessBus {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let message = BusMessage {
            topic: topic.to_string(),
            payload,
        };
        async move {
            // broadcast::send only fails when nobody is listening.
            let _ = self.tapped.send(message.clone());
            if self.subscriptions.read().await.contains(&message.topic) {
                let _ = self.delivered.send(message);
            }
            Ok(())
        }
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let topic = topic.to_string();
        async move {
            self.subscriptions.write().await.insert(topic);
            Ok(())
        }
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.delivered.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_deliver_message_on_subscribed_topic() {
        let bus = InProcessBus::new(16);
        bus.subscribe("geofence/create").await.unwrap();
        let mut rx = bus.messages();

        bus.publish("geofence/create", b"{}".to_vec()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "geofence/create");
        assert_eq!(received.payload, b"{}");
    }

    #[tokio::test]
    async fn should_not_deliver_unsubscribed_topic_but_tap_it() {
        let bus = InProcessBus::new(16);
        let mut rx = bus.messages();
        let mut tap = bus.tap();

        bus.publish("modular", b"{}".to_vec()).await.unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(tap.recv().await.unwrap().topic, "modular");
    }

    #[tokio::test]
    async fn should_succeed_when_no_receivers() {
        let bus = InProcessBus::new(16);
        assert!(bus.publish("anything", Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn should_publish_json_payload() {
        let bus = InProcessBus::new(16);
        let mut tap = bus.tap();

        bus.publish_json("geofence/data", &serde_json::json!({"rules": []}))
            .await
            .unwrap();

        let received = tap.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&received.payload).unwrap();
        assert_eq!(value, serde_json::json!({"rules": []}));
    }
}
