//! [`MessageBus`] implementation backed by an MQTT broker.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

use geohub_app::ports::{BusMessage, MessageBus};
use geohub_domain::error::GeohubError;

use crate::config::MqttConfig;
use crate::error::MqttError;

const REQUEST_CAPACITY: usize = 100;
const INCOMING_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT-backed message bus.
///
/// Publishes use QoS 1 without retain. Subscriptions are remembered and
/// replayed after every reconnection.
pub struct MqttBus {
    client: AsyncClient,
    tx: broadcast::Sender<BusMessage>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    event_loop: JoinHandle<()>,
}

impl MqttBus {
    /// Create the client and spawn its event loop.
    ///
    /// The connection is established in the background; until the broker
    /// acknowledges it, [`is_connected`](Self::is_connected) is `false` and
    /// publishing fails.
    #[must_use]
    pub fn connect(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs)));

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, _) = broadcast::channel(INCOMING_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let subscriptions = Arc::new(RwLock::new(Vec::new()));

        tracing::info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "connecting to MQTT broker"
        );

        let event_loop = tokio::spawn(poll(
            event_loop,
            client.clone(),
            tx.clone(),
            Arc::clone(&connected),
            Arc::clone(&subscriptions),
        ));

        Self {
            client,
            tx,
            connected,
            subscriptions,
            event_loop,
        }
    }

    /// Whether the broker currently acknowledges the connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Disconnect from the broker and stop the event loop.
    pub async fn teardown(&self) {
        if let Err(err) = self.client.disconnect().await {
            tracing::debug!(error = %err, "MQTT disconnect request failed");
        }
        self.connected.store(false, Ordering::Relaxed);
        self.event_loop.abort();
        tracing::info!("MQTT connection closed");
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

fn topic_name(raw: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(raw.as_ref()).into_owned()
}

/// Queue a subscription for every topic without waiting.
///
/// Runs inside the event loop, which is the only consumer of the request
/// queue, so it must never await on it. Returns how many were queued.
fn resubscribe(client: &AsyncClient, topics: &[String]) -> usize {
    let mut queued = 0;
    for topic in topics {
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => queued += 1,
            Err(err) => {
                tracing::error!(topic = %topic, error = %err, "failed to re-subscribe");
            }
        }
    }
    queued
}

async fn poll(
    mut event_loop: EventLoop,
    client: AsyncClient,
    tx: broadcast::Sender<BusMessage>,
    connected: Arc<AtomicBool>,
    subscriptions: Arc<RwLock<Vec<String>>>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = BusMessage {
                    topic: topic_name(&publish.topic),
                    payload: publish.payload.to_vec(),
                };
                if tx.send(message).is_err() {
                    tracing::trace!("MQTT message dropped, no receiver");
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                let topics = subscriptions.read().await.clone();
                tracing::info!(subscriptions = topics.len(), "MQTT connected");
                resubscribe(&client, &topics);
            }
            Ok(Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(err) => {
                if connected.swap(false, Ordering::Relaxed) {
                    tracing::warn!(error = %err, "MQTT connection lost");
                } else {
                    tracing::debug!(error = %err, "MQTT connection attempt failed");
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl MessageBus for MqttBus {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let client = self.client.clone();
        let connected = self.is_connected();
        let topic = topic.to_string();
        async move {
            if !connected {
                return Err(MqttError::NotConnected.into());
            }
            client
                .publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
                .await
                .map_err(MqttError::from)?;
            tracing::trace!(topic = %topic, "MQTT message published");
            Ok(())
        }
    }

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let client = self.client.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let topic = topic.to_string();
        async move {
            {
                let mut known = subscriptions.write().await;
                if !known.contains(&topic) {
                    known.push(topic.clone());
                }
            }
            client
                .subscribe(topic.as_str(), QoS::AtLeastOnce)
                .await
                .map_err(MqttError::from)?;
            tracing::debug!(topic = %topic, "MQTT subscription requested");
            Ok(())
        }
    }

    fn messages(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_config() -> MqttConfig {
        MqttConfig {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 1,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn should_decode_topic_names() {
        assert_eq!(topic_name("geofence/create"), "geofence/create");
        assert_eq!(topic_name(b"geofence/data".as_slice()), "geofence/data");
    }

    #[tokio::test]
    async fn should_refuse_to_publish_while_disconnected() {
        let bus = MqttBus::connect(&unreachable_config());

        assert!(!bus.is_connected());
        let err = bus
            .publish("geofence/data", b"{}".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, GeohubError::Transport(_)));

        bus.teardown().await;
    }

    #[tokio::test]
    async fn should_resubscribe_without_blocking_on_full_queue() {
        let options = MqttOptions::new("geohub-test", "127.0.0.1", 1);
        let (client, _event_loop) = AsyncClient::new(options, 1);
        let topics = vec![
            "geofence/create".to_string(),
            "geofence/update".to_string(),
            "geofence/delete".to_string(),
        ];

        // Only one slot and nobody polling: the rest are dropped, not awaited.
        assert_eq!(resubscribe(&client, &topics), 1);
    }

    #[tokio::test]
    async fn should_remember_subscriptions_once() {
        let bus = MqttBus::connect(&unreachable_config());

        bus.subscribe("geofence/create").await.unwrap();
        bus.subscribe("geofence/create").await.unwrap();
        bus.subscribe("geofence/delete").await.unwrap();

        assert_eq!(
            bus.subscriptions.read().await.as_slice(),
            ["geofence/create", "geofence/delete"]
        );
        bus.teardown().await;
    }
}
