//! # geohubd — geohub daemon
//!
//! Composition root that wires all adapters together and runs the engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialise logging
//! - Construct the MQTT bus and the JSON config store with its background writer
//! - Construct the geofence service, load the stored configuration
//! - Subscribe to the inbound channels and process messages one at a time
//! - Run housekeeping in the background
//! - Handle graceful shutdown (ctrl-c): flush pending saves, disconnect
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use geohub_adapter_mqtt::MqttBus;
use geohub_adapter_storage_json::{ConfigWriter, JsonConfigStore};
use geohub_app::commands::Topics;
use geohub_app::housekeeping;
use geohub_app::ports::MessageBus;
use geohub_app::services::GeofenceService;
use geohub_app::store::GeofenceStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading geohub.toml")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Core state
    let store = GeofenceStore::new(config.engine.history_capacity).shared();

    // Adapters
    let bus = Arc::new(MqttBus::connect(&config.mqtt));
    let writer = Arc::new(ConfigWriter::spawn(JsonConfigStore::new(
        &config.storage.path,
    )));

    // Service
    let service = GeofenceService::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&writer),
        Topics::new(config.mqtt.topic_prefix.clone()),
        config.dispatcher(),
    );
    if let Err(err) = service.load().await {
        tracing::error!(
            path = %config.storage.path,
            error = ?err,
            "failed to load stored geofence configuration, starting empty"
        );
    }

    let messages = bus.messages();
    service
        .subscribe()
        .await
        .context("subscribing to geofence topics")?;

    let housekeeping = housekeeping::spawn(store, config.housekeeping());

    tracing::info!(
        broker = %config.mqtt.broker_host,
        port = config.mqtt.broker_port,
        storage = %config.storage.path,
        "geohubd running"
    );

    tokio::select! {
        () = service.serve(messages) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        }
    }

    housekeeping.abort();
    writer.shutdown().await;
    bus.teardown().await;
    tracing::info!("geohubd stopped");

    Ok(())
}
