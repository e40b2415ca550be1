//! Geofence service — use-cases for managing areas/rules and handling locations.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use geohub_domain::area::GeofenceArea;
use geohub_domain::error::GeohubError;
use geohub_domain::id::{AreaId, EntityId, RuleId};
use geohub_domain::location::LocationUpdate;
use geohub_domain::rule::GeofenceRule;
use geohub_domain::time::{self, Timestamp};

use crate::action_dispatcher::{ActionDispatcher, DispatcherConfig};
use crate::commands::{Channel, Command, Topics};
use crate::ports::{BusMessage, ConfigStore, MessageBus};
use crate::store::SharedStore;
use crate::trigger_evaluator::{self, Firing};

/// Payload published on the event channel for every firing.
#[derive(Debug, Serialize)]
struct FiringEvent<'a> {
    rule_id: &'a RuleId,
    rule_name: &'a str,
    area_id: &'a AreaId,
    user_id: &'a EntityId,
    event: &'static str,
    lat: f64,
    lng: f64,
    timestamp: Timestamp,
}

/// Payload answering a location request.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LocationAnswer<'a> {
    Found {
        user_id: &'a EntityId,
        lat: f64,
        lng: f64,
        timestamp: Timestamp,
    },
    Missing {
        user_id: &'a EntityId,
        found: bool,
    },
}

/// Application service orchestrating the store, the evaluator, the
/// dispatcher, persistence and snapshot broadcasts.
pub struct GeofenceService<B, S> {
    store: SharedStore,
    bus: Arc<B>,
    config_store: S,
    dispatcher: ActionDispatcher<B>,
    topics: Topics,
}

impl<B, S> GeofenceService<B, S>
where
    B: MessageBus + 'static,
    S: ConfigStore,
{
    /// Create a new service.
    pub fn new(
        store: SharedStore,
        bus: Arc<B>,
        config_store: S,
        topics: Topics,
        dispatcher_config: DispatcherConfig,
    ) -> Self {
        let dispatcher = ActionDispatcher::new(Arc::clone(&bus), dispatcher_config);
        Self {
            store,
            bus,
            config_store,
            dispatcher,
            topics,
        }
    }

    /// Shared handle to the underlying store.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Topic names used by this service.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Replace the in-memory areas and rules with the stored configuration.
    ///
    /// Returns `(areas, rules)` counts. Nothing is changed when the store is empty.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the configuration cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> Result<(usize, usize), GeohubError> {
        let Some(config) = self.config_store.load().await? else {
            tracing::info!("no stored geofence configuration, starting empty");
            return Ok((0, 0));
        };
        for area in &config.areas {
            if let Err(err) = area.validate() {
                tracing::warn!(area_id = %area.id, error = %err, "stored area is malformed, it will never match");
            }
        }
        let counts = (config.areas.len(), config.rules.len());
        self.store.lock().await.load(config);
        tracing::info!(areas = counts.0, rules = counts.1, "geofence configuration loaded");
        Ok(counts)
    }

    /// Apply one inbound command.
    ///
    /// # Errors
    ///
    /// Returns validation or not-found errors for CRUD commands. Persistence
    /// and publish failures are logged, not returned.
    pub async fn handle(&self, command: Command) -> Result<(), GeohubError> {
        match command {
            Command::CreateRule(rule) => self.create_rule(rule).await,
            Command::UpdateRule(rule) => self.update_rule(rule).await,
            Command::DeleteRule(id) => self.delete_rule(&id).await,
            Command::CreateArea(area) => self.create_area(area).await,
            Command::UpdateArea(area) => self.update_area(area).await,
            Command::DeleteArea(id) => self.delete_area(&id).await,
            Command::RequestData => {
                self.publish_data().await;
                Ok(())
            }
            Command::Location(update) => {
                self.handle_location(&update).await;
                Ok(())
            }
            Command::LocationRequest(entity) => {
                self.publish_location(&entity).await;
                Ok(())
            }
        }
    }

    /// Classify, parse and apply one raw bus message.
    ///
    /// Unknown topics and malformed payloads are logged and dropped; a
    /// single bad message never stops the engine.
    pub async fn handle_message(&self, message: &BusMessage) {
        let Some(channel) = self.topics.classify(&message.topic) else {
            tracing::debug!(topic = %message.topic, "ignoring message on unknown topic");
            return;
        };
        let command = match Command::parse(channel, &message.payload, time::now()) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(topic = %message.topic, error = %err, "dropping malformed message");
                return;
            }
        };
        if let Err(err) = self.handle(command).await {
            tracing::warn!(topic = %message.topic, error = %err, "command rejected");
        }
    }

    /// Subscribe to every inbound topic.
    ///
    /// # Errors
    ///
    /// Returns the first transport error reported by the bus.
    pub async fn subscribe(&self) -> Result<(), GeohubError> {
        for topic in self.topics.inbound() {
            self.bus.subscribe(&topic).await?;
        }
        Ok(())
    }

    /// Process messages from `messages` one at a time until the bus closes.
    pub async fn serve(&self, mut messages: broadcast::Receiver<BusMessage>) {
        loop {
            match messages.recv().await {
                Ok(message) => self.handle_message(&message).await,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "message loop lagging, messages were dropped");
                }
                Err(RecvError::Closed) => {
                    tracing::info!("message bus closed, stopping message loop");
                    return;
                }
            }
        }
    }

    /// Create (or overwrite) a rule.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if invariants fail.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn create_rule(&self, rule: GeofenceRule) -> Result<(), GeohubError> {
        rule.validate()?;
        let replaced = self.store.lock().await.upsert_rule(rule);
        tracing::info!(replaced, "rule created");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Fully replace an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if invariants fail, or
    /// [`GeohubError::NotFound`] when no rule has that id.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn update_rule(&self, rule: GeofenceRule) -> Result<(), GeohubError> {
        rule.validate()?;
        self.store.lock().await.replace_rule(rule)?;
        tracing::info!("rule updated");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Delete a rule.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::NotFound`] when no rule has that id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: &RuleId) -> Result<(), GeohubError> {
        self.store.lock().await.remove_rule(id)?;
        tracing::info!("rule deleted");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Create (or overwrite) an area.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if invariants fail.
    #[tracing::instrument(skip(self, area), fields(area_id = %area.id))]
    pub async fn create_area(&self, area: GeofenceArea) -> Result<(), GeohubError> {
        area.validate()?;
        let replaced = self.store.lock().await.upsert_area(area);
        tracing::info!(replaced, "area created");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Fully replace an existing area.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if invariants fail, or
    /// [`GeohubError::NotFound`] when no area has that id.
    #[tracing::instrument(skip(self, area), fields(area_id = %area.id))]
    pub async fn update_area(&self, area: GeofenceArea) -> Result<(), GeohubError> {
        area.validate()?;
        self.store.lock().await.replace_area(area)?;
        tracing::info!("area updated");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Delete an area. Rules pointing at it stay but never fire.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::NotFound`] when no area has that id.
    #[tracing::instrument(skip(self))]
    pub async fn delete_area(&self, id: &AreaId) -> Result<(), GeohubError> {
        self.store.lock().await.remove_area(id)?;
        tracing::info!("area deleted");
        self.persist_and_broadcast().await;
        Ok(())
    }

    /// Evaluate a location update and dispatch the resulting firings.
    ///
    /// The store lock is released before any action is dispatched.
    #[tracing::instrument(skip(self, update), fields(entity_id = %update.entity_id))]
    pub async fn handle_location(&self, update: &LocationUpdate) -> Vec<Firing> {
        let firings = {
            let mut store = self.store.lock().await;
            trigger_evaluator::evaluate(&mut store, update, time::now())
        };

        for firing in &firings {
            tracing::info!(
                rule_id = %firing.rule_id,
                area_id = %firing.area_id,
                event = firing.direction(),
                "geofence rule fired"
            );
            let report = self.dispatcher.execute_rule_actions(firing).await;
            tracing::debug!(
                rule_id = %firing.rule_id,
                sent = report.sent,
                failed = report.failed,
                scheduled = report.scheduled,
                "actions dispatched"
            );
            self.publish_firing(firing).await;
        }
        firings
    }

    /// Publish the full area/rule snapshot on the data channel.
    pub async fn publish_data(&self) {
        let snapshot = self.store.lock().await.snapshot(time::now());
        let topic = self.topics.topic(Channel::Data);
        if let Err(err) = self.bus.publish_json(&topic, &snapshot).await {
            tracing::error!(topic = %topic, error = %err, "failed to publish geofence data");
        }
    }

    /// Publish the current location of `entity` on the location channel.
    pub async fn publish_location(&self, entity: &EntityId) {
        let current = self.store.lock().await.tracker().current_location(entity);
        let answer = match current {
            Some(location) => LocationAnswer::Found {
                user_id: entity,
                lat: location.point.lat,
                lng: location.point.lng,
                timestamp: location.timestamp,
            },
            None => LocationAnswer::Missing {
                user_id: entity,
                found: false,
            },
        };
        let topic = self.topics.topic(Channel::Location);
        if let Err(err) = self.bus.publish_json(&topic, &answer).await {
            tracing::error!(topic = %topic, error = %err, "failed to publish location");
        }
    }

    async fn publish_firing(&self, firing: &Firing) {
        let event = FiringEvent {
            rule_id: &firing.rule_id,
            rule_name: &firing.rule_name,
            area_id: &firing.area_id,
            user_id: &firing.entity_id,
            event: firing.direction(),
            lat: firing.point.lat,
            lng: firing.point.lng,
            timestamp: firing.fired_at,
        };
        let topic = self.topics.topic(Channel::Event);
        if let Err(err) = self.bus.publish_json(&topic, &event).await {
            tracing::error!(topic = %topic, error = %err, "failed to publish firing event");
        }
    }

    /// Save the configuration and broadcast the snapshot.
    ///
    /// A failed save leaves the in-memory state authoritative; the next
    /// successful save catches the file up.
    async fn persist_and_broadcast(&self) {
        let config = self.store.lock().await.to_config(time::now());
        if let Err(err) = self.config_store.save(config).await {
            tracing::error!(error = %err, "failed to save geofence configuration");
        }
        self.publish_data().await;
    }
}
