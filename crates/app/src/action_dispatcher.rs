//! Action dispatcher — turns firings into device-control commands.
//!
//! Actions run in list order. Immediate actions (no `delay_seconds`) are
//! published before the next action is looked at; delayed actions are
//! handed to their own one-shot task and the loop moves on. A failed publish
//! is logged and counted, never aborting the rest of the list.
//!
//! Delayed actions are fire-and-forget: once scheduled they run even if the
//! entity has since moved back across the boundary. Setting
//! [`DispatcherConfig::cancel_stale_delayed_actions`] changes that: a new
//! firing for the same (rule, entity) pair aborts that pair's pending
//! delayed actions first.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use geohub_domain::command::ControlCommand;
use geohub_domain::error::GeohubError;
use geohub_domain::id::{EntityId, RuleId};
use geohub_domain::rule::Action;
use geohub_domain::time;

use crate::ports::MessageBus;
use crate::trigger_evaluator::Firing;

/// Where and how control commands are emitted.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Device-control channel, e.g. `"modular"`.
    pub device_control_topic: String,
    /// Gateway MAC address stamped on every command.
    pub gateway_mac: String,
    /// Abort pending delayed actions of a (rule, entity) pair when it fires again.
    pub cancel_stale_delayed_actions: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            device_control_topic: "modular".to_string(),
            gateway_mac: String::new(),
            cancel_stale_delayed_actions: false,
        }
    }
}

/// Outcome of one `execute_rule_actions` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Immediate actions published successfully.
    pub sent: usize,
    /// Immediate actions whose publish failed.
    pub failed: usize,
    /// Delayed actions handed to a timer task.
    pub scheduled: usize,
}

type PendingKey = (RuleId, EntityId);

/// Executes rule actions on a [`MessageBus`].
pub struct ActionDispatcher<B> {
    bus: Arc<B>,
    config: Arc<DispatcherConfig>,
    pending: Mutex<HashMap<PendingKey, Vec<AbortHandle>>>,
}

impl<B> ActionDispatcher<B>
where
    B: MessageBus + 'static,
{
    /// Create a dispatcher publishing on `bus`.
    pub fn new(bus: Arc<B>, config: DispatcherConfig) -> Self {
        Self {
            bus,
            config: Arc::new(config),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Execute or schedule every action of a firing, in order.
    pub async fn execute_rule_actions(&self, firing: &Firing) -> DispatchReport {
        let mut report = DispatchReport::default();

        if self.config.cancel_stale_delayed_actions {
            self.cancel_pending(&firing.rule_id, &firing.entity_id).await;
        }

        for (index, action) in firing.actions.iter().enumerate() {
            if action.is_delayed() {
                let handle = self.schedule(firing, action.clone());
                if self.config.cancel_stale_delayed_actions {
                    self.pending
                        .lock()
                        .await
                        .entry((firing.rule_id.clone(), firing.entity_id.clone()))
                        .or_default()
                        .push(handle);
                }
                report.scheduled += 1;
                continue;
            }

            match send_command(&self.bus, &self.config, action, firing.entered).await {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    tracing::error!(
                        rule_id = %firing.rule_id,
                        action_index = index,
                        device = %action.device_name,
                        error = %err,
                        "failed to dispatch action"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Number of delayed actions tracked for cancellation that have not finished.
    pub async fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .await
            .values()
            .flatten()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn schedule(&self, firing: &Firing, action: Action) -> AbortHandle {
        let bus = Arc::clone(&self.bus);
        let config = Arc::clone(&self.config);
        let rule_id = firing.rule_id.clone();
        let entered = firing.entered;
        let delay = action.delay();

        tracing::debug!(
            rule_id = %rule_id,
            device = %action.device_name,
            delay_ms = delay.as_millis(),
            "delayed action scheduled"
        );

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = send_command(&bus, &config, &action, entered).await {
                tracing::error!(
                    rule_id = %rule_id,
                    device = %action.device_name,
                    error = %err,
                    "failed to dispatch delayed action"
                );
            }
        });
        task.abort_handle()
    }

    async fn cancel_pending(&self, rule_id: &RuleId, entity_id: &EntityId) {
        let mut pending = self.pending.lock().await;
        pending.retain(|_, handles| {
            handles.retain(|handle| !handle.is_finished());
            !handles.is_empty()
        });
        if let Some(handles) = pending.remove(&(rule_id.clone(), entity_id.clone())) {
            tracing::info!(
                rule_id = %rule_id,
                entity_id = %entity_id,
                count = handles.len(),
                "cancelling stale delayed actions"
            );
            for handle in handles {
                handle.abort();
            }
        }
    }
}

async fn send_command<B: MessageBus>(
    bus: &B,
    config: &DispatcherConfig,
    action: &Action,
    entered: bool,
) -> Result<(), GeohubError> {
    let command = ControlCommand::for_action(&config.gateway_mac, action, entered, time::now());
    bus.publish_json(&config.device_control_topic, &command)
        .await?;
    tracing::info!(
        device = %command.device,
        pin = command.value.pin,
        data = command.value.data,
        "control command sent"
    );
    Ok(())
}
