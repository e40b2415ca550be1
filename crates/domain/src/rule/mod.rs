//! Rule — area + trigger type → ordered actions.
//!
//! A [`GeofenceRule`] binds one area to a [`TriggerType`] and a list of
//! [`Action`]s. It also remembers, per tracked entity, whether that entity
//! was inside the area at its last observation. That memory is transient: it
//! is never serialized and starts empty on every process start, so the first
//! observation of an entity is always compared against "outside".

mod action;
mod trigger;

pub use action::{Action, ActionType};
pub use trigger::TriggerType;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GeohubError, ValidationError};
use crate::id::{AreaId, EntityId, RuleId};
use crate::time::{self, Timestamp};

/// A trigger policy bound to one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceRule {
    #[serde(default = "RuleId::generate")]
    pub id: RuleId,
    pub name: String,
    #[serde(alias = "areaId")]
    pub area_id: AreaId,
    #[serde(alias = "triggerType")]
    pub trigger_type: TriggerType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub actions: Vec<Action>,
    /// Entities this rule applies to. Empty (or `null`) means every entity.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: BTreeSet<EntityId>,
    #[serde(default = "time::now", alias = "createdAt")]
    pub created_at: Timestamp,
    #[serde(default, alias = "lastTriggeredAt")]
    pub last_triggered_at: Option<Timestamp>,
    #[serde(skip)]
    containment: HashMap<EntityId, bool>,
}

fn default_enabled() -> bool {
    true
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl GeofenceRule {
    /// Create a builder for constructing a [`GeofenceRule`].
    #[must_use]
    pub fn builder() -> GeofenceRuleBuilder {
        GeofenceRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// Actions may be empty: such a rule still tracks containment and
    /// records `last_triggered_at`, it just emits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] when `id`, `name` or `area_id`
    /// is empty, or when an action carries a negative delay.
    pub fn validate(&self) -> Result<(), GeohubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.area_id.is_empty() {
            return Err(ValidationError::MissingField("area_id").into());
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }

    /// `true` if the rule evaluates locations of `entity`.
    #[must_use]
    pub fn applies_to(&self, entity: &EntityId) -> bool {
        self.users.is_empty() || self.users.contains(entity)
    }

    /// Last recorded containment of `entity`; `false` when never observed.
    #[must_use]
    pub fn was_inside(&self, entity: &EntityId) -> bool {
        self.containment.get(entity).copied().unwrap_or(false)
    }

    /// `true` once `entity` has been evaluated at least once by this rule.
    #[must_use]
    pub fn has_observed(&self, entity: &EntityId) -> bool {
        self.containment.contains_key(entity)
    }

    /// Record the latest containment of `entity`, returning the previous value.
    pub fn record_containment(&mut self, entity: EntityId, inside: bool) -> bool {
        self.containment.insert(entity, inside).unwrap_or(false)
    }

    /// Number of entities with recorded containment.
    #[must_use]
    pub fn observed_count(&self) -> usize {
        self.containment.len()
    }
}

/// Step-by-step builder for [`GeofenceRule`].
#[derive(Debug)]
pub struct GeofenceRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    area_id: Option<AreaId>,
    trigger_type: TriggerType,
    enabled: bool,
    actions: Vec<Action>,
    users: BTreeSet<EntityId>,
    created_at: Option<Timestamp>,
}

impl Default for GeofenceRuleBuilder {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            area_id: None,
            trigger_type: TriggerType::Enter,
            enabled: true,
            actions: Vec::new(),
            users: BTreeSet::new(),
            created_at: None,
        }
    }
}

impl GeofenceRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<RuleId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn area_id(mut self, area_id: impl Into<AreaId>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    #[must_use]
    pub fn trigger_type(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = trigger_type;
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn user(mut self, entity: impl Into<EntityId>) -> Self {
        self.users.insert(entity.into());
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return a [`GeofenceRule`].
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<GeofenceRule, GeohubError> {
        let rule = GeofenceRule {
            id: self.id.unwrap_or_else(RuleId::generate),
            name: self.name.unwrap_or_default(),
            area_id: self.area_id.unwrap_or_else(|| AreaId::from("")),
            trigger_type: self.trigger_type,
            enabled: self.enabled,
            actions: self.actions,
            users: self.users,
            created_at: self.created_at.unwrap_or_else(time::now),
            last_triggered_at: None,
            containment: HashMap::new(),
        };
        rule.validate()?;
        Ok(rule)
    }
}
