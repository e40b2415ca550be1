//! Geofence store — the single aggregate guarded by one lock.
//!
//! Areas, rules (with their containment memory) and the location tracker
//! live together so that every mutation happens under the same
//! [`Mutex`]. Callers must not hold the lock across IO.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use geohub_domain::area::GeofenceArea;
use geohub_domain::error::NotFoundError;
use geohub_domain::id::{AreaId, RuleId};
use geohub_domain::rule::GeofenceRule;
use geohub_domain::time::Timestamp;

use crate::location_tracker::LocationTracker;
use crate::ports::GeofenceConfig;

/// Shared handle to the store.
pub type SharedStore = Arc<Mutex<GeofenceStore>>;

/// Full area/rule snapshot as published on the data topic.
#[derive(Debug, Clone, Serialize)]
pub struct DataSnapshot {
    pub rules: Vec<GeofenceRule>,
    pub areas: Vec<GeofenceArea>,
    pub timestamp: Timestamp,
}

/// Owned aggregate of areas, rules and tracked locations.
///
/// Areas and rules keep insertion order, which is also evaluation order.
#[derive(Debug, Default)]
pub struct GeofenceStore {
    pub(crate) areas: Vec<GeofenceArea>,
    pub(crate) rules: Vec<GeofenceRule>,
    pub(crate) tracker: LocationTracker,
    /// Rules already reported as referencing a missing area.
    pub(crate) dangling_reported: HashSet<RuleId>,
}

impl GeofenceStore {
    /// Create an empty store with the given per-entity history capacity.
    #[must_use]
    pub fn new(history_capacity: usize) -> Self {
        Self {
            tracker: LocationTracker::new(history_capacity),
            ..Self::default()
        }
    }

    /// Wrap the store for sharing between tasks.
    #[must_use]
    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Replace all areas and rules with the loaded configuration.
    ///
    /// Containment memory starts empty, as after a restart.
    pub fn load(&mut self, config: GeofenceConfig) {
        self.areas = config.areas;
        self.rules = config.rules;
        self.dangling_reported.clear();
    }

    /// Produce the persisted representation.
    #[must_use]
    pub fn to_config(&self, now: Timestamp) -> GeofenceConfig {
        GeofenceConfig {
            areas: self.areas.clone(),
            rules: self.rules.clone(),
            last_updated: now,
        }
    }

    /// Produce the broadcast representation.
    #[must_use]
    pub fn snapshot(&self, now: Timestamp) -> DataSnapshot {
        DataSnapshot {
            rules: self.rules.clone(),
            areas: self.areas.clone(),
            timestamp: now,
        }
    }

    #[must_use]
    pub fn areas(&self) -> &[GeofenceArea] {
        &self.areas
    }

    #[must_use]
    pub fn rules(&self) -> &[GeofenceRule] {
        &self.rules
    }

    #[must_use]
    pub fn area(&self, id: &AreaId) -> Option<&GeofenceArea> {
        self.areas.iter().find(|area| &area.id == id)
    }

    #[must_use]
    pub fn rule(&self, id: &RuleId) -> Option<&GeofenceRule> {
        self.rules.iter().find(|rule| &rule.id == id)
    }

    #[must_use]
    pub fn tracker(&self) -> &LocationTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut LocationTracker {
        &mut self.tracker
    }

    /// Insert an area, replacing any area with the same id.
    ///
    /// Returns `true` when an existing area was replaced.
    pub fn upsert_area(&mut self, area: GeofenceArea) -> bool {
        self.forget_dangling_for_area(&area.id);
        match self.areas.iter_mut().find(|existing| existing.id == area.id) {
            Some(existing) => {
                *existing = area;
                true
            }
            None => {
                self.areas.push(area);
                false
            }
        }
    }

    /// Replace an existing area by id.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no area has that id.
    pub fn replace_area(&mut self, area: GeofenceArea) -> Result<(), NotFoundError> {
        let existing = self
            .areas
            .iter_mut()
            .find(|existing| existing.id == area.id)
            .ok_or_else(|| NotFoundError {
                entity: "Area",
                id: area.id.to_string(),
            })?;
        *existing = area;
        Ok(())
    }

    /// Remove an area. Rules referencing it become inert.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no area has that id.
    pub fn remove_area(&mut self, id: &AreaId) -> Result<GeofenceArea, NotFoundError> {
        let index = self
            .areas
            .iter()
            .position(|area| &area.id == id)
            .ok_or_else(|| NotFoundError {
                entity: "Area",
                id: id.to_string(),
            })?;
        Ok(self.areas.remove(index))
    }

    /// Insert a rule, replacing any rule with the same id.
    ///
    /// A replaced rule loses its containment memory.
    pub fn upsert_rule(&mut self, rule: GeofenceRule) -> bool {
        self.dangling_reported.remove(&rule.id);
        match self.rules.iter_mut().find(|existing| existing.id == rule.id) {
            Some(existing) => {
                *existing = rule;
                true
            }
            None => {
                self.rules.push(rule);
                false
            }
        }
    }

    /// Replace an existing rule by id (full replace, containment memory reset).
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no rule has that id.
    pub fn replace_rule(&mut self, rule: GeofenceRule) -> Result<(), NotFoundError> {
        self.dangling_reported.remove(&rule.id);
        let existing = self
            .rules
            .iter_mut()
            .find(|existing| existing.id == rule.id)
            .ok_or_else(|| NotFoundError {
                entity: "Rule",
                id: rule.id.to_string(),
            })?;
        *existing = rule;
        Ok(())
    }

    /// Remove a rule.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no rule has that id.
    pub fn remove_rule(&mut self, id: &RuleId) -> Result<GeofenceRule, NotFoundError> {
        self.dangling_reported.remove(id);
        let index = self
            .rules
            .iter()
            .position(|rule| &rule.id == id)
            .ok_or_else(|| NotFoundError {
                entity: "Rule",
                id: id.to_string(),
            })?;
        Ok(self.rules.remove(index))
    }

    /// Forget dangling-reference reports for rules that no longer exist.
    ///
    /// Returns the number of reports dropped.
    pub fn prune_dangling_reports(&mut self) -> usize {
        let before = self.dangling_reported.len();
        let rules = &self.rules;
        self.dangling_reported
            .retain(|id| rules.iter().any(|rule| &rule.id == id));
        before - self.dangling_reported.len()
    }

    fn forget_dangling_for_area(&mut self, area_id: &AreaId) {
        for rule in self.rules.iter().filter(|rule| &rule.area_id == area_id) {
            self.dangling_reported.remove(&rule.id);
        }
    }
}
