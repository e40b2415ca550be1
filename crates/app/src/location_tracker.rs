//! Location tracker — current position and bounded history per entity.

use std::collections::{HashMap, VecDeque};

use geohub_domain::geometry::GeoPoint;
use geohub_domain::id::EntityId;
use geohub_domain::time::Timestamp;

/// Default number of history entries kept per entity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// A recorded position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedLocation {
    pub point: GeoPoint,
    pub timestamp: Timestamp,
}

#[derive(Debug)]
struct TrackedEntity {
    current: TrackedLocation,
    history: VecDeque<TrackedLocation>,
}

/// Per-entity position cache.
///
/// History is diagnostic only; evaluation reads nothing but the update it
/// is handed.
#[derive(Debug)]
pub struct LocationTracker {
    capacity: usize,
    entities: HashMap<EntityId, TrackedEntity>,
}

impl Default for LocationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl LocationTracker {
    /// Create a tracker keeping at most `capacity` history entries per entity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entities: HashMap::new(),
        }
    }

    /// Overwrite the entity's current location and append it to its history,
    /// dropping the oldest entry once the history is full.
    pub fn update_location(&mut self, entity: &EntityId, point: GeoPoint, timestamp: Timestamp) {
        let location = TrackedLocation { point, timestamp };
        match self.entities.get_mut(entity) {
            Some(tracked) => {
                tracked.current = location;
                if tracked.history.len() >= self.capacity {
                    tracked.history.pop_front();
                }
                tracked.history.push_back(location);
            }
            None => {
                let mut history = VecDeque::with_capacity(self.capacity);
                history.push_back(location);
                self.entities.insert(
                    entity.clone(),
                    TrackedEntity {
                        current: location,
                        history,
                    },
                );
            }
        }
    }

    /// Most recent location of `entity`, if it ever reported one.
    #[must_use]
    pub fn current_location(&self, entity: &EntityId) -> Option<TrackedLocation> {
        self.entities.get(entity).map(|tracked| tracked.current)
    }

    /// History of `entity`, oldest first.
    pub fn history(&self, entity: &EntityId) -> impl Iterator<Item = &TrackedLocation> {
        self.entities
            .get(entity)
            .into_iter()
            .flat_map(|tracked| tracked.history.iter())
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Drop history entries recorded before `cutoff`. Current locations are kept.
    ///
    /// Returns the number of entries removed.
    pub fn prune_history(&mut self, cutoff: Timestamp) -> usize {
        let mut removed = 0;
        for tracked in self.entities.values_mut() {
            let before = tracked.history.len();
            tracked.history.retain(|loc| loc.timestamp >= cutoff);
            removed += before - tracked.history.len();
        }
        removed
    }
}
