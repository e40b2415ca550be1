//! Location updates reported by tracked entities.

use serde::Serialize;

use crate::error::ValidationError;
use crate::geometry::GeoPoint;
use crate::id::EntityId;
use crate::time::{self, Timestamp};

/// A position report for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationUpdate {
    #[serde(rename = "user_id")]
    pub entity_id: EntityId,
    #[serde(flatten)]
    pub point: GeoPoint,
    pub timestamp: Timestamp,
}

impl LocationUpdate {
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>, point: GeoPoint, timestamp: Timestamp) -> Self {
        Self {
            entity_id: entity_id.into(),
            point,
            timestamp,
        }
    }

    /// Parse a loosely-typed location payload.
    ///
    /// The entity is read from `user_id` (or `entity_id`), the position from
    /// numeric `lat`/`lng`. A missing or unreadable `timestamp` falls back
    /// to `received_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when the entity or a
    /// coordinate is absent, and [`ValidationError::CoordinateOutOfRange`]
    /// for impossible coordinates.
    pub fn from_json(
        payload: &serde_json::Value,
        received_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let entity_id = payload
            .get("user_id")
            .or_else(|| payload.get("entity_id"))
            .and_then(serde_json::Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingField("user_id"))?;
        let lat = payload
            .get("lat")
            .and_then(serde_json::Value::as_f64)
            .ok_or(ValidationError::MissingField("lat"))?;
        let lng = payload
            .get("lng")
            .and_then(serde_json::Value::as_f64)
            .ok_or(ValidationError::MissingField("lng"))?;

        let point = GeoPoint::new(lat, lng);
        point.validate()?;

        let timestamp = payload
            .get("timestamp")
            .and_then(time::from_json)
            .unwrap_or(received_at);

        Ok(Self::new(entity_id, point, timestamp))
    }
}
