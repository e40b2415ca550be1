//! Area — a named geographic region (circle or polygon).

use serde::{Deserialize, Serialize};

use crate::error::{GeohubError, ValidationError};
use crate::geometry::{self, GeoPoint};
use crate::id::AreaId;

/// The geometric shape of an area, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AreaShape {
    /// Every point within `radius` meters of `center`.
    Circle { center: GeoPoint, radius: f64 },
    /// Closed ring of vertices, the last implicitly joined to the first.
    Polygon {
        #[serde(alias = "vertices")]
        points: Vec<GeoPoint>,
    },
    /// A shape type this build does not understand. Never contains anything.
    #[serde(other)]
    Unknown,
}

/// A named region against which positions are tested for containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceArea {
    #[serde(default = "AreaId::generate")]
    pub id: AreaId,
    pub name: String,
    #[serde(flatten)]
    pub shape: AreaShape,
}

impl GeofenceArea {
    /// Create a builder for constructing a [`GeofenceArea`].
    #[must_use]
    pub fn builder() -> GeofenceAreaBuilder {
        GeofenceAreaBuilder::default()
    }

    /// Test whether a point lies inside the area.
    ///
    /// Malformed shapes (non-positive radius, fewer than three points,
    /// unknown type) are always outside.
    #[must_use]
    pub fn is_point_inside(&self, point: GeoPoint) -> bool {
        match &self.shape {
            AreaShape::Circle { center, radius } => {
                *radius > 0.0 && geometry::point_in_circle(point, *center, *radius)
            }
            AreaShape::Polygon { points } => geometry::point_in_polygon(point, points),
            AreaShape::Unknown => false,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] when:
    /// - `id` or `name` is empty
    /// - a circle has a non-positive (or non-finite) radius
    /// - a polygon has fewer than three points
    /// - any coordinate is out of range
    /// - the shape type is not understood
    pub fn validate(&self) -> Result<(), GeohubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        match &self.shape {
            AreaShape::Circle { center, radius } => {
                center.validate()?;
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(ValidationError::NonPositiveRadius(*radius).into());
                }
            }
            AreaShape::Polygon { points } => {
                if points.len() < 3 {
                    return Err(ValidationError::TooFewPoints(points.len()).into());
                }
                for point in points {
                    point.validate()?;
                }
            }
            AreaShape::Unknown => return Err(ValidationError::UnknownAreaType.into()),
        }
        Ok(())
    }
}

/// Step-by-step builder for [`GeofenceArea`].
#[derive(Debug, Default)]
pub struct GeofenceAreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
    shape: Option<AreaShape>,
}

impl GeofenceAreaBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AreaId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn circle(mut self, center: GeoPoint, radius: f64) -> Self {
        self.shape = Some(AreaShape::Circle { center, radius });
        self
    }

    #[must_use]
    pub fn polygon(mut self, points: Vec<GeoPoint>) -> Self {
        self.shape = Some(AreaShape::Polygon { points });
        self
    }

    /// Consume the builder, validate, and return a [`GeofenceArea`].
    ///
    /// # Errors
    ///
    /// Returns [`GeohubError::Validation`] if the name is missing or the
    /// shape violates its invariants. A missing shape is treated as an
    /// empty polygon.
    pub fn build(self) -> Result<GeofenceArea, GeohubError> {
        let area = GeofenceArea {
            id: self.id.unwrap_or_else(AreaId::generate),
            name: self.name.unwrap_or_default(),
            shape: self
                .shape
                .unwrap_or(AreaShape::Polygon { points: Vec::new() }),
        };
        area.validate()?;
        Ok(area)
    }
}
