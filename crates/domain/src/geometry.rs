//! Geometry — great-circle distance and containment tests.
//!
//! Everything here is a pure function over WGS84 degrees.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that the point is a finite coordinate within WGS84 bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CoordinateOutOfRange`] otherwise.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let lat_ok = self.lat.is_finite() && (-90.0..=90.0).contains(&self.lat);
        let lng_ok = self.lng.is_finite() && (-180.0..=180.0).contains(&self.lng);
        if lat_ok && lng_ok {
            Ok(())
        } else {
            Err(ValidationError::CoordinateOutOfRange {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }
}

/// Great-circle distance between two points in meters (haversine).
#[must_use]
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    // Rounding can push h just past 1 for near-antipodal points.
    let h = ((d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2))
        .min(1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// `true` when `point` lies within `radius` meters of `center` (boundary inclusive).
#[must_use]
pub fn point_in_circle(point: GeoPoint, center: GeoPoint, radius: f64) -> bool {
    distance_meters(point, center) <= radius
}

/// Even-odd ray casting over the closed vertex ring.
///
/// A horizontal ray is cast from `point` towards increasing longitude. Edges
/// with equal endpoint latitudes never toggle. Fewer than three vertices is
/// never inside.
#[must_use]
pub fn point_in_polygon(point: GeoPoint, vertices: &[GeoPoint]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    for (i, a) in vertices.iter().enumerate() {
        let b = vertices[(i + 1) % vertices.len()];
        #[allow(clippy::float_cmp)]
        if a.lat == b.lat {
            continue;
        }
        let (low, high) = if a.lat < b.lat {
            (a.lat, b.lat)
        } else {
            (b.lat, a.lat)
        };
        if point.lat <= low || point.lat > high {
            continue;
        }
        let crossing = (point.lat - a.lat) * (b.lng - a.lng) / (b.lat - a.lat) + a.lng;
        if point.lng <= crossing {
            inside = !inside;
        }
    }
    inside
}
