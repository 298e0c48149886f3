//! Geographic value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the earth's surface, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, altitude: None }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// Great-circle (haversine) distance in kilometres. Altitude is ignored.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        distance_between(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Circle on the earth's surface; radius in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCircle {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl GeoCircle {
    pub fn new(latitude: f64, longitude: f64, radius: f64) -> Self {
        Self { latitude, longitude, radius }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center().distance_km(point) <= self.radius
    }
}

pub fn distance_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_lon / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.altitude {
            Some(alt) => write!(f, "({}, {}, {alt})", self.latitude, self.longitude),
            None => write!(f, "({}, {})", self.latitude, self.longitude),
        }
    }
}

impl fmt::Display for GeoCircle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "circle(({}, {}), {}km)", self.latitude, self.longitude, self.radius)
    }
}
