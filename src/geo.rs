//! Fixed-point coordinates and flat-earth geometry helpers
//!
//! All coordinates are stored as lat/lon scaled by 1e6. Angle computation
//! uses an equirectangular projection rather than great-circle formulas;
//! at turn scale the error is far below one degree and it avoids the trig
//! cost per candidate turn.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// Fixed-point scaling for latitude/longitude.
pub const COORDINATE_PRECISION: f64 = 1_000_000.0;

const EARTH_RADIUS_M: f64 = 6_372_797.560_856;
const RAD: f64 = std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedLatLon {
    pub lat: i32,
    pub lon: i32,
}

impl FixedLatLon {
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * COORDINATE_PRECISION).round() as i32,
            lon: (lon * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lat_deg(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }

    pub fn lon_deg(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn is_valid(&self) -> bool {
        self.lat.abs() <= 90_000_000 && self.lon.abs() <= 180_000_000
    }
}

/// Great-circle distance in meters. Summaries use this; the hot paths
/// use the cheaper equirectangular variant below.
pub fn haversine_distance(a: FixedLatLon, b: FixedLatLon) -> f64 {
    let p1 = Point::new(a.lon_deg(), a.lat_deg());
    let p2 = Point::new(b.lon_deg(), b.lat_deg());
    p1.haversine_distance(&p2)
}

/// Equirectangular distance in meters.
pub fn approx_distance(a: FixedLatLon, b: FixedLatLon) -> f64 {
    let lat1 = a.lat_deg() * RAD;
    let lon1 = a.lon_deg() * RAD;
    let lat2 = b.lat_deg() * RAD;
    let lon2 = b.lon_deg() * RAD;

    let x = (lon2 - lon1) * ((lat1 + lat2) / 2.0).cos();
    let y = lat2 - lat1;
    (x * x + y * y).sqrt() * EARTH_RADIUS_M
}

/// Compass bearing from `a` to `b` in degrees, 0 = north, clockwise.
pub fn bearing(a: FixedLatLon, b: FixedLatLon) -> f64 {
    let delta_lon = (b.lon_deg() - a.lon_deg()) * RAD;
    let lat1 = a.lat_deg() * RAD;
    let lat2 = b.lat_deg() * RAD;
    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    let deg = y.atan2(x) / RAD;
    (deg + 360.0) % 360.0
}

/// Interior angle of the turn u -> v -> w at v, in degrees.
///
/// 180 means dead straight, < 180 bends right, > 180 bends left, and values
/// near 0/360 are u-turns. Computed on the equirectangular plane.
pub fn turn_angle(u: FixedLatLon, v: FixedLatLon, w: FixedLatLon) -> f64 {
    let scale = (v.lat_deg() * RAD).cos();

    let v1x = (u.lon_deg() - v.lon_deg()) * scale;
    let v1y = u.lat_deg() - v.lat_deg();
    let v2x = (w.lon_deg() - v.lon_deg()) * scale;
    let v2y = w.lat_deg() - v.lat_deg();

    let angle1 = v1y.atan2(v1x) / RAD;
    let angle2 = v2y.atan2(v2x) / RAD;
    let mut angle = angle2 - angle1;
    while angle < 0.0 {
        angle += 360.0;
    }
    angle
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProjection {
    pub nearest: FixedLatLon,
    /// Position along the segment in [0, 1].
    pub ratio: f64,
    /// Equirectangular distance from the query point to `nearest`, meters.
    pub distance: f64,
}

/// Project `point` onto the segment (a, b), clamping to the endpoints.
pub fn project_onto_segment(
    point: FixedLatLon,
    a: FixedLatLon,
    b: FixedLatLon,
) -> SegmentProjection {
    let scale = (point.lat_deg() * RAD).cos();

    let px = point.lon_deg() * scale;
    let py = point.lat_deg();
    let ax = a.lon_deg() * scale;
    let ay = a.lat_deg();
    let bx = b.lon_deg() * scale;
    let by = b.lat_deg();

    let dx = bx - ax;
    let dy = by - ay;
    let len2 = dx * dx + dy * dy;

    let mut ratio = if len2 > 0.0 {
        ((px - ax) * dx + (py - ay) * dy) / len2
    } else {
        0.0
    };
    ratio = ratio.clamp(0.0, 1.0);

    let nearest = FixedLatLon::from_degrees(
        a.lat_deg() + ratio * (b.lat_deg() - a.lat_deg()),
        a.lon_deg() + ratio * (b.lon_deg() - a.lon_deg()),
    );

    SegmentProjection {
        nearest,
        ratio,
        distance: approx_distance(point, nearest),
    }
}
