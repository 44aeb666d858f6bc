//! Query API types
//!
//! Wire-level request options and the route response. Distances are
//! meters, durations seconds; geometry is delivered in the requested
//! format.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::FixedLatLon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GeometryFormat {
    #[default]
    EncodedPolyline5,
    EncodedPolyline6,
    Geojson,
    None,
}

/// Per-request options; field names follow the HTTP parameters.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RouteOptions {
    /// Alternative-route ranking is out of scope; accepted, ignored.
    #[serde(default)]
    pub alternative: bool,
    #[serde(default)]
    pub geometry: GeometryFormat,
    #[serde(default = "default_true")]
    pub instructions: bool,
    /// Overview zoom level for geometry simplification.
    #[serde(default = "default_zoom")]
    pub zoom: u32,
    /// Per-coordinate (bearing, tolerance) in degrees.
    #[serde(default)]
    #[schema(value_type = Vec<Option<Vec<u16>>>)]
    pub bearings: Vec<Option<(u16, u16)>>,
    /// Per-waypoint permission to turn around on the snapped edge.
    #[serde(default)]
    pub uturn_allowed: Vec<bool>,
    /// Opaque phantom snapshots from a previous response.
    #[serde(default)]
    pub hints: Vec<Option<String>>,
    /// Metric index into the dataset's edge filters.
    #[serde(default)]
    pub metric: usize,
    /// Wall-clock budget for the whole request.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_zoom() -> u32 {
    crate::simplify::MAX_ZOOM - 1
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            alternative: false,
            geometry: GeometryFormat::default(),
            instructions: true,
            zoom: default_zoom(),
            bearings: Vec::new(),
            uturn_allowed: Vec::new(),
            hints: Vec::new(),
            metric: 0,
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteSummary {
    pub total_distance_m: f64,
    pub total_duration_s: f64,
    pub start_street_name: String,
    pub end_street_name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteInstruction {
    /// Numeric turn code, matching the instruction enum.
    pub instruction: u8,
    pub street_name: String,
    pub distance_m: f64,
    pub duration_s: f64,
    /// Index into the route geometry.
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RouteGeometry {
    Encoded(String),
    GeoJson(serde_json::Value),
    Empty,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteResponse {
    pub summary: RouteSummary,
    /// Encoded polyline string, GeoJSON object, or null.
    #[schema(value_type = Object)]
    pub geometry: RouteGeometry,
    pub instructions: Vec<RouteInstruction>,
    /// One hint per input coordinate, for reuse in the next request.
    pub hints: Vec<String>,
    pub datasource_names: Vec<String>,
}

/// Well-formed failure payload for per-query errors.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: u16,
    pub status_message: String,
}

pub(crate) fn linestring(points: &[FixedLatLon]) -> serde_json::Value {
    serde_json::json!({
        "type": "LineString",
        "coordinates": points
            .iter()
            .map(|p| vec![p.lon_deg(), p.lat_deg()])
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options: RouteOptions = serde_json::from_str("{}").unwrap();
        assert!(options.instructions);
        assert_eq!(options.zoom, crate::simplify::MAX_ZOOM - 1);
        assert_eq!(options.geometry, GeometryFormat::EncodedPolyline5);
    }

    #[test]
    fn test_geometry_format_names() {
        let f: GeometryFormat = serde_json::from_str("\"geojson\"").unwrap();
        assert_eq!(f, GeometryFormat::Geojson);
        let f: GeometryFormat = serde_json::from_str("\"encoded_polyline6\"").unwrap();
        assert_eq!(f, GeometryFormat::EncodedPolyline6);
    }

    #[test]
    fn test_linestring_shape() {
        let points = vec![FixedLatLon::from_degrees(50.0, 4.0)];
        let v = linestring(&points);
        assert_eq!(v["type"], "LineString");
        assert_eq!(v["coordinates"][0][0], 4.0);
    }
}
