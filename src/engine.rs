//! Route engine
//!
//! Orchestrates one query: hint or R-tree snapping, per-leg bidirectional
//! search with u-turn policy, unpacking, annotation, the repair pass, and
//! response formatting. One engine instance serves one pinned dataset;
//! workers own their search state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ebg::turns::TurnInstruction;
use crate::error::{ErrorKind, Result};
use crate::facade::RouteData;
use crate::geo::{self, FixedLatLon};
use crate::graph::INVALID_NODE;
use crate::polyline::{self, PolylinePrecision};
use crate::query::{
    assemble_leg, repair_instructions, unpack_path, BidirSearch, Hint, PathData, PhantomPoint,
    SearchOptions,
};
use crate::response::{
    linestring, GeometryFormat, RouteGeometry, RouteInstruction, RouteOptions, RouteResponse,
    RouteSummary,
};
use crate::simplify;
use crate::spatial::BearingFilter;

pub struct RouteEngine {
    data: Arc<dyn RouteData>,
}

impl RouteEngine {
    pub fn new(data: Arc<dyn RouteData>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Arc<dyn RouteData> {
        &self.data
    }

    /// Answer a route query over the given waypoints.
    pub fn route(
        &self,
        coordinates: &[FixedLatLon],
        options: &RouteOptions,
    ) -> Result<RouteResponse> {
        if coordinates.len() < 2 {
            return Err(ErrorKind::NoRoute);
        }
        if options.metric >= self.data.query_graph().metric_count() {
            return Err(ErrorKind::BadInput(format!(
                "metric {} not present in dataset",
                options.metric
            )));
        }
        let deadline = options
            .deadline_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let phantoms = self.snap_all(coordinates, options)?;

        let mut search = BidirSearch::new(self.data.query_graph(), self.data.core_flags());
        let mut path: Vec<PathData> = Vec::new();
        let mut points: Vec<FixedLatLon> = Vec::new();
        let mut total_duration_ds: i64 = 0;
        let mut starts_with_uturn = false;

        for leg in 0..phantoms.len() - 1 {
            let source = &phantoms[leg];
            let target = &phantoms[leg + 1];
            let uturn_allowed = options.uturn_allowed.get(leg).copied().unwrap_or(false);

            let same_forward_edge = source.shares_forward_edge(target);
            let reversed_offsets =
                same_forward_edge && source.forward_offset > target.forward_offset;
            let force_loop = reversed_offsets && !uturn_allowed;

            let (forward_seeds, reverse_seeds) = if force_loop {
                (source.source_seeds(true, false), target.target_seeds(true, false))
            } else {
                (source.source_seeds(true, true), target.target_seeds(true, true))
            };

            let result = search.run(
                &forward_seeds,
                &reverse_seeds,
                &SearchOptions {
                    metric: options.metric,
                    force_loop_forward: force_loop,
                    force_loop_reverse: force_loop,
                    deadline,
                },
            )?;
            total_duration_ds += result.weight;

            let unpacked =
                unpack_path(self.data.query_graph(), &result.packed_path, options.metric)?;
            let packed_first = *result.packed_path.first().expect("non-empty path");
            let packed_last = *result.packed_path.last().expect("non-empty path");
            let mut leg_path = assemble_leg(
                self.data.as_ref(),
                &unpacked,
                packed_first,
                packed_last,
                source,
                target,
            )?;

            // a leg that reverses on its own edge starts with a u-turn
            // maneuver; every non-final leg ends on the via marker, and
            // legs are never merged across it
            let leg_reversed = source.reverse_node == Some(packed_first);
            if leg == 0 {
                starts_with_uturn = reversed_offsets && uturn_allowed && leg_reversed;
            }
            if leg + 1 < phantoms.len() - 1 {
                if let Some(last) = leg_path.last_mut() {
                    last.instruction = TurnInstruction::ReachViaLocation;
                }
            }

            // geometry points: leg source location, interior nodes, then
            // the snapped target stands in for the terminal marker
            if leg == 0 {
                points.push(source.location);
            }
            for p in &leg_path {
                if p.node == INVALID_NODE {
                    points.push(target.location);
                } else {
                    points.push(self.data.coordinate_of(p.node));
                }
            }

            path.append(&mut leg_path);
        }

        repair_instructions(&mut path);

        let total_distance_m: f64 = points
            .windows(2)
            .map(|w| geo::haversine_distance(w[0], w[1]))
            .sum();

        let summary = RouteSummary {
            total_distance_m: total_distance_m.round(),
            total_duration_s: total_duration_ds as f64 / 10.0,
            start_street_name: self.data.name_of(phantoms[0].name_id).to_string(),
            end_street_name: self
                .data
                .name_of(phantoms[phantoms.len() - 1].name_id)
                .to_string(),
        };

        let instructions = if options.instructions {
            build_instructions(self.data.as_ref(), &path, &points, starts_with_uturn)
        } else {
            Vec::new()
        };

        let overview = simplify::douglas_peucker(&points, options.zoom);
        let geometry = match options.geometry {
            GeometryFormat::EncodedPolyline5 => {
                RouteGeometry::Encoded(polyline::encode(&overview, PolylinePrecision::Five))
            }
            GeometryFormat::EncodedPolyline6 => {
                RouteGeometry::Encoded(polyline::encode(&overview, PolylinePrecision::Six))
            }
            GeometryFormat::Geojson => RouteGeometry::GeoJson(linestring(&overview)),
            GeometryFormat::None => RouteGeometry::Empty,
        };

        let hints = phantoms
            .iter()
            .map(|phantom| {
                Hint {
                    phantom: *phantom,
                    checksum: self.data.checksum(),
                }
                .encode()
            })
            .collect();

        let datasource_names = used_datasources(self.data.as_ref(), &path);

        Ok(RouteResponse {
            summary,
            geometry,
            instructions,
            hints,
            datasource_names,
        })
    }

    fn snap_all(
        &self,
        coordinates: &[FixedLatLon],
        options: &RouteOptions,
    ) -> Result<Vec<PhantomPoint>> {
        let mut phantoms = Vec::with_capacity(coordinates.len());
        for (index, &coordinate) in coordinates.iter().enumerate() {
            // a valid hint short-circuits the R-tree
            if let Some(Some(encoded)) = options.hints.get(index) {
                if let Some(hint) = Hint::decode(encoded, self.data.checksum()) {
                    phantoms.push(hint.phantom);
                    continue;
                }
            }
            let bearing = options
                .bearings
                .get(index)
                .copied()
                .flatten()
                .map(|(bearing, tolerance)| BearingFilter { bearing, tolerance });
            let phantom = self
                .data
                .locate_nearest_edge(coordinate, bearing)
                .ok_or(ErrorKind::NoSegment { index })?;
            phantoms.push(phantom);
        }
        Ok(phantoms)
    }
}

/// Collapse path data into announced maneuvers with distances between
/// them.
fn build_instructions(
    data: &dyn RouteData,
    path: &[PathData],
    points: &[FixedLatLon],
    starts_with_uturn: bool,
) -> Vec<RouteInstruction> {
    let mut instructions = Vec::new();
    let mut distance_acc = 0.0f64;
    let mut duration_acc = 0u64;

    let initial = if starts_with_uturn {
        TurnInstruction::UTurn
    } else {
        TurnInstruction::HeadOn
    };
    // points[0] is the leg start; path[i] corresponds to points[i + 1]
    instructions.push(RouteInstruction {
        instruction: initial as u8,
        street_name: path
            .first()
            .map(|p| data.name_of(p.name_id).to_string())
            .unwrap_or_default(),
        distance_m: 0.0,
        duration_s: 0.0,
        position: 0,
    });

    for (i, p) in path.iter().enumerate() {
        if i + 1 < points.len() {
            distance_acc += geo::approx_distance(points[i], points[i + 1]);
        }
        duration_acc += p.segment_duration as u64;
        if p.instruction.is_necessary() {
            if let Some(last) = instructions.last_mut() {
                last.distance_m = distance_acc.round();
                last.duration_s = duration_acc as f64 / 10.0;
            }
            distance_acc = 0.0;
            duration_acc = 0;
            instructions.push(RouteInstruction {
                instruction: p.instruction as u8,
                street_name: data.name_of(p.name_id).to_string(),
                distance_m: 0.0,
                duration_s: 0.0,
                position: i + 1,
            });
        }
    }

    instructions
}

fn used_datasources(data: &dyn RouteData, path: &[PathData]) -> Vec<String> {
    let mut seen = Vec::new();
    for p in path {
        if !seen.contains(&p.datasource) {
            seen.push(p.datasource);
        }
    }
    seen.sort_unstable();
    seen.into_iter()
        .map(|s| data.datasource_name(s).to_string())
        .collect()
}
