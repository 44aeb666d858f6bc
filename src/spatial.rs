//! Nearest-edge snapping
//!
//! R-tree over per-segment records of the edge-based graph. Snapping
//! projects the query coordinate onto the nearest segment and produces a
//! phantom point with cumulative weight offsets for both traversal
//! directions. Candidates in flagged small components are skipped unless
//! nothing else is in range.

use rstar::primitives::{GeomWithData, Line};
use rstar::RTree;

use crate::ebg::EdgeBasedGraph;
use crate::geo::{self, FixedLatLon};
use crate::graph::compress::CompressedGeometryStore;
use crate::graph::{NodeId, Weight, INVALID_NODE};
use crate::query::phantom::PhantomPoint;

/// Hard snapping radius; coordinates further from any road fail with
/// `NoSegment`.
pub const MAX_SNAP_DISTANCE_M: f64 = 5000.0;

/// Weight array access the snapper needs; satisfied by the owned geometry
/// store and by the mmapped view.
pub trait GeometryWeights {
    fn forward_weights_of(&self, geometry_id: u32) -> &[Weight];
    fn reverse_weights_of(&self, geometry_id: u32) -> &[Weight];
}

impl GeometryWeights for CompressedGeometryStore {
    fn forward_weights_of(&self, geometry_id: u32) -> &[Weight] {
        self.forward_weights(geometry_id)
    }

    fn reverse_weights_of(&self, geometry_id: u32) -> &[Weight] {
        self.reverse_weights(geometry_id)
    }
}

/// One geometry segment of one compressed edge, as stored in the R-tree
/// leaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRecord {
    pub a: FixedLatLon,
    pub b: FixedLatLon,
    /// Traversal in geometry order, or `INVALID_NODE` when closed.
    pub forward_node: u32,
    pub reverse_node: u32,
    pub geometry_id: u32,
    pub segment_index: u32,
    pub name_id: u32,
    pub small_component: bool,
}

/// Per-coordinate bearing constraint in degrees.
#[derive(Debug, Clone, Copy)]
pub struct BearingFilter {
    pub bearing: u16,
    pub tolerance: u16,
}

impl BearingFilter {
    fn matches(&self, segment_bearing: f64) -> bool {
        let diff = (segment_bearing - self.bearing as f64).rem_euclid(360.0);
        let diff = diff.min(360.0 - diff);
        diff <= self.tolerance as f64
    }
}

pub struct SpatialIndex {
    tree: RTree<GeomWithData<Line<[f64; 2]>, u32>>,
    records: Vec<SegmentRecord>,
}

impl SpatialIndex {
    pub fn from_records(records: Vec<SegmentRecord>) -> Self {
        let leaves = records
            .iter()
            .enumerate()
            .map(|(i, r)| {
                GeomWithData::new(
                    Line::new(
                        [r.a.lon_deg(), r.a.lat_deg()],
                        [r.b.lon_deg(), r.b.lat_deg()],
                    ),
                    i as u32,
                )
            })
            .collect();
        Self {
            tree: RTree::bulk_load(leaves),
            records,
        }
    }

    pub fn records(&self) -> &[SegmentRecord] {
        &self.records
    }

    /// Project `coordinate` onto the nearest matching segment. Small
    /// components lose against anything on the mainland; a bearing filter
    /// drops traversal directions that point the wrong way.
    pub fn snap<G: GeometryWeights>(
        &self,
        geometry: &G,
        coordinate: FixedLatLon,
        bearing: Option<BearingFilter>,
    ) -> Option<PhantomPoint> {
        let query = [coordinate.lon_deg(), coordinate.lat_deg()];
        let mut island_fallback: Option<PhantomPoint> = None;

        for leaf in self.tree.nearest_neighbor_iter(&query) {
            let record = &self.records[leaf.data as usize];
            let projection = geo::project_onto_segment(coordinate, record.a, record.b);
            if projection.distance > MAX_SNAP_DISTANCE_M {
                break;
            }

            let Some(phantom) = self.make_phantom(geometry, record, projection, bearing)
            else {
                continue;
            };

            if record.small_component {
                island_fallback.get_or_insert(phantom);
                continue;
            }
            return Some(phantom);
        }

        island_fallback
    }

    fn make_phantom<G: GeometryWeights>(
        &self,
        geometry: &G,
        record: &SegmentRecord,
        projection: geo::SegmentProjection,
        bearing: Option<BearingFilter>,
    ) -> Option<PhantomPoint> {
        let mut forward_node = record.forward_node;
        let mut reverse_node = record.reverse_node;
        if let Some(filter) = bearing {
            let segment_bearing = geo::bearing(record.a, record.b);
            if !filter.matches(segment_bearing) {
                forward_node = INVALID_NODE;
            }
            if !filter.matches((segment_bearing + 180.0) % 360.0) {
                reverse_node = INVALID_NODE;
            }
        }
        if forward_node == INVALID_NODE && reverse_node == INVALID_NODE {
            return None;
        }

        let fwd = geometry.forward_weights_of(record.geometry_id);
        let rev = geometry.reverse_weights_of(record.geometry_id);
        let seg = record.segment_index as usize;

        let within_fwd = (projection.ratio * fwd[seg] as f64).round() as Weight;
        let forward_offset: Weight =
            fwd[..seg].iter().sum::<Weight>() + within_fwd;
        let forward_total: Weight = fwd.iter().sum();

        let within_rev = ((1.0 - projection.ratio) * rev[seg] as f64).round() as Weight;
        let reverse_offset: Weight =
            rev[seg + 1..].iter().sum::<Weight>() + within_rev;
        let reverse_total: Weight = rev.iter().sum();

        Some(PhantomPoint {
            forward_node: (forward_node != INVALID_NODE).then_some(forward_node),
            reverse_node: (reverse_node != INVALID_NODE).then_some(reverse_node),
            forward_offset,
            forward_weight: forward_total.saturating_sub(forward_offset),
            reverse_offset,
            reverse_weight: reverse_total.saturating_sub(reverse_offset),
            segment_position: record.segment_index,
            location: projection.nearest,
            name_id: record.name_id,
            geometry_id: record.geometry_id,
            small_component: record.small_component,
        })
    }
}

/// Flatten the edge-based graph into per-segment leaf records.
pub fn build_segment_records(
    ebg: &EdgeBasedGraph,
    geometry: &CompressedGeometryStore,
    coordinates: &[FixedLatLon],
) -> Vec<SegmentRecord> {
    let mut records = Vec::new();
    for (id, node) in ebg.nodes.iter().enumerate() {
        // one traversal per compressed edge carries the records; the
        // reverse-only case has no forward twin
        if node.reversed && node.twin.is_some() {
            continue;
        }
        let (forward_node, reverse_node, chain_start) = if node.reversed {
            (INVALID_NODE, id as u32, node.target)
        } else {
            (id as u32, node.twin.unwrap_or(INVALID_NODE), node.source)
        };

        let chain = geometry.nodes(node.geometry_id);
        let mut prev: NodeId = chain_start;
        for (segment_index, &head) in chain.iter().enumerate() {
            records.push(SegmentRecord {
                a: coordinates[prev as usize],
                b: coordinates[head as usize],
                forward_node,
                reverse_node,
                geometry_id: node.geometry_id,
                segment_index: segment_index as u32,
                name_id: node.name_id,
                small_component: node.small_component,
            });
            prev = head;
        }
    }
    records
}
