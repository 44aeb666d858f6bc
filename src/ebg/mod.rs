//! Edge-based graph construction
//!
//! Expands the compressed node-based graph into the graph that is actually
//! routed on: one edge-based node per directed traversal of a compressed
//! edge, one edge-based edge per legal turn. Turn restrictions, barriers
//! and the u-turn policy are applied here; turn penalties come from the
//! profile's turn function.

pub mod turns;

use crate::error::{ErrorKind, Result};
use crate::geo::{self, FixedLatLon};
use crate::graph::compress::{CompressedEdge, CompressedGeometryStore};
use crate::graph::node_based::NodeBasedGraph;
use crate::graph::{NodeId, Weight};
use crate::overrides::TurnPenaltyOverrides;
use crate::profile::{Profile, RoadClass, TravelMode};
use crate::restrictions::RestrictionIndex;

use turns::{classify_turn, TurnContext, TurnInstruction};

/// Components smaller than this are flagged so snapping prefers the
/// mainland over islands.
const SMALL_COMPONENT_SIZE: usize = 1000;

/// One directed traversal of a compressed node-based edge.
#[derive(Debug, Clone)]
pub struct EdgeBasedNode {
    /// Node-based tail and head of this traversal.
    pub source: NodeId,
    pub target: NodeId,
    pub geometry_id: u32,
    /// True when this traversal runs against the stored geometry order.
    pub reversed: bool,
    pub weight: Weight,
    pub distance_m: f64,
    pub name_id: u32,
    pub travel_mode: TravelMode,
    pub class: RoadClass,
    pub roundabout: bool,
    pub access_restricted: bool,
    pub way_id: i64,
    /// Id of the opposite traversal of the same compressed edge, if open.
    pub twin: Option<u32>,
    pub small_component: bool,
}

/// A legal turn between two edge-based nodes.
#[derive(Debug, Clone, Copy)]
pub struct EdgeBasedEdge {
    pub source: u32,
    pub target: u32,
    /// Traversal cost of the target plus the turn penalty, deci-seconds.
    pub weight: Weight,
    /// Traversal cost of the target without the penalty, deci-seconds.
    pub duration: Weight,
    /// Second metric, meters.
    pub distance_m: f64,
    pub annotation_id: u32,
}

/// Per-turn record consulted when annotating unpacked routes. Describes
/// the traversal being left: its geometry ends at `via_node`, where the
/// instruction applies, so a route step expands without a separate node
/// table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnAnnotation {
    pub via_node: NodeId,
    pub name_id: u32,
    pub instruction: TurnInstruction,
    pub geometry_id: u32,
    pub reversed: bool,
    pub travel_mode: TravelMode,
}

#[derive(Debug)]
pub struct EdgeBasedGraph {
    pub nodes: Vec<EdgeBasedNode>,
    pub edges: Vec<EdgeBasedEdge>,
    pub annotations: Vec<TurnAnnotation>,
}

impl EdgeBasedGraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

pub struct EdgeExpander<'a> {
    graph: &'a NodeBasedGraph,
    edges: &'a [CompressedEdge],
    geometry: &'a CompressedGeometryStore,
    restrictions: &'a RestrictionIndex,
    profile: &'a dyn Profile,
    turn_overrides: Option<&'a TurnPenaltyOverrides>,
}

impl<'a> EdgeExpander<'a> {
    pub fn new(
        graph: &'a NodeBasedGraph,
        edges: &'a [CompressedEdge],
        geometry: &'a CompressedGeometryStore,
        restrictions: &'a RestrictionIndex,
        profile: &'a dyn Profile,
    ) -> Self {
        Self {
            graph,
            edges,
            geometry,
            restrictions,
            profile,
            turn_overrides: None,
        }
    }

    pub fn with_turn_overrides(mut self, overrides: &'a TurnPenaltyOverrides) -> Self {
        self.turn_overrides = Some(overrides);
        self
    }

    pub fn run(self) -> Result<EdgeBasedGraph> {
        if self.edges.is_empty() {
            return Err(ErrorKind::BadInput(
                "edge expansion on an empty graph".to_string(),
            ));
        }

        let nodes = self.enumerate_nodes();
        let edges_and_annotations = self.expand_turns(&nodes)?;
        let (edges, annotations) = edges_and_annotations;

        let mut ebg = EdgeBasedGraph {
            nodes,
            edges,
            annotations,
        };
        mark_small_components(&mut ebg);
        Ok(ebg)
    }

    /// One edge-based node per open direction of each compressed edge.
    fn enumerate_nodes(&self) -> Vec<EdgeBasedNode> {
        let mut nodes = Vec::with_capacity(self.edges.len() * 2);
        for edge in self.edges {
            let fwd_id = edge.data.forward.then(|| nodes.len() as u32);
            if edge.data.forward {
                nodes.push(EdgeBasedNode {
                    source: edge.source,
                    target: edge.target,
                    geometry_id: edge.geometry_id,
                    reversed: false,
                    weight: edge.data.weight_forward,
                    distance_m: edge.data.distance_m,
                    name_id: edge.data.name_id,
                    travel_mode: edge.data.travel_mode_forward,
                    class: edge.data.class,
                    roundabout: edge.data.roundabout,
                    access_restricted: edge.data.access_restricted,
                    way_id: edge.data.way_id,
                    twin: None,
                    small_component: false,
                });
            }
            if edge.data.backward {
                let rev_id = nodes.len() as u32;
                nodes.push(EdgeBasedNode {
                    source: edge.target,
                    target: edge.source,
                    geometry_id: edge.geometry_id,
                    reversed: true,
                    weight: edge.data.weight_backward,
                    distance_m: edge.data.distance_m,
                    name_id: edge.data.name_id,
                    travel_mode: edge.data.travel_mode_backward,
                    class: edge.data.class,
                    roundabout: edge.data.roundabout,
                    access_restricted: edge.data.access_restricted,
                    way_id: edge.data.way_id,
                    twin: fwd_id,
                    small_component: false,
                });
                if let Some(fwd) = fwd_id {
                    nodes[fwd as usize].twin = Some(rev_id);
                }
            }
        }
        nodes
    }

    fn expand_turns(
        &self,
        nodes: &[EdgeBasedNode],
    ) -> Result<(Vec<EdgeBasedEdge>, Vec<TurnAnnotation>)> {
        let n_via = self.graph.node_count();
        let mut incoming: Vec<Vec<u32>> = vec![Vec::new(); n_via];
        let mut outgoing: Vec<Vec<u32>> = vec![Vec::new(); n_via];
        for (id, node) in nodes.iter().enumerate() {
            outgoing[node.source as usize].push(id as u32);
            incoming[node.target as usize].push(id as u32);
        }

        let mut edges = Vec::new();
        let mut annotations: Vec<TurnAnnotation> = Vec::new();

        for via in 0..n_via as NodeId {
            if self.graph.barrier[via as usize] {
                continue;
            }
            let via_coord = self.graph.coordinates[via as usize];

            for &a_id in &incoming[via as usize] {
                let a = &nodes[a_id as usize];
                let approach = self.point_before_head(a);

                // collect the legal candidates first so forks can be told
                // apart from plain straights
                let mut candidates: Vec<(u32, f64, bool)> = Vec::new();
                for &b_id in &outgoing[via as usize] {
                    let b = &nodes[b_id as usize];
                    let is_u_turn = a.twin == Some(b_id);
                    if is_u_turn && self.profile.u_turn_penalty().is_none() {
                        continue;
                    }
                    if self.restrictions.forbids(a.way_id, via, b.way_id) {
                        continue;
                    }
                    let penalty_override = self
                        .turn_overrides
                        .and_then(|o| o.lookup(a.source, via, b.target));
                    if matches!(penalty_override, Some(p) if p < 0) {
                        continue;
                    }
                    let departure = self.point_after_tail(b);
                    let angle = geo::turn_angle(approach, via_coord, departure);
                    candidates.push((b_id, angle, is_u_turn));
                }

                for &(b_id, angle, is_u_turn) in &candidates {
                    let b = &nodes[b_id as usize];
                    let is_fork = !is_u_turn
                        && (113.0..247.0).contains(&angle)
                        && candidates.iter().any(|&(other, other_angle, other_u)| {
                            other != b_id
                                && !other_u
                                && (113.0..247.0).contains(&other_angle)
                                && nodes[other as usize].class == b.class
                        });

                    let mut penalty =
                        self.profile.turn_penalty(angle, a.travel_mode, b.travel_mode);
                    if is_u_turn {
                        // checked above: u-turn candidates only survive
                        // when the profile grants a finite penalty
                        penalty += self.profile.u_turn_penalty().unwrap_or(0);
                    }
                    if let Some(extra) = self
                        .turn_overrides
                        .and_then(|o| o.lookup(a.source, via, b.target))
                    {
                        penalty = penalty.saturating_add(extra.max(0) as Weight);
                    }

                    let instruction = classify_turn(TurnContext {
                        angle,
                        from_class: a.class,
                        to_class: b.class,
                        from_roundabout: a.roundabout,
                        to_roundabout: b.roundabout,
                        is_u_turn,
                        is_fork,
                    });

                    let annotation = TurnAnnotation {
                        via_node: via,
                        name_id: a.name_id,
                        instruction,
                        geometry_id: a.geometry_id,
                        reversed: a.reversed,
                        travel_mode: a.travel_mode,
                    };
                    let annotation_id = annotations.len() as u32;
                    annotations.push(annotation);

                    let weight = b
                        .weight
                        .checked_add(penalty)
                        .ok_or_else(|| {
                            ErrorKind::InternalInvariant("turn weight overflow".to_string())
                        })?;
                    debug_assert!(weight > 0, "edge-based edge weight must be positive");

                    edges.push(EdgeBasedEdge {
                        source: a_id,
                        target: b_id,
                        weight,
                        duration: b.weight,
                        distance_m: b.distance_m,
                        annotation_id,
                    });
                }
            }
        }

        Ok((edges, annotations))
    }

    /// Coordinate of the last geometry point before the traversal's head.
    fn point_before_head(&self, node: &EdgeBasedNode) -> FixedLatLon {
        let chain = self.geometry.nodes(node.geometry_id);
        let id = if node.reversed {
            // reversed traversal heads toward the stored source; the point
            // before it is the first interior node, or the stored target
            if chain.len() >= 2 {
                chain[0]
            } else {
                node.source
            }
        } else if chain.len() >= 2 {
            chain[chain.len() - 2]
        } else {
            node.source
        };
        self.graph.coordinates[id as usize]
    }

    /// Coordinate of the first geometry point after the traversal's tail.
    fn point_after_tail(&self, node: &EdgeBasedNode) -> FixedLatLon {
        let chain = self.geometry.nodes(node.geometry_id);
        let id = if node.reversed {
            if chain.len() >= 2 {
                chain[chain.len() - 2]
            } else {
                node.target
            }
        } else {
            chain[0]
        };
        self.graph.coordinates[id as usize]
    }
}

/// Flag nodes whose weakly-connected component is below the threshold.
fn mark_small_components(ebg: &mut EdgeBasedGraph) {
    let n = ebg.nodes.len();
    let mut adjacency: Vec<Vec<u32>> = vec![Vec::new(); n];
    for e in &ebg.edges {
        adjacency[e.source as usize].push(e.target);
        adjacency[e.target as usize].push(e.source);
    }
    // twins share physical road even when no turn connects them
    for (id, node) in ebg.nodes.iter().enumerate() {
        if let Some(twin) = node.twin {
            adjacency[id].push(twin);
        }
    }

    let mut component = vec![u32::MAX; n];
    let mut sizes = Vec::new();
    let mut stack = Vec::new();
    for start in 0..n {
        if component[start] != u32::MAX {
            continue;
        }
        let c = sizes.len() as u32;
        let mut size = 0usize;
        component[start] = c;
        stack.push(start as u32);
        while let Some(v) = stack.pop() {
            size += 1;
            for &next in &adjacency[v as usize] {
                if component[next as usize] == u32::MAX {
                    component[next as usize] = c;
                    stack.push(next);
                }
            }
        }
        sizes.push(size);
    }

    for (id, node) in ebg.nodes.iter_mut().enumerate() {
        node.small_component = sizes[component[id] as usize] < SMALL_COMPONENT_SIZE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node_based::test_support::*;
    use crate::graph::GeometryCompressor;
    use crate::profile::CarProfile;
    use crate::restrictions::{InputRestriction, RestrictionKind, RestrictionVia};

    fn expand(graph: &NodeBasedGraph, restrictions: &[InputRestriction]) -> EdgeBasedGraph {
        let profile = CarProfile::new();
        let (edges, geometry) =
            GeometryCompressor::new(graph, profile.traffic_signal_penalty()).run();
        let index = RestrictionIndex::compile(restrictions, graph, &profile).unwrap();
        EdgeExpander::new(graph, &edges, &geometry, &index, &profile)
            .run()
            .unwrap()
    }

    fn t_graph() -> NodeBasedGraph {
        // A(1) - B(2) - C(3), with D(4) north of B
        build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
                node(4, 50.01, 4.01),
            ],
            vec![
                way(100, &[1, 2], &[]),
                way(101, &[2, 3], &[]),
                way(102, &[2, 4], &[]),
            ],
        )
    }

    #[test]
    fn test_two_nodes_per_bidirectional_edge() {
        let graph = build(
            vec![node(1, 50.0, 4.0), node(2, 50.0, 4.01)],
            vec![way(100, &[1, 2], &[])],
        );
        let ebg = expand(&graph, &[]);
        assert_eq!(ebg.node_count(), 2);
        assert_eq!(ebg.nodes[0].twin, Some(1));
        assert_eq!(ebg.nodes[1].twin, Some(0));
    }

    #[test]
    fn test_oneway_has_single_node() {
        let graph = build(
            vec![node(1, 50.0, 4.0), node(2, 50.0, 4.01)],
            vec![way(100, &[1, 2], &[("oneway", "yes")])],
        );
        let ebg = expand(&graph, &[]);
        assert_eq!(ebg.node_count(), 1);
        assert_eq!(ebg.nodes[0].twin, None);
    }

    #[test]
    fn test_straight_through_turn_exists() {
        let graph = t_graph();
        let ebg = expand(&graph, &[]);
        let a_to_b = ebg
            .nodes
            .iter()
            .position(|n| {
                n.source == graph.internal_id(1).unwrap()
                    && n.target == graph.internal_id(2).unwrap()
            })
            .unwrap() as u32;
        let b_to_c = ebg
            .nodes
            .iter()
            .position(|n| {
                n.source == graph.internal_id(2).unwrap()
                    && n.target == graph.internal_id(3).unwrap()
            })
            .unwrap() as u32;
        let turn = ebg
            .edges
            .iter()
            .find(|e| e.source == a_to_b && e.target == b_to_c)
            .expect("straight turn must exist");
        let annotation = ebg.annotations[turn.annotation_id as usize];
        assert_eq!(annotation.instruction, TurnInstruction::GoStraight);
        assert_eq!(annotation.via_node, graph.internal_id(2).unwrap());
        // weight covers the next edge plus a zero straight penalty
        assert_eq!(turn.weight, ebg.nodes[b_to_c as usize].weight);
    }

    #[test]
    fn test_no_restriction_removes_turn() {
        let graph = t_graph();
        let restriction = InputRestriction {
            kind: RestrictionKind::No,
            from_way: 100,
            via: RestrictionVia::Node(2),
            to_way: 101,
            exceptions: vec![],
        };
        let without = expand(&graph, &[]);
        let with = expand(&graph, &[restriction]);
        assert_eq!(with.edge_count(), without.edge_count() - 1);
    }

    #[test]
    fn test_only_restriction_keeps_single_turn() {
        let graph = t_graph();
        let restriction = InputRestriction {
            kind: RestrictionKind::Only,
            from_way: 100,
            via: RestrictionVia::Node(2),
            to_way: 102,
            exceptions: vec![],
        };
        let ebg = expand(&graph, &[restriction]);
        let a_to_b = ebg
            .nodes
            .iter()
            .position(|n| {
                n.source == graph.internal_id(1).unwrap()
                    && n.target == graph.internal_id(2).unwrap()
            })
            .unwrap() as u32;
        let from_a: Vec<_> = ebg.edges.iter().filter(|e| e.source == a_to_b).collect();
        assert_eq!(from_a.len(), 1);
        let target = &ebg.nodes[from_a[0].target as usize];
        assert_eq!(target.way_id, 102);
    }

    #[test]
    fn test_barrier_blocks_all_turns() {
        let mut nodes = vec![
            node(1, 50.0, 4.00),
            node(2, 50.0, 4.01),
            node(3, 50.0, 4.02),
        ];
        nodes[1].tags = tags(&[("barrier", "gate"), ("access", "no")]);
        let graph = build(nodes, vec![way(100, &[1, 2], &[]), way(101, &[2, 3], &[])]);
        let ebg = expand(&graph, &[]);
        let b = graph.internal_id(2).unwrap();
        assert!(ebg
            .edges
            .iter()
            .all(|e| ebg.annotations[e.annotation_id as usize].via_node != b));
    }

    #[test]
    fn test_uturn_emitted_with_penalty() {
        // dead-end: A - B; the only continuation of A->B is the u-turn
        let graph = build(
            vec![node(1, 50.0, 4.0), node(2, 50.0, 4.01)],
            vec![way(100, &[1, 2], &[])],
        );
        let ebg = expand(&graph, &[]);
        let uturns: Vec<_> = ebg
            .edges
            .iter()
            .filter(|e| {
                ebg.annotations[e.annotation_id as usize].instruction == TurnInstruction::UTurn
            })
            .collect();
        assert_eq!(uturns.len(), 2);
        let profile = CarProfile::new();
        for e in uturns {
            let b = &ebg.nodes[e.target as usize];
            assert!(e.weight >= b.weight + profile.u_turn_penalty().unwrap());
        }
    }

    #[test]
    fn test_weights_strictly_positive() {
        let ebg = expand(&t_graph(), &[]);
        assert!(ebg.edges.iter().all(|e| e.weight > 0));
    }

    #[test]
    fn test_all_in_one_component() {
        let ebg = expand(&t_graph(), &[]);
        // tiny test graph: everything is a "small" component
        assert!(ebg.nodes.iter().all(|n| n.small_component));
    }
}
