//! Degree-2 chain compression
//!
//! Collapses runs of degree-2 nodes whose edges agree on name, class,
//! travel mode and flags into single edges with an explicit geometry chain.
//! Each chain segment keeps its own forward/reverse weight and datasource
//! id so later per-segment speed overrides stay addressable. The sum of
//! segment weights equals the merged edge weight in both directions.

use crate::graph::node_based::{NodeBasedEdgeData, NodeBasedGraph};
use crate::graph::{DatasourceId, EdgeId, NodeId, Weight, DATASOURCE_PROFILE};

/// Upper bound on segments per chain, imposed by the on-disk range table.
const MAX_CHAIN_SEGMENTS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometrySegment {
    /// Segment head; the last segment's head is the edge target.
    pub node: NodeId,
    pub forward_weight: Weight,
    pub reverse_weight: Weight,
    pub datasource: DatasourceId,
}

/// Flat storage of all geometry chains, indexed by geometry id.
#[derive(Debug, Default, Clone)]
pub struct CompressedGeometryStore {
    offsets: Vec<u32>,
    nodes: Vec<NodeId>,
    forward_weights: Vec<Weight>,
    reverse_weights: Vec<Weight>,
    datasources: Vec<DatasourceId>,
}

impl CompressedGeometryStore {
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            ..Default::default()
        }
    }

    pub fn push_chain(&mut self, segments: &[GeometrySegment]) -> u32 {
        debug_assert!(!segments.is_empty());
        debug_assert!(segments.len() <= MAX_CHAIN_SEGMENTS);
        for s in segments {
            self.nodes.push(s.node);
            self.forward_weights.push(s.forward_weight);
            self.reverse_weights.push(s.reverse_weight);
            self.datasources.push(s.datasource);
        }
        self.offsets.push(self.nodes.len() as u32);
        (self.offsets.len() - 2) as u32
    }

    pub fn chain_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn chain_lengths(&self) -> Vec<u32> {
        self.offsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect()
    }

    fn range(&self, id: u32) -> std::ops::Range<usize> {
        let start = self.offsets[id as usize] as usize;
        let end = self.offsets[id as usize + 1] as usize;
        start..end
    }

    pub fn nodes(&self, id: u32) -> &[NodeId] {
        &self.nodes[self.range(id)]
    }

    pub fn forward_weights(&self, id: u32) -> &[Weight] {
        &self.forward_weights[self.range(id)]
    }

    pub fn reverse_weights(&self, id: u32) -> &[Weight] {
        &self.reverse_weights[self.range(id)]
    }

    pub fn datasources(&self, id: u32) -> &[DatasourceId] {
        &self.datasources[self.range(id)]
    }

    /// Overwrite one segment's weights, tagging its provenance. Returns the
    /// previous (forward, reverse) weights.
    pub fn override_segment(
        &mut self,
        id: u32,
        segment: usize,
        forward: Weight,
        reverse: Weight,
        datasource: DatasourceId,
    ) -> (Weight, Weight) {
        let idx = self.offsets[id as usize] as usize + segment;
        let old = (self.forward_weights[idx], self.reverse_weights[idx]);
        self.forward_weights[idx] = forward;
        self.reverse_weights[idx] = reverse;
        self.datasources[idx] = datasource;
        old
    }

    /// Replace the per-segment datasource array, as read from
    /// `.datasource_indexes`.
    pub fn overlay_datasources(
        &mut self,
        datasources: &[DatasourceId],
    ) -> crate::error::Result<()> {
        if datasources.len() != self.nodes.len() {
            return Err(crate::error::ErrorKind::IncompatibleDataset(format!(
                "datasource table has {} entries for {} geometry segments",
                datasources.len(),
                self.nodes.len()
            )));
        }
        self.datasources = datasources.to_vec();
        Ok(())
    }

    /// Borrowed views of the flat arrays, in (offsets, nodes, forward,
    /// reverse, datasources) order.
    pub(crate) fn parts(
        &self,
    ) -> (&[u32], &[NodeId], &[Weight], &[Weight], &[DatasourceId]) {
        (
            &self.offsets,
            &self.nodes,
            &self.forward_weights,
            &self.reverse_weights,
            &self.datasources,
        )
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Vec<u32>, Vec<NodeId>, Vec<Weight>, Vec<Weight>, Vec<DatasourceId>) {
        (
            self.offsets,
            self.nodes,
            self.forward_weights,
            self.reverse_weights,
            self.datasources,
        )
    }

    pub(crate) fn from_parts(
        offsets: Vec<u32>,
        nodes: Vec<NodeId>,
        forward_weights: Vec<Weight>,
        reverse_weights: Vec<Weight>,
        datasources: Vec<DatasourceId>,
    ) -> Self {
        Self {
            offsets,
            nodes,
            forward_weights,
            reverse_weights,
            datasources,
        }
    }
}

/// An edge surviving compression, carrying its geometry id.
#[derive(Debug, Clone)]
pub struct CompressedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub geometry_id: u32,
    pub data: NodeBasedEdgeData,
}

pub struct GeometryCompressor<'a> {
    graph: &'a NodeBasedGraph,
    signal_penalty: Weight,
    /// Restriction and penalty via nodes; collapsing them would lose the
    /// turn they anchor.
    protected: Vec<bool>,
    visited: Vec<bool>,
    edges: Vec<CompressedEdge>,
    geometry: CompressedGeometryStore,
}

/// One directed view of a node-based edge.
#[derive(Debug, Clone, Copy)]
struct Oriented {
    edge: EdgeId,
    from: NodeId,
    to: NodeId,
    weight: Weight,
    reverse_weight: Weight,
    open: bool,
    reverse_open: bool,
}

impl<'a> GeometryCompressor<'a> {
    pub fn new(graph: &'a NodeBasedGraph, signal_penalty: Weight) -> Self {
        Self {
            graph,
            signal_penalty,
            protected: vec![false; graph.node_count()],
            visited: vec![false; graph.edge_count()],
            edges: Vec::new(),
            geometry: CompressedGeometryStore::new(),
        }
    }

    pub fn with_protected_nodes(mut self, nodes: &[NodeId]) -> Self {
        for &node in nodes {
            self.protected[node as usize] = true;
        }
        self
    }

    /// Collapse all chains; returns the surviving edges and their geometry.
    pub fn run(mut self) -> (Vec<CompressedEdge>, CompressedGeometryStore) {
        let collapsible: Vec<bool> = (0..self.graph.node_count() as NodeId)
            .map(|n| self.is_collapsible(n))
            .collect();

        for node in 0..self.graph.node_count() as NodeId {
            if collapsible[node as usize] {
                continue;
            }
            for &edge in self.graph.incident_edges(node) {
                if self.visited[edge as usize] {
                    continue;
                }
                self.walk_chain(node, edge, &collapsible);
            }
        }

        // chains forming closed rings of collapsible nodes have no natural
        // endpoint; emit their edges unmerged
        for edge in 0..self.graph.edge_count() as EdgeId {
            if !self.visited[edge as usize] {
                let (source, data) = {
                    let e = self.graph.edge(edge);
                    (e.source, e.data.clone())
                };
                self.visited[edge as usize] = true;
                let oriented = self.orient(edge, source);
                self.emit(source, vec![oriented], &data);
            }
        }

        (self.edges, self.geometry)
    }

    fn orient(&self, edge: EdgeId, from: NodeId) -> Oriented {
        let e = self.graph.edge(edge);
        if e.source == from {
            Oriented {
                edge,
                from,
                to: e.target,
                weight: e.data.weight_forward,
                reverse_weight: e.data.weight_backward,
                open: e.data.forward,
                reverse_open: e.data.backward,
            }
        } else {
            Oriented {
                edge,
                from,
                to: e.source,
                weight: e.data.weight_backward,
                reverse_weight: e.data.weight_forward,
                open: e.data.backward,
                reverse_open: e.data.forward,
            }
        }
    }

    /// A node is collapsible iff it sits between exactly two compatible
    /// edges, is not a barrier or signal, and its two neighbors differ
    /// (parallel ways are never merged).
    fn is_collapsible(&self, node: NodeId) -> bool {
        if self.graph.barrier[node as usize]
            || self.graph.signal[node as usize]
            || self.protected[node as usize]
        {
            return false;
        }
        let incident = self.graph.incident_edges(node);
        if incident.len() != 2 {
            return false;
        }
        let (e1, e2) = (incident[0], incident[1]);
        if e1 == e2 {
            return false;
        }
        let a = self.graph.other_endpoint(e1, node);
        let b = self.graph.other_endpoint(e2, node);
        if a == b || a == node || b == node {
            return false;
        }

        let in1 = self.orient(e1, a); // a -> node
        let out2 = self.orient(e2, node); // node -> b
        let edge1 = self.graph.edge(e1);
        let edge2 = self.graph.edge(e2);
        let d1 = &edge1.data;
        let d2 = &edge2.data;

        d1.name_id == d2.name_id
            && d1.class == d2.class
            && d1.access_restricted == d2.access_restricted
            && d1.roundabout == d2.roundabout
            && in1.open == out2.open
            && in1.reverse_open == out2.reverse_open
            && (in1.open || in1.reverse_open)
            && oriented_mode(d1, a == edge1.source) == oriented_mode(d2, node == edge2.source)
    }

    fn walk_chain(&mut self, start: NodeId, first_edge: EdgeId, collapsible: &[bool]) {
        let template = self.graph.edge(first_edge).data.clone();
        let mut chain_start = start;
        let mut current = self.orient(first_edge, start);
        self.visited[first_edge as usize] = true;
        let mut chain = vec![current];

        loop {
            let head = current.to;
            if !collapsible[head as usize] {
                self.emit(chain_start, chain, &template);
                return;
            }
            if chain.len() >= MAX_CHAIN_SEGMENTS {
                // split an over-long chain; the break node becomes a
                // regular endpoint and the walk continues from it
                self.emit(chain_start, std::mem::take(&mut chain), &template);
                chain_start = head;
            }
            let next = self
                .graph
                .incident_edges(head)
                .iter()
                .copied()
                .find(|&e| e != current.edge && !self.visited[e as usize]);
            let Some(next) = next else {
                if !chain.is_empty() {
                    self.emit(chain_start, chain, &template);
                }
                return;
            };
            current = self.orient(next, head);
            self.visited[next as usize] = true;
            chain.push(current);
        }
    }

    /// Materialize a chain as one compressed edge with its geometry.
    fn emit(&mut self, source: NodeId, chain: Vec<Oriented>, template: &NodeBasedEdgeData) {
        debug_assert!(!chain.is_empty());
        let target = chain.last().unwrap().to;

        let mut segments: Vec<GeometrySegment> = chain
            .iter()
            .map(|o| GeometrySegment {
                node: o.to,
                forward_weight: o.weight,
                reverse_weight: o.reverse_weight,
                datasource: DATASOURCE_PROFILE,
            })
            .collect();

        // signal cost lands on the segment that arrives at the signal
        if self.graph.signal[target as usize] {
            let last = segments.last_mut().unwrap();
            if chain.last().unwrap().open {
                last.forward_weight += self.signal_penalty;
            }
        }
        if self.graph.signal[source as usize] {
            let first = segments.first_mut().unwrap();
            if chain.first().unwrap().reverse_open {
                first.reverse_weight += self.signal_penalty;
            }
        }

        let forward = chain.first().unwrap().open;
        let backward = chain.first().unwrap().reverse_open;
        let weight_forward: Weight = if forward {
            segments.iter().map(|s| s.forward_weight).sum()
        } else {
            0
        };
        let weight_backward: Weight = if backward {
            segments.iter().map(|s| s.reverse_weight).sum()
        } else {
            0
        };
        let distance_m: f64 = chain
            .iter()
            .map(|o| self.graph.edge(o.edge).data.distance_m)
            .sum();

        let geometry_id = self.geometry.push_chain(&segments);

        let mut data = template.clone();
        data.forward = forward;
        data.backward = backward;
        data.weight_forward = weight_forward;
        data.weight_backward = weight_backward;
        data.distance_m = distance_m;
        if !forward {
            data.travel_mode_forward = crate::profile::TravelMode::Inaccessible;
        }
        if !backward {
            data.travel_mode_backward = crate::profile::TravelMode::Inaccessible;
        }

        self.edges.push(CompressedEdge {
            source,
            target,
            geometry_id,
            data,
        });
    }
}

fn oriented_mode(
    data: &NodeBasedEdgeData,
    along_storage: bool,
) -> (crate::profile::TravelMode, crate::profile::TravelMode) {
    if along_storage {
        (data.travel_mode_forward, data.travel_mode_backward)
    } else {
        (data.travel_mode_backward, data.travel_mode_forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node_based::test_support::*;

    fn compress(graph: &NodeBasedGraph) -> (Vec<CompressedEdge>, CompressedGeometryStore) {
        GeometryCompressor::new(graph, 70).run()
    }

    #[test]
    fn test_straight_chain_collapses() {
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
                node(4, 50.0, 4.03),
            ],
            vec![way(100, &[1, 2, 3, 4], &[])],
        );
        let (edges, geometry) = compress(&graph);
        assert_eq!(edges.len(), 1);
        let e = &edges[0];
        assert_eq!(geometry.nodes(e.geometry_id).len(), 3);
        // interior nodes 2 and 3, then the target
        let internal_2 = graph.internal_id(2).unwrap();
        let internal_3 = graph.internal_id(3).unwrap();
        assert_eq!(
            geometry.nodes(e.geometry_id)[..2],
            [internal_2, internal_3]
        );
    }

    #[test]
    fn test_segment_weights_sum_to_edge_weight() {
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
            ],
            vec![way(100, &[1, 2, 3], &[])],
        );
        let (edges, geometry) = compress(&graph);
        let e = &edges[0];
        let fwd_sum: Weight = geometry.forward_weights(e.geometry_id).iter().sum();
        let rev_sum: Weight = geometry.reverse_weights(e.geometry_id).iter().sum();
        assert_eq!(fwd_sum, e.data.weight_forward);
        assert_eq!(rev_sum, e.data.weight_backward);
        assert!(e.data.weight_forward > 0);
    }

    #[test]
    fn test_junction_splits_chain() {
        // 1 - 2 - 3 with a branch 2 - 4: node 2 has degree 3
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
                node(4, 50.01, 4.01),
            ],
            vec![way(100, &[1, 2, 3], &[]), way(101, &[2, 4], &[])],
        );
        let (edges, _) = compress(&graph);
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn test_name_change_splits_chain() {
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
            ],
            vec![
                way(100, &[1, 2], &[("name", "A Street")]),
                way(101, &[2, 3], &[("name", "B Street")]),
            ],
        );
        let (edges, _) = compress(&graph);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_signal_splits_chain_and_adds_penalty() {
        let mut nodes = vec![
            node(1, 50.0, 4.00),
            node(2, 50.0, 4.01),
            node(3, 50.0, 4.02),
        ];
        nodes[1].tags = tags(&[("highway", "traffic_signals")]);
        let graph = build(nodes, vec![way(100, &[1, 2, 3], &[])]);
        let (edges, geometry) = compress(&graph);
        assert_eq!(edges.len(), 2);
        let signal_node = graph.internal_id(2).unwrap();
        for e in &edges {
            let fwd: Weight = geometry.forward_weights(e.geometry_id).iter().sum();
            assert_eq!(fwd, e.data.weight_forward);
            if e.target == signal_node {
                // arriving at the signal costs the penalty on top of travel
                let plain = crate::graph::weight_for(e.data.distance_m, 30.0);
                assert_eq!(e.data.weight_forward, plain + 70);
            }
        }
    }

    #[test]
    fn test_parallel_edges_not_merged() {
        // two distinct ways between the same pair of nodes
        let graph = build(
            vec![node(1, 50.0, 4.00), node(2, 50.0, 4.01)],
            vec![way(100, &[1, 2], &[]), way(101, &[1, 2], &[])],
        );
        let (edges, _) = compress(&graph);
        assert_eq!(edges.len(), 2);
    }

    #[test]
    fn test_oneway_chain_keeps_direction() {
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
            ],
            vec![way(100, &[1, 2, 3], &[("oneway", "yes")])],
        );
        let (edges, _) = compress(&graph);
        assert_eq!(edges.len(), 1);
        assert!(edges[0].data.forward);
        assert!(!edges[0].data.backward);
        assert_eq!(edges[0].data.weight_backward, 0);
    }

    #[test]
    fn test_override_keeps_sums_addressable() {
        let graph = build(
            vec![
                node(1, 50.0, 4.00),
                node(2, 50.0, 4.01),
                node(3, 50.0, 4.02),
            ],
            vec![way(100, &[1, 2, 3], &[])],
        );
        let (mut edges, mut geometry) = compress(&graph);
        let e = &mut edges[0];
        let old_fwd = geometry.forward_weights(e.geometry_id)[0];
        let (prev_fwd, _) = geometry.override_segment(e.geometry_id, 0, old_fwd * 2, 1, 1);
        assert_eq!(prev_fwd, old_fwd);
        e.data.weight_forward += old_fwd;
        let fwd_sum: Weight = geometry.forward_weights(e.geometry_id).iter().sum();
        assert_eq!(fwd_sum, e.data.weight_forward);
        assert_eq!(geometry.datasources(e.geometry_id)[0], 1);
    }
}
