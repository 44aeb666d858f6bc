//! Mutable contraction graph
//!
//! Adjacency-list multigraph over edge-based nodes. Every directed input
//! edge is stored at both endpoints with direction flags, so the witness
//! search can walk outgoing and incoming edges from the same list. The
//! graph is only mutated inside the scheduler's serial commit step.

use crate::graph::Weight;

/// Payload of a contractor edge. For a shortcut `payload` is the middle
/// node used to unpack it; for an original edge it is the edge-based edge
/// id used to recover geometry and the turn annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractorEdgeData {
    pub weight: Weight,
    pub duration: Weight,
    pub original_edges: u32,
    pub payload: u32,
    pub shortcut: bool,
    pub forward: bool,
    pub backward: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ContractorEdge {
    pub target: u32,
    pub data: ContractorEdgeData,
}

/// A directed edge as fed into the contractor.
#[derive(Debug, Clone, Copy)]
pub struct InputEdge {
    pub source: u32,
    pub target: u32,
    pub weight: Weight,
    pub duration: Weight,
    /// Edge-based edge id this original edge was created from.
    pub edge_id: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ContractorGraph {
    adjacency: Vec<Vec<ContractorEdge>>,
}

impl ContractorGraph {
    /// Build from directed edge-based edges. Exact parallel duplicates are
    /// merged keeping the cheaper weight.
    pub fn new(node_count: usize, input: &[InputEdge]) -> Self {
        let mut graph = Self {
            adjacency: vec![Vec::new(); node_count],
        };
        for e in input {
            debug_assert!(e.weight > 0);
            graph.insert(
                e.source,
                e.target,
                ContractorEdgeData {
                    weight: e.weight,
                    duration: e.duration,
                    original_edges: 1,
                    payload: e.edge_id,
                    shortcut: false,
                    forward: true,
                    backward: false,
                },
            );
        }
        graph
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edges(&self, node: u32) -> &[ContractorEdge] {
        &self.adjacency[node as usize]
    }

    /// Insert the directed relation `source -> target` described by
    /// `data.forward`/`data.backward`, storing mirrored entries at both
    /// endpoints. Parallel edges with identical direction flags are merged
    /// keeping the minimum weight.
    pub fn insert(&mut self, source: u32, target: u32, data: ContractorEdgeData) {
        debug_assert!(source != target || data.shortcut == false);
        self.insert_half(source, target, data);
        let mirrored = ContractorEdgeData {
            forward: data.backward,
            backward: data.forward,
            ..data
        };
        self.insert_half(target, source, mirrored);
    }

    fn insert_half(&mut self, at: u32, target: u32, data: ContractorEdgeData) {
        for edge in &mut self.adjacency[at as usize] {
            if edge.target != target {
                continue;
            }
            // same weight and payload: a compatible opposite direction,
            // OR the flags into one entry
            if edge.data.weight == data.weight
                && edge.data.shortcut == data.shortcut
                && edge.data.payload == data.payload
            {
                edge.data.forward |= data.forward;
                edge.data.backward |= data.backward;
                return;
            }
            // same direction pattern: keep the minimum weight
            if edge.data.forward == data.forward && edge.data.backward == data.backward {
                if data.weight < edge.data.weight {
                    edge.data = data;
                }
                return;
            }
        }
        self.adjacency[at as usize].push(ContractorEdge { target, data });
    }

    /// Remove every edge between `node` and `to`, in both lists.
    pub fn delete_edges_between(&mut self, node: u32, to: u32) {
        self.adjacency[node as usize].retain(|e| e.target != to);
        self.adjacency[to as usize].retain(|e| e.target != node);
    }

    /// Drop the adjacency of a contracted node. Its neighbors must have
    /// been cleaned up with `delete_edges_between` first.
    pub fn clear_node(&mut self, node: u32) -> Vec<ContractorEdge> {
        std::mem::take(&mut self.adjacency[node as usize])
    }

    pub fn degree(&self, node: u32) -> usize {
        self.adjacency[node as usize].len()
    }

    /// Restrict the graph to nodes passing `keep`, dropping all other
    /// nodes' edges. Node ids are preserved.
    pub fn filtered(&self, keep: &[bool]) -> ContractorGraph {
        let mut adjacency = vec![Vec::new(); self.adjacency.len()];
        for (node, edges) in self.adjacency.iter().enumerate() {
            if !keep[node] {
                continue;
            }
            adjacency[node] = edges
                .iter()
                .filter(|e| keep[e.target as usize])
                .copied()
                .collect();
        }
        ContractorGraph { adjacency }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: u32, target: u32, weight: Weight) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            duration: weight,
            edge_id: 0,
        }
    }

    #[test]
    fn test_mirrored_entries() {
        let g = ContractorGraph::new(3, &[edge(0, 1, 10)]);
        assert_eq!(g.edges(0).len(), 1);
        assert_eq!(g.edges(1).len(), 1);
        assert!(g.edges(0)[0].data.forward);
        assert!(!g.edges(0)[0].data.backward);
        assert!(g.edges(1)[0].data.backward);
        assert!(!g.edges(1)[0].data.forward);
    }

    #[test]
    fn test_parallel_edges_merge_to_min() {
        let g = ContractorGraph::new(2, &[edge(0, 1, 10), edge(0, 1, 5)]);
        assert_eq!(g.edges(0).len(), 1);
        assert_eq!(g.edges(0)[0].data.weight, 5);
    }

    #[test]
    fn test_opposite_directions_stay_separate() {
        let g = ContractorGraph::new(2, &[edge(0, 1, 10), edge(1, 0, 7)]);
        // at node 0: one forward entry (0->1) and one backward entry (1->0)
        assert_eq!(g.edges(0).len(), 2);
    }

    #[test]
    fn test_delete_edges_between() {
        let mut g = ContractorGraph::new(3, &[edge(0, 1, 10), edge(1, 2, 5)]);
        g.delete_edges_between(1, 0);
        assert_eq!(g.edges(0).len(), 0);
        assert_eq!(g.edges(1).len(), 1);
        assert_eq!(g.edges(1)[0].target, 2);
    }

    #[test]
    fn test_filtered_drops_excluded() {
        let g = ContractorGraph::new(3, &[edge(0, 1, 10), edge(1, 2, 5)]);
        let f = g.filtered(&[true, true, false]);
        assert_eq!(f.edges(1).len(), 1);
        assert_eq!(f.edges(2).len(), 0);
    }
}
