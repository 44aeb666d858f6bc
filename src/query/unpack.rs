//! Shortcut unpacking
//!
//! Expands the packed node sequence coming out of the bidirectional
//! search into original edge-based edges. A depth-first stack replaces
//! recursion; each shortcut is replaced by its two halves found via the
//! middle node stored at contraction time.

use crate::error::{ErrorKind, Result};
use crate::graph::Weight;

use super::graph::QueryGraph;

/// One original (non-shortcut) step of the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnpackedEdge {
    /// Edge-based edge id recorded by the expander.
    pub edge_based_edge_id: u32,
    pub weight: Weight,
    pub duration: Weight,
}

/// Expand a packed path of edge-based node ids into the sequence of
/// original edge-based edges connecting them.
pub fn unpack_path(
    graph: &QueryGraph,
    packed: &[u32],
    metric: usize,
) -> Result<Vec<UnpackedEdge>> {
    let mut unpacked = Vec::new();
    if packed.len() < 2 {
        return Ok(unpacked);
    }

    let mut stack: Vec<(u32, u32)> = Vec::with_capacity(packed.len());
    for pair in packed.windows(2).rev() {
        stack.push((pair[0], pair[1]));
    }

    while let Some((from, to)) = stack.pop() {
        let found = graph
            .find_smallest_edge(from, to, true, metric)
            .or_else(|| graph.find_smallest_edge(to, from, false, metric));
        let Some((_, data)) = found else {
            return Err(ErrorKind::InternalInvariant(format!(
                "no edge between {from} and {to} during unpack"
            )));
        };

        if data.shortcut {
            let middle = data.payload;
            // LIFO: push the second half first
            stack.push((middle, to));
            stack.push((from, middle));
        } else {
            unpacked.push(UnpackedEdge {
                edge_based_edge_id: data.payload,
                weight: data.weight,
                duration: data.duration,
            });
        }
    }

    Ok(unpacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::{contract_graph, ContractorGraph, InputEdge, SchedulerSettings};
    use crate::query::search::{BidirSearch, SearchOptions, Seed};

    fn edge(source: u32, target: u32, weight: Weight, edge_id: u32) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            duration: weight,
            edge_id,
        }
    }

    fn contracted(node_count: usize, input: &[InputEdge]) -> (QueryGraph, Vec<bool>) {
        let mut graph = ContractorGraph::new(node_count, input);
        let output = contract_graph(
            &mut graph,
            None,
            None,
            &SchedulerSettings {
                recheck_fraction: 0.0,
                ..Default::default()
            },
        );
        (
            QueryGraph::new(node_count, output.edges, vec![]).unwrap(),
            output.is_core,
        )
    }

    #[test]
    fn test_unpack_restores_original_sequence() {
        let input = vec![
            edge(0, 1, 10, 100),
            edge(1, 2, 20, 101),
            edge(2, 3, 30, 102),
            edge(3, 4, 40, 103),
        ];
        let (graph, core) = contracted(5, &input);
        let mut search = BidirSearch::new(&graph, &core);
        let result = search
            .run(
                &[Seed { node: 0, key: 0 }],
                &[Seed { node: 4, key: 0 }],
                &SearchOptions::default(),
            )
            .unwrap();

        let unpacked = unpack_path(&graph, &result.packed_path, 0).unwrap();
        let ids: Vec<u32> = unpacked.iter().map(|e| e.edge_based_edge_id).collect();
        assert_eq!(ids, vec![100, 101, 102, 103]);

        // invariant: unpacked weights sum to the CH distance
        let total: Weight = unpacked.iter().map(|e| e.weight).sum();
        assert_eq!(total as i64, result.weight);
    }

    #[test]
    fn test_unpack_single_node_is_empty() {
        let (graph, _) = contracted(2, &[edge(0, 1, 10, 100)]);
        assert!(unpack_path(&graph, &[0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_unpack_missing_edge_is_invariant_error() {
        let (graph, _) = contracted(2, &[edge(0, 1, 10, 100)]);
        let result = unpack_path(&graph, &[1, 0], 0);
        assert!(matches!(result, Err(ErrorKind::InternalInvariant(_))));
    }
}
