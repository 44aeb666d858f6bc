//! Per-node contraction
//!
//! Decides which shortcuts must be inserted so that removing one node
//! preserves shortest-path distances between its neighbors. One bounded
//! forbidden-node Dijkstra runs per incoming edge, covering all outgoing
//! targets of that node at once.

use crate::graph::Weight;
use crate::heap::AddressableHeap;

use super::graph::{ContractorEdgeData, ContractorGraph};

/// Hop bound during regular contraction. Correctness checks run unbounded.
pub const DEFAULT_HOP_LIMIT: u16 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct WitnessHeapData {
    pub hops: u16,
    pub target: bool,
}

pub type WitnessHeap = AddressableHeap<Weight, WitnessHeapData>;

/// A shortcut to be committed, replacing paths through the contracted
/// node. Emitted once per direction pair (u, x).
#[derive(Debug, Clone, Copy)]
pub struct Shortcut {
    pub source: u32,
    pub target: u32,
    pub data: ContractorEdgeData,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContractionStats {
    /// Directed shortcut halves that contraction would insert.
    pub inserted: u32,
    /// Directed edge entries removed with the node.
    pub removed: u32,
    /// Sum of original edge counts over the hypothetical shortcuts.
    pub original_edges: u32,
}

impl ContractionStats {
    pub fn edge_difference(&self) -> i64 {
        self.inserted as i64 - self.removed as i64
    }
}

/// Bounded Dijkstra from `source`, never entering `forbidden`. Stops when
/// `number_of_targets` marked targets were settled, the weight limit is
/// passed, or the heap drains. Stalling stays off here; it belongs to the
/// query phase.
pub fn witness_search(
    graph: &ContractorGraph,
    heap: &mut WitnessHeap,
    weight_limit: Weight,
    number_of_targets: usize,
    hop_limit: u16,
    forbidden: u32,
) {
    let mut targets_remaining = number_of_targets;

    while let Some((node, weight)) = heap.extract_min() {
        if weight > weight_limit {
            return;
        }
        let node_data = *heap.data(node).expect("settled node has data");
        if node_data.target {
            targets_remaining = targets_remaining.saturating_sub(1);
            if targets_remaining == 0 {
                return;
            }
        }
        if node_data.hops >= hop_limit {
            continue;
        }

        for edge in graph.edges(node) {
            if !edge.data.forward || edge.target == forbidden {
                continue;
            }
            let to_weight = weight.saturating_add(edge.data.weight);
            match heap.key(edge.target) {
                None => {
                    heap.insert(
                        edge.target,
                        to_weight,
                        WitnessHeapData {
                            hops: node_data.hops + 1,
                            target: false,
                        },
                    );
                }
                Some(current) if to_weight < current && !heap.was_removed(edge.target) => {
                    heap.decrease_key(edge.target, to_weight);
                    if let Some(d) = heap.data_mut(edge.target) {
                        d.hops = node_data.hops + 1;
                    }
                }
                _ => {}
            }
        }
    }
}

/// Compute the shortcuts required to bypass `node`. Pure with respect to
/// the graph, so the scheduler can run it for an independent set in
/// parallel and commit the results serially.
pub fn contract_node(
    graph: &ContractorGraph,
    heap: &mut WitnessHeap,
    node: u32,
    hop_limit: u16,
) -> (Vec<Shortcut>, ContractionStats) {
    let mut shortcuts = Vec::new();
    let mut stats = ContractionStats {
        removed: graph
            .edges(node)
            .iter()
            .map(|e| e.data.forward as u32 + e.data.backward as u32)
            .sum(),
        ..Default::default()
    };

    for in_edge in graph.edges(node) {
        // incoming relations are the entries traversable toward `node`
        if !in_edge.data.backward {
            continue;
        }
        let source = in_edge.target;
        if source == node {
            continue;
        }
        let in_weight = in_edge.data.weight;

        heap.clear();
        heap.insert(source, 0, WitnessHeapData::default());

        let mut max_target_weight: Weight = 0;
        let mut number_of_targets = 0usize;
        for out_edge in graph.edges(node) {
            if !out_edge.data.forward {
                continue;
            }
            let target = out_edge.target;
            if target == node || target == source {
                continue;
            }
            let through = in_weight.saturating_add(out_edge.data.weight);
            max_target_weight = max_target_weight.max(through);
            if !heap.was_inserted(target) {
                heap.insert(
                    target,
                    Weight::MAX,
                    WitnessHeapData {
                        hops: 0,
                        target: true,
                    },
                );
                number_of_targets += 1;
            }
        }
        if number_of_targets == 0 {
            continue;
        }

        witness_search(
            graph,
            heap,
            max_target_weight,
            number_of_targets,
            hop_limit,
            node,
        );

        for out_edge in graph.edges(node) {
            if !out_edge.data.forward {
                continue;
            }
            let target = out_edge.target;
            if target == node || target == source {
                continue;
            }
            let through = in_weight.saturating_add(out_edge.data.weight);
            let witness = heap.key(target).unwrap_or(Weight::MAX);
            if witness <= through {
                continue;
            }
            let original_edges =
                in_edge.data.original_edges + out_edge.data.original_edges;
            stats.inserted += 2;
            stats.original_edges += original_edges;
            shortcuts.push(Shortcut {
                source,
                target,
                data: ContractorEdgeData {
                    weight: through,
                    duration: in_edge.data.duration + out_edge.data.duration,
                    original_edges,
                    payload: node,
                    shortcut: true,
                    forward: true,
                    backward: false,
                },
            });
        }
    }

    (shortcuts, stats)
}
