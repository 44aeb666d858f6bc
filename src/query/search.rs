//! Bidirectional CH search
//!
//! Alternating Dijkstra on the contracted graph with stall-on-demand,
//! negative phantom seed keys, forced-loop handling for same-edge
//! queries, per-metric edge filters, optional core nodes and a wall-clock
//! deadline enforced at the settle boundary.

use std::time::Instant;

use crate::error::{ErrorKind, Result};
use crate::heap::AddressableHeap;

use super::graph::QueryGraph;

/// Search keys are wider than edge weights so phantom seeds may go
/// negative without wrapping.
pub type SearchWeight = i64;

#[derive(Debug, Clone, Copy)]
pub struct SearchHeapData {
    pub parent: u32,
}

pub type SearchHeap = AddressableHeap<SearchWeight, SearchHeapData>;

/// A phantom endpoint feeding one heap: node id and seed key.
#[derive(Debug, Clone, Copy)]
pub struct Seed {
    pub node: u32,
    pub key: SearchWeight,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    /// Metric whose edge filter applies; the default metric 0 of an
    /// unfiltered graph passes everything.
    pub metric: usize,
    /// Require the forward/reverse meeting candidate to have a real
    /// parent, forcing the search around a loop (same-edge queries with
    /// reversed offsets).
    pub force_loop_forward: bool,
    pub force_loop_reverse: bool,
    pub deadline: Option<Instant>,
}

#[derive(Debug)]
pub struct SearchResult {
    /// Total weight including phantom offsets, deci-seconds.
    pub weight: SearchWeight,
    /// Edge-based node ids from the source seed to the target seed.
    pub packed_path: Vec<u32>,
    pub middle: u32,
}

pub struct BidirSearch<'a> {
    graph: &'a QueryGraph,
    /// Core nodes are searched without stall-on-demand.
    is_core: &'a [bool],
    forward: SearchHeap,
    reverse: SearchHeap,
}

impl<'a> BidirSearch<'a> {
    pub fn new(graph: &'a QueryGraph, is_core: &'a [bool]) -> Self {
        Self {
            graph,
            is_core,
            forward: SearchHeap::new(),
            reverse: SearchHeap::new(),
        }
    }

    /// Heaps are cleared by timestamp bump, so a worker reuses one
    /// `BidirSearch` across queries.
    pub fn run(
        &mut self,
        forward_seeds: &[Seed],
        reverse_seeds: &[Seed],
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        self.forward.clear();
        self.reverse.clear();

        let mut min_edge_offset: SearchWeight = 0;
        for seed in forward_seeds {
            if !self.forward.was_inserted(seed.node) {
                self.forward
                    .insert(seed.node, seed.key, SearchHeapData { parent: seed.node });
            } else if Some(seed.key) < self.forward.key(seed.node) {
                self.forward.decrease_key(seed.node, seed.key);
            }
            min_edge_offset = min_edge_offset.min(seed.key);
        }
        for seed in reverse_seeds {
            if !self.reverse.was_inserted(seed.node) {
                self.reverse
                    .insert(seed.node, seed.key, SearchHeapData { parent: seed.node });
            } else if Some(seed.key) < self.reverse.key(seed.node) {
                self.reverse.decrease_key(seed.node, seed.key);
            }
            min_edge_offset = min_edge_offset.min(seed.key);
        }
        if self.forward.is_empty() || self.reverse.is_empty() {
            return Err(ErrorKind::NoRoute);
        }

        let mut best: SearchWeight = SearchWeight::MAX;
        let mut middle: Option<u32> = None;

        while !self.forward.is_empty() || !self.reverse.is_empty() {
            if let Some(deadline) = options.deadline {
                if Instant::now() > deadline {
                    return Err(ErrorKind::Timeout);
                }
            }
            if !self.forward.is_empty() {
                Self::step(
                    self.graph,
                    self.is_core,
                    &mut self.forward,
                    &mut self.reverse,
                    &mut best,
                    &mut middle,
                    min_edge_offset,
                    true,
                    options,
                );
            }
            if !self.reverse.is_empty() {
                Self::step(
                    self.graph,
                    self.is_core,
                    &mut self.reverse,
                    &mut self.forward,
                    &mut best,
                    &mut middle,
                    min_edge_offset,
                    false,
                    options,
                );
            }
        }

        let Some(middle) = middle else {
            return Err(ErrorKind::NoRoute);
        };
        if best == SearchWeight::MAX {
            return Err(ErrorKind::NoRoute);
        }

        let packed_path = self.retrieve_packed_path(middle);
        Ok(SearchResult {
            weight: best,
            packed_path,
            middle,
        })
    }

    /// One settle step of `heap`; `other` is the opposite direction.
    #[allow(clippy::too_many_arguments)]
    fn step(
        graph: &QueryGraph,
        is_core: &[bool],
        heap: &mut SearchHeap,
        other: &mut SearchHeap,
        best: &mut SearchWeight,
        middle: &mut Option<u32>,
        min_edge_offset: SearchWeight,
        forward_direction: bool,
        options: &SearchOptions,
    ) {
        let Some((node, key)) = heap.extract_min() else {
            return;
        };

        // meeting bookkeeping against the other frontier
        if let Some(other_key) = other.key(node) {
            let total = key + other_key;
            if total < *best && total >= 0 {
                let own_parent = heap.data(node).map(|d| d.parent) != Some(node);
                let other_parent = other.data(node).map(|d| d.parent) != Some(node);
                let forced_ok = (!force_flag(options, forward_direction) || own_parent)
                    && (!force_flag(options, !forward_direction) || other_parent);
                if forced_ok {
                    *best = total;
                    *middle = Some(node);
                }
            }
        }

        // the frontier passed the best meeting: this direction is done
        if key + min_edge_offset > *best {
            heap.delete_all();
            return;
        }

        // stall-on-demand outside the core: a cheaper not-yet-relaxed
        // entry into this node proves the extracted key suboptimal
        if !is_core[node as usize] {
            for edge in graph.adjacent_edges(node) {
                if !graph.passes_filter(edge, options.metric) {
                    continue;
                }
                let data = graph.edge(edge);
                let reverse_open = if forward_direction {
                    data.backward
                } else {
                    data.forward
                };
                if !reverse_open {
                    continue;
                }
                let neighbor = graph.target(edge);
                if let Some(neighbor_key) = heap.key(neighbor) {
                    if neighbor_key + (data.weight as SearchWeight) < key {
                        return;
                    }
                }
            }
        }

        for edge in graph.adjacent_edges(node) {
            if !graph.passes_filter(edge, options.metric) {
                continue;
            }
            let data = graph.edge(edge);
            let open = if forward_direction {
                data.forward
            } else {
                data.backward
            };
            if !open {
                continue;
            }
            let to = graph.target(edge);
            let to_key = key + data.weight as SearchWeight;
            match heap.key(to) {
                None => heap.insert(to, to_key, SearchHeapData { parent: node }),
                Some(current) if to_key < current && !heap.was_removed(to) => {
                    heap.decrease_key(to, to_key);
                    heap.data_mut(to).expect("inserted node").parent = node;
                }
                _ => {}
            }
        }

    }

    fn retrieve_packed_path(&self, middle: u32) -> Vec<u32> {
        let mut path = Vec::new();
        let mut node = middle;
        loop {
            let parent = self.forward.data(node).expect("parent chain").parent;
            if parent == node {
                path.push(node);
                break;
            }
            path.push(node);
            node = parent;
        }
        path.reverse();

        let mut node = middle;
        loop {
            let parent = self.reverse.data(node).expect("parent chain").parent;
            if parent == node {
                break;
            }
            path.push(parent);
            node = parent;
        }
        path
    }
}

fn force_flag(options: &SearchOptions, forward: bool) -> bool {
    if forward {
        options.force_loop_forward
    } else {
        options.force_loop_reverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::{contract_graph, ContractorGraph, InputEdge, SchedulerSettings};
    use crate::graph::Weight;

    fn edge(source: u32, target: u32, weight: Weight) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            duration: weight,
            edge_id: source * 100 + target,
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
        let qg = QueryGraph::new(node_count, output.edges, vec![]).unwrap();
        qg.check_invariants().unwrap();
        (qg, output.is_core)
    }

    fn seeds(node: u32) -> Vec<Seed> {
        vec![Seed { node, key: 0 }]
    }

    #[test]
    fn test_simple_path_distance() {
        let (graph, core) = contracted(
            4,
            &[edge(0, 1, 10), edge(1, 2, 20), edge(2, 3, 30)],
        );
        let mut search = BidirSearch::new(&graph, &core);
        let result = search
            .run(&seeds(0), &seeds(3), &SearchOptions::default())
            .unwrap();
        assert_eq!(result.weight, 60);
        assert_eq!(result.packed_path.first(), Some(&0));
        assert_eq!(result.packed_path.last(), Some(&3));
    }

    #[test]
    fn test_no_route_between_components() {
        let (graph, core) = contracted(4, &[edge(0, 1, 10), edge(2, 3, 10)]);
        let mut search = BidirSearch::new(&graph, &core);
        let result = search.run(&seeds(0), &seeds(3), &SearchOptions::default());
        assert!(matches!(result, Err(ErrorKind::NoRoute)));
    }

    #[test]
    fn test_picks_cheaper_of_two_routes() {
        // 0 -> 1 -> 3 costs 25; 0 -> 2 -> 3 costs 22
        let (graph, core) = contracted(
            4,
            &[
                edge(0, 1, 10),
                edge(1, 3, 15),
                edge(0, 2, 2),
                edge(2, 3, 20),
            ],
        );
        let mut search = BidirSearch::new(&graph, &core);
        let result = search
            .run(&seeds(0), &seeds(3), &SearchOptions::default())
            .unwrap();
        assert_eq!(result.weight, 22);
    }

    #[test]
    fn test_negative_seed_offsets() {
        let (graph, core) = contracted(3, &[edge(0, 1, 100), edge(1, 2, 100)]);
        let mut search = BidirSearch::new(&graph, &core);
        // source phantom 30 deci-seconds into edge-node 0
        let result = search
            .run(
                &[Seed { node: 0, key: -30 }],
                &seeds(2),
                &SearchOptions::default(),
            )
            .unwrap();
        assert_eq!(result.weight, 170);
    }

    #[test]
    fn test_deadline_in_the_past_times_out() {
        let (graph, core) = contracted(3, &[edge(0, 1, 10), edge(1, 2, 10)]);
        let mut search = BidirSearch::new(&graph, &core);
        let options = SearchOptions {
            deadline: Some(Instant::now() - std::time::Duration::from_secs(1)),
            ..Default::default()
        };
        let result = search.run(&seeds(0), &seeds(2), &options);
        assert!(matches!(result, Err(ErrorKind::Timeout)));
    }

    #[test]
    fn test_same_node_zero_distance() {
        let (graph, core) = contracted(3, &[edge(0, 1, 10), edge(1, 2, 10)]);
        let mut search = BidirSearch::new(&graph, &core);
        let result = search
            .run(&seeds(1), &seeds(1), &SearchOptions::default())
            .unwrap();
        assert_eq!(result.weight, 0);
        assert_eq!(result.packed_path, vec![1]);
    }

    #[test]
    fn test_force_loop_rejects_trivial_meeting() {
        // ring 0 -> 1 -> 2 -> 0; forcing a loop at node 0 must route all
        // the way around instead of meeting at the seed
        let (graph, core) = contracted(
            3,
            &[edge(0, 1, 10), edge(1, 2, 10), edge(2, 0, 10)],
        );
        let mut search = BidirSearch::new(&graph, &core);
        let options = SearchOptions {
            force_loop_forward: true,
            force_loop_reverse: true,
            ..Default::default()
        };
        let result = search.run(&seeds(0), &seeds(0), &options).unwrap();
        assert_eq!(result.weight, 30);
    }

    #[test]
    fn test_reuse_between_queries() {
        let (graph, core) = contracted(3, &[edge(0, 1, 10), edge(1, 2, 10)]);
        let mut search = BidirSearch::new(&graph, &core);
        let first = search
            .run(&seeds(0), &seeds(2), &SearchOptions::default())
            .unwrap();
        let second = search
            .run(&seeds(0), &seeds(2), &SearchOptions::default())
            .unwrap();
        assert_eq!(first.weight, second.weight);
    }
}
