//! Contraction scheduling
//!
//! Decides contraction order and parallelizes it safely: per-node
//! priorities from simulated contraction, two-hop independent sets
//! contracted in parallel with a serial commit, lazy priority updates,
//! an optional core cutoff, and the excludable-class variant that builds
//! one query graph with per-metric edge filters.

use rand::Rng;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::graph::Weight;

use super::core::{contract_node, ContractionStats, WitnessHeap, DEFAULT_HOP_LIMIT};
use super::graph::{ContractorEdgeData, ContractorGraph};

/// Fraction of nodes left uncontracted in the shared phase of excludable
/// contraction. Leaving some slack keeps the shared core sparse.
const SHARED_CORE_REMAINING: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// Stop contracting when no more than this fraction of the initial
    /// nodes remains; the rest becomes the core. 0.0 contracts everything.
    pub core_factor: f64,
    pub hop_limit: u16,
    /// Chance per round of re-evaluating a node whose neighborhood did not
    /// change, to catch drifted priorities.
    pub recheck_fraction: f64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            core_factor: 0.0,
            hop_limit: DEFAULT_HOP_LIMIT,
            recheck_fraction: 0.01,
        }
    }
}

/// A finished directed query-graph relation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinalEdge {
    pub source: u32,
    pub target: u32,
    pub data: ContractorEdgeData,
}

#[derive(Debug)]
pub struct ContractionOutput {
    pub edges: Vec<FinalEdge>,
    pub levels: Vec<u32>,
    pub is_core: Vec<bool>,
}

#[derive(Debug)]
pub struct ExcludableOutput {
    pub edges: Vec<FinalEdge>,
    /// One validity bit vector per metric, parallel to `edges`.
    pub edge_filters: Vec<Vec<bool>>,
    pub levels: Vec<u32>,
    pub is_core: Vec<bool>,
}

/// Contract every contractable node of the graph in priority order.
///
/// `contractable` restricts which nodes may be contracted (`None` means
/// all); `pre_contracted` marks nodes a previous phase already removed.
/// The graph is mutated in place; finished edges accumulate in the output.
pub fn contract_graph(
    graph: &mut ContractorGraph,
    contractable: Option<&[bool]>,
    pre_contracted: Option<&[bool]>,
    settings: &SchedulerSettings,
) -> ContractionOutput {
    let n = graph.node_count();
    let mut alive: Vec<bool> = match pre_contracted {
        Some(done) => done.iter().map(|&d| !d).collect(),
        None => vec![true; n],
    };
    let eligible: Vec<bool> = match contractable {
        Some(c) => c.to_vec(),
        None => vec![true; n],
    };

    let initial_live = alive.iter().filter(|&&a| a).count();
    let stop_remaining = (settings.core_factor * initial_live as f64).floor() as usize;

    let mut levels = vec![0u32; n];
    let mut depth = vec![0u32; n];
    let mut priority = vec![f64::INFINITY; n];
    let mut edges_out: Vec<FinalEdge> = Vec::new();

    let candidates: Vec<u32> = (0..n as u32)
        .filter(|&v| alive[v as usize] && eligible[v as usize])
        .collect();
    let mut remaining: usize = candidates.len();
    let mut alive_count = initial_live;

    // initial priorities via simulated contraction
    {
        let g: &ContractorGraph = graph;
        let initial: Vec<(u32, f64)> = candidates
            .par_iter()
            .map_init(WitnessHeap::new, |heap, &v| {
                let (_, stats) = contract_node(g, heap, v, settings.hop_limit);
                (v, priority_of(&stats, 0))
            })
            .collect();
        for (v, p) in initial {
            priority[v as usize] = p;
        }
    }

    let mut round = 0u32;
    let mut rng = rand::rng();

    while remaining > 0 && alive_count > stop_remaining {
        round += 1;

        let live_candidates: Vec<u32> = (0..n as u32)
            .filter(|&v| alive[v as usize] && eligible[v as usize])
            .collect();
        if live_candidates.is_empty() {
            break;
        }

        // independent set: local priority minima over two hops
        let mut contracted: Vec<(u32, Vec<super::core::Shortcut>)> = {
            let g: &ContractorGraph = graph;
            let independent: Vec<u32> = live_candidates
                .par_iter()
                .copied()
                .filter(|&v| is_local_minimum(g, &alive, &eligible, &priority, v))
                .collect();
            if independent.is_empty() {
                break;
            }
            // witness searches over a read-only graph, in parallel
            independent
                .par_iter()
                .map_init(WitnessHeap::new, |heap, &v| {
                    let (shortcuts, _) = contract_node(g, heap, v, settings.hop_limit);
                    (v, shortcuts)
                })
                .collect()
        };
        contracted.sort_unstable_by_key(|(v, _)| *v);

        // serial commit; stop at the core threshold even mid-round
        let mut dirty: Vec<u32> = Vec::new();
        for (v, shortcuts) in contracted {
            if alive_count <= stop_remaining {
                break;
            }
            let own_edges = graph.clear_node(v);
            let mut neighbors: Vec<u32> = own_edges.iter().map(|e| e.target).collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            for &t in &neighbors {
                graph.delete_edges_between(t, v);
                // delete_edges_between also touches v's list, already taken
            }
            for edge in &own_edges {
                if alive[edge.target as usize] {
                    edges_out.push(FinalEdge {
                        source: v,
                        target: edge.target,
                        data: edge.data,
                    });
                }
            }
            for s in shortcuts {
                graph.insert(s.source, s.target, s.data);
            }
            for &t in &neighbors {
                if alive[t as usize] {
                    depth[t as usize] = depth[t as usize].max(depth[v as usize] + 1);
                    dirty.push(t);
                }
            }
            levels[v as usize] = round;
            alive[v as usize] = false;
            alive_count -= 1;
            remaining -= 1;
        }

        // lazy priority refresh: touched neighborhoods plus a small random
        // sample of everything else
        dirty.sort_unstable();
        dirty.dedup();
        let mut refresh: Vec<u32> = dirty
            .into_iter()
            .filter(|&v| alive[v as usize] && eligible[v as usize])
            .collect();
        if settings.recheck_fraction > 0.0 {
            for &v in &live_candidates {
                if alive[v as usize] && rng.random::<f64>() < settings.recheck_fraction {
                    refresh.push(v);
                }
            }
            refresh.sort_unstable();
            refresh.dedup();
        }
        let refreshed: Vec<(u32, f64)> = {
            let g: &ContractorGraph = graph;
            refresh
                .par_iter()
                .map_init(WitnessHeap::new, |heap, &v| {
                    let (_, stats) = contract_node(g, heap, v, settings.hop_limit);
                    (v, priority_of(&stats, depth[v as usize]))
                })
                .collect()
        };
        for (v, p) in refreshed {
            priority[v as usize] = p;
        }
    }

    // whatever survives is the core; its edges go out as they stand
    let is_core: Vec<bool> = alive.clone();
    for v in 0..n as u32 {
        if !alive[v as usize] {
            continue;
        }
        levels[v as usize] = round + 1;
        for edge in graph.edges(v) {
            if alive[edge.target as usize] {
                edges_out.push(FinalEdge {
                    source: v,
                    target: edge.target,
                    data: edge.data,
                });
            }
        }
    }

    ContractionOutput {
        edges: edges_out,
        levels,
        is_core,
    }
}

/// Priority estimate for contracting `v` now; smaller contracts earlier.
/// Weighted sum of edge difference, search-space depth and shortcut
/// originality, unit weights.
fn priority_of(stats: &ContractionStats, depth: u32) -> f64 {
    stats.edge_difference() as f64 + depth as f64 + stats.original_edges as f64
}

/// Priority minimum among all live candidates within two hops, ties broken
/// by node id. Guarantees witness independence inside one parallel round.
fn is_local_minimum(
    graph: &ContractorGraph,
    alive: &[bool],
    eligible: &[bool],
    priority: &[f64],
    v: u32,
) -> bool {
    let mine = (priority[v as usize], v);
    let beats = |other: u32| -> bool {
        if other == v || !alive[other as usize] || !eligible[other as usize] {
            return false;
        }
        (priority[other as usize], other) < mine
    };

    for e1 in graph.edges(v) {
        if !alive[e1.target as usize] {
            continue;
        }
        if beats(e1.target) {
            return false;
        }
        for e2 in graph.edges(e1.target) {
            if alive[e2.target as usize] && beats(e2.target) {
                return false;
            }
        }
    }
    true
}

/// Contract a graph whose metrics exclude different node classes: the
/// always-allowed intersection is contracted once into a shared base, then
/// each metric's remainder is contracted from the shared core. Every final
/// edge is tagged with the metrics it is valid for.
pub fn contract_excludable(
    mut graph: ContractorGraph,
    filters: &[Vec<bool>],
    settings: &SchedulerSettings,
) -> ExcludableOutput {
    let n = graph.node_count();
    debug_assert!(!filters.is_empty());
    debug_assert!(filters.iter().all(|f| f.len() == n));

    if filters.len() == 1 && filters[0].iter().all(|&v| v) {
        let output = contract_graph(&mut graph, None, None, settings);
        let edge_filters = vec![vec![true; output.edges.len()]];
        return ExcludableOutput {
            edges: output.edges,
            edge_filters,
            levels: output.levels,
            is_core: output.is_core,
        };
    }

    let always_allowed: Vec<bool> = (0..n)
        .map(|v| filters.iter().all(|f| f[v]))
        .collect();

    // phase 1: shared base over the always-allowed intersection, stopped
    // early so the shared core stays sparse
    let shared_settings = SchedulerSettings {
        core_factor: SHARED_CORE_REMAINING,
        ..*settings
    };
    let phase1 = contract_graph(&mut graph, Some(&always_allowed), None, &shared_settings);
    let is_shared_core = phase1.is_core.clone();
    let mut levels = phase1.levels;

    let mut container = EdgeContainer::new(filters.len());
    for edge in phase1.edges {
        // an edge between two shared-core nodes stays live for phase 2
        if is_shared_core[edge.source as usize] && is_shared_core[edge.target as usize] {
            continue;
        }
        let mask = filter_mask(filters, edge.source, edge.target);
        container.add(edge, mask);
    }

    let shared_core_graph = graph.filtered(&is_shared_core);

    // phase 2: per metric, finish contracting that metric's core
    for (metric, filter) in filters.iter().enumerate() {
        let mut metric_graph = shared_core_graph.filtered(filter);
        let pre_contracted: Vec<bool> = is_shared_core.iter().map(|&c| !c).collect();
        let phase2 = contract_graph(
            &mut metric_graph,
            Some(&is_shared_core),
            Some(&pre_contracted),
            settings,
        );
        for edge in phase2.edges {
            container.add(edge, 1u32 << metric);
        }
        for v in 0..n {
            if is_shared_core[v] && filter[v] {
                levels[v] = levels[v].max(phase2.levels[v]);
            }
        }
    }

    let (edges, edge_filters) = container.finish();
    ExcludableOutput {
        edges,
        edge_filters,
        levels,
        is_core: vec![false; n],
    }
}

/// Metric mask of an edge by its endpoints' node filters.
fn filter_mask(filters: &[Vec<bool>], source: u32, target: u32) -> u32 {
    let mut mask = 0u32;
    for (metric, filter) in filters.iter().enumerate() {
        if filter[source as usize] && filter[target as usize] {
            mask |= 1 << metric;
        }
    }
    mask
}

/// Deduplicating accumulator for edges coming out of several contraction
/// phases; identical relations merge their metric masks.
struct EdgeContainer {
    metric_count: usize,
    index: FxHashMap<(u32, u32, Weight, u32, bool, bool, bool), usize>,
    edges: Vec<FinalEdge>,
    masks: Vec<u32>,
}

impl EdgeContainer {
    fn new(metric_count: usize) -> Self {
        Self {
            metric_count,
            index: FxHashMap::default(),
            edges: Vec::new(),
            masks: Vec::new(),
        }
    }

    fn add(&mut self, edge: FinalEdge, mask: u32) {
        if mask == 0 {
            return;
        }
        let key = (
            edge.source,
            edge.target,
            edge.data.weight,
            edge.data.payload,
            edge.data.shortcut,
            edge.data.forward,
            edge.data.backward,
        );
        match self.index.get(&key) {
            Some(&i) => self.masks[i] |= mask,
            None => {
                self.index.insert(key, self.edges.len());
                self.edges.push(edge);
                self.masks.push(mask);
            }
        }
    }

    fn finish(self) -> (Vec<FinalEdge>, Vec<Vec<bool>>) {
        let filters = (0..self.metric_count)
            .map(|metric| {
                self.masks
                    .iter()
                    .map(|mask| mask & (1 << metric) != 0)
                    .collect()
            })
            .collect();
        (self.edges, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::graph::InputEdge;

    fn edge(source: u32, target: u32, weight: Weight) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            duration: weight,
            edge_id: source * 100 + target,
        }
    }

    fn path_graph(weights: &[Weight]) -> ContractorGraph {
        let mut input = Vec::new();
        for (i, &w) in weights.iter().enumerate() {
            input.push(edge(i as u32, i as u32 + 1, w));
            input.push(edge(i as u32 + 1, i as u32, w));
        }
        ContractorGraph::new(weights.len() + 1, &input)
    }

    #[test]
    fn test_full_contraction_emits_all_nodes() {
        let mut graph = path_graph(&[10, 20, 30]);
        let output =
            contract_graph(&mut graph, None, None, &SchedulerSettings::default());
        assert!(output.is_core.iter().all(|&c| !c));
        assert!(!output.edges.is_empty());
        // every node was assigned a contraction round
        assert!(output.levels.iter().all(|&l| l > 0));
    }

    #[test]
    fn test_midpoint_contraction_produces_shortcut() {
        // path 0-1-2: contracting 1 first must produce a 0-2 shortcut
        let mut graph = path_graph(&[10, 20]);
        let output =
            contract_graph(&mut graph, None, None, &SchedulerSettings::default());
        let shortcut = output
            .edges
            .iter()
            .find(|e| e.data.shortcut && e.data.weight == 30);
        assert!(shortcut.is_some(), "expected a 0-2 shortcut of weight 30");
        assert_eq!(shortcut.unwrap().data.payload, 1);
    }

    #[test]
    fn test_core_factor_leaves_core() {
        let mut graph = path_graph(&[10, 20, 30, 40, 50, 60, 70]);
        let settings = SchedulerSettings {
            core_factor: 0.5,
            ..Default::default()
        };
        let output = contract_graph(&mut graph, None, None, &settings);
        let core_count = output.is_core.iter().filter(|&&c| c).count();
        assert!(core_count >= 4, "half the nodes should remain core");
        assert!(core_count < 8);
    }

    #[test]
    fn test_contractable_subset_respected() {
        let mut graph = path_graph(&[10, 20]);
        let contractable = vec![true, false, true];
        let output = contract_graph(
            &mut graph,
            Some(&contractable),
            None,
            &SchedulerSettings::default(),
        );
        assert!(output.is_core[1]);
        assert!(!output.is_core[0]);
        assert!(!output.is_core[2]);
    }

    #[test]
    fn test_deterministic_given_same_input() {
        let settings = SchedulerSettings {
            recheck_fraction: 0.0,
            ..Default::default()
        };
        let run = || {
            let mut graph = path_graph(&[10, 20, 30, 40]);
            let mut output = contract_graph(&mut graph, None, None, &settings);
            output.edges.sort_by_key(|e| (e.source, e.target, e.data.weight));
            (output.edges.len(), output.levels)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_excludable_single_permissive_filter() {
        let graph = path_graph(&[10, 20]);
        let filters = vec![vec![true; 3]];
        let output =
            contract_excludable(graph, &filters, &SchedulerSettings::default());
        assert_eq!(output.edge_filters.len(), 1);
        assert!(output.edge_filters[0].iter().all(|&b| b));
    }

    #[test]
    fn test_excludable_two_metrics() {
        // node 2 is a "ferry" node excluded by metric 1
        let graph = path_graph(&[10, 20, 30]);
        let filters = vec![vec![true, true, true, true], vec![true, true, false, true]];
        let output =
            contract_excludable(graph, &filters, &SchedulerSettings::default());
        assert_eq!(output.edge_filters.len(), 2);
        assert_eq!(output.edge_filters[0].len(), output.edges.len());
        // edges touching node 2 must be invalid for metric 1
        for (i, e) in output.edges.iter().enumerate() {
            if e.source == 2 || e.target == 2 || (e.data.shortcut && e.data.payload == 2)
            {
                assert!(
                    !output.edge_filters[1][i],
                    "edge {}->{} touches the excluded node",
                    e.source,
                    e.target
                );
            }
        }
        // metric 0 must still span the full path somehow
        assert!(output.edge_filters[0].iter().any(|&b| b));
    }
}
