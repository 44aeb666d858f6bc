//! Contraction preserves shortest-path distances: bidirectional CH
//! queries on a contracted grid must agree with plain Dijkstra on the
//! uncontracted graph, and unpacking must reproduce the distance.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use monarch_route::contractor::{
    contract_graph, ContractorGraph, InputEdge, SchedulerSettings,
};
use monarch_route::query::graph::QueryGraph;
use monarch_route::query::search::{BidirSearch, SearchOptions, Seed};
use monarch_route::query::unpack::unpack_path;

const SIDE: u32 = 5;

fn grid_edges() -> Vec<InputEdge> {
    // SIDE x SIDE grid, deterministic weights, both directions
    let mut edges = Vec::new();
    let id = |r: u32, c: u32| r * SIDE + c;
    let weight = |a: u32, b: u32| (a * 7 + b * 13) % 50 + 1;
    let mut edge_id = 0u32;
    let mut push = |from: u32, to: u32, w: u32, edge_id: &mut u32| {
        edges.push(InputEdge {
            source: from,
            target: to,
            weight: w,
            duration: w,
            edge_id: *edge_id,
        });
        *edge_id += 1;
    };
    for r in 0..SIDE {
        for c in 0..SIDE {
            if c + 1 < SIDE {
                let w = weight(id(r, c), id(r, c + 1));
                push(id(r, c), id(r, c + 1), w, &mut edge_id);
                push(id(r, c + 1), id(r, c), w + 3, &mut edge_id);
            }
            if r + 1 < SIDE {
                let w = weight(id(r, c), id(r + 1, c));
                push(id(r, c), id(r + 1, c), w, &mut edge_id);
                push(id(r + 1, c), id(r, c), w + 5, &mut edge_id);
            }
        }
    }
    edges
}

fn reference_dijkstra(edges: &[InputEdge], n: usize, source: u32) -> Vec<u64> {
    let mut adjacency: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n];
    for e in edges {
        adjacency[e.source as usize].push((e.target, e.weight));
    }
    let mut dist = vec![u64::MAX; n];
    let mut heap = BinaryHeap::new();
    dist[source as usize] = 0;
    heap.push(Reverse((0u64, source)));
    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u as usize] {
            continue;
        }
        for &(v, w) in &adjacency[u as usize] {
            let next = d + w as u64;
            if next < dist[v as usize] {
                dist[v as usize] = next;
                heap.push(Reverse((next, v)));
            }
        }
    }
    dist
}

fn contracted(core_factor: f64) -> (QueryGraph, Vec<bool>) {
    let edges = grid_edges();
    let n = (SIDE * SIDE) as usize;
    let mut graph = ContractorGraph::new(n, &edges);
    let output = contract_graph(
        &mut graph,
        None,
        None,
        &SchedulerSettings {
            core_factor,
            recheck_fraction: 0.0,
            ..Default::default()
        },
    );
    let qg = QueryGraph::new(n, output.edges, vec![]).unwrap();
    qg.check_invariants().unwrap();
    (qg, output.is_core)
}

#[test]
fn test_ch_matches_dijkstra_on_all_pairs() {
    let edges = grid_edges();
    let n = (SIDE * SIDE) as usize;
    let (graph, core) = contracted(0.0);
    let mut search = BidirSearch::new(&graph, &core);

    for source in 0..n as u32 {
        let reference = reference_dijkstra(&edges, n, source);
        for target in 0..n as u32 {
            if source == target {
                continue;
            }
            let result = search
                .run(
                    &[Seed {
                        node: source,
                        key: 0,
                    }],
                    &[Seed {
                        node: target,
                        key: 0,
                    }],
                    &SearchOptions::default(),
                )
                .unwrap();
            assert_eq!(
                result.weight as u64, reference[target as usize],
                "distance {source} -> {target}"
            );
        }
    }
}

#[test]
fn test_core_search_matches_dijkstra() {
    // leave a third of the grid uncontracted as the core
    let edges = grid_edges();
    let n = (SIDE * SIDE) as usize;
    let (graph, core) = contracted(0.34);
    assert!(core.iter().any(|&c| c), "expected a non-empty core");
    let mut search = BidirSearch::new(&graph, &core);

    for source in [0u32, 7, 12] {
        let reference = reference_dijkstra(&edges, n, source);
        for target in 0..n as u32 {
            if source == target {
                continue;
            }
            let result = search
                .run(
                    &[Seed {
                        node: source,
                        key: 0,
                    }],
                    &[Seed {
                        node: target,
                        key: 0,
                    }],
                    &SearchOptions::default(),
                )
                .unwrap();
            assert_eq!(
                result.weight as u64, reference[target as usize],
                "core distance {source} -> {target}"
            );
        }
    }
}

#[test]
fn test_unpacked_weights_sum_to_distance() {
    let (graph, core) = contracted(0.0);
    let mut search = BidirSearch::new(&graph, &core);

    for (source, target) in [(0u32, 24u32), (3, 20), (10, 14), (24, 0)] {
        let result = search
            .run(
                &[Seed {
                    node: source,
                    key: 0,
                }],
                &[Seed {
                    node: target,
                    key: 0,
                }],
                &SearchOptions::default(),
            )
            .unwrap();
        let unpacked = unpack_path(&graph, &result.packed_path, 0).unwrap();
        let sum: u64 = unpacked.iter().map(|e| e.weight as u64).sum();
        assert_eq!(sum as i64, result.weight);
        // shortcuts only ever expand, never shrink, the step count
        assert!(unpacked.len() >= result.packed_path.len() - 1);
    }
}
