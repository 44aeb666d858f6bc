//! Immutable query graph
//!
//! CSR over the contracted edge set, sorted by (source, target). Each edge
//! keeps the contractor payload: middle node for shortcuts, edge-based
//! edge id for originals. Per-metric bit filters select the edge subset a
//! metric may traverse.

use crate::contractor::{ContractorEdgeData, FinalEdge};
use crate::error::{ErrorKind, Result};
use crate::graph::Weight;

pub type QueryEdgeData = ContractorEdgeData;

#[derive(Debug, Clone, Default)]
pub struct QueryGraph {
    node_offsets: Vec<u32>,
    targets: Vec<u32>,
    edge_data: Vec<QueryEdgeData>,
    /// Per-metric validity bits, parallel to the edge arrays.
    filters: Vec<Vec<bool>>,
}

impl QueryGraph {
    /// Build from contractor output. `filters` may be empty for a single
    /// unfiltered metric; otherwise each filter must parallel `edges`.
    pub fn new(
        node_count: usize,
        edges: Vec<FinalEdge>,
        filters: Vec<Vec<bool>>,
    ) -> Result<QueryGraph> {
        for f in &filters {
            if f.len() != edges.len() {
                return Err(ErrorKind::InternalInvariant(
                    "edge filter length mismatch".to_string(),
                ));
            }
        }

        let mut order: Vec<u32> = (0..edges.len() as u32).collect();
        order.sort_unstable_by_key(|&i| {
            let e = &edges[i as usize];
            (e.source, e.target, e.data.weight)
        });

        let mut node_offsets = vec![0u32; node_count + 1];
        let mut targets = Vec::with_capacity(edges.len());
        let mut edge_data = Vec::with_capacity(edges.len());
        let mut sorted_filters: Vec<Vec<bool>> =
            filters.iter().map(|_| Vec::with_capacity(edges.len())).collect();

        for &i in &order {
            let e = &edges[i as usize];
            if e.source as usize >= node_count || e.target as usize >= node_count {
                return Err(ErrorKind::InternalInvariant(format!(
                    "edge {} -> {} outside node range {}",
                    e.source, e.target, node_count
                )));
            }
            node_offsets[e.source as usize + 1] += 1;
            targets.push(e.target);
            edge_data.push(e.data);
            for (f, sf) in filters.iter().zip(sorted_filters.iter_mut()) {
                sf.push(f[i as usize]);
            }
        }
        for i in 0..node_count {
            node_offsets[i + 1] += node_offsets[i];
        }

        Ok(QueryGraph {
            node_offsets,
            targets,
            edge_data,
            filters: sorted_filters,
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_offsets.len() - 1
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    pub fn metric_count(&self) -> usize {
        self.filters.len().max(1)
    }

    pub fn adjacent_edges(&self, node: u32) -> std::ops::Range<u32> {
        self.node_offsets[node as usize]..self.node_offsets[node as usize + 1]
    }

    pub fn target(&self, edge: u32) -> u32 {
        self.targets[edge as usize]
    }

    pub fn edge(&self, edge: u32) -> &QueryEdgeData {
        &self.edge_data[edge as usize]
    }

    /// Whether `edge` is traversable under the given metric.
    pub fn passes_filter(&self, edge: u32, metric: usize) -> bool {
        match self.filters.get(metric) {
            Some(f) => f[edge as usize],
            None => true,
        }
    }

    pub fn filter(&self, metric: usize) -> Option<&[bool]> {
        self.filters.get(metric).map(Vec::as_slice)
    }

    /// The cheapest edge `source -> target` traversable in the direction
    /// given by `forward`.
    pub fn find_smallest_edge(
        &self,
        source: u32,
        target: u32,
        forward: bool,
        metric: usize,
    ) -> Option<(u32, &QueryEdgeData)> {
        let mut best: Option<(u32, &QueryEdgeData)> = None;
        for edge in self.adjacent_edges(source) {
            if self.target(edge) != target || !self.passes_filter(edge, metric) {
                continue;
            }
            let data = self.edge(edge);
            let open = if forward { data.forward } else { data.backward };
            if !open {
                continue;
            }
            if best.map(|(_, b)| data.weight < b.weight).unwrap_or(true) {
                best = Some((edge, data));
            }
        }
        best
    }

    /// Structural invariants: monotone offsets, sorted adjacency, and for
    /// every shortcut a matching down/up pair whose weights add up.
    pub fn check_invariants(&self) -> Result<()> {
        for w in self.node_offsets.windows(2) {
            if w[0] > w[1] {
                return Err(ErrorKind::InternalInvariant(
                    "node offsets not monotone".to_string(),
                ));
            }
        }
        for node in 0..self.node_count() as u32 {
            let range = self.adjacent_edges(node);
            for pair in self.targets[range.start as usize..range.end as usize].windows(2) {
                if pair[0] > pair[1] {
                    return Err(ErrorKind::InternalInvariant(format!(
                        "adjacency of node {node} not sorted"
                    )));
                }
            }
        }
        for node in 0..self.node_count() as u32 {
            for edge in self.adjacent_edges(node) {
                let data = self.edge(edge);
                if data.weight == 0 {
                    return Err(ErrorKind::InternalInvariant(format!(
                        "zero-weight edge at node {node}"
                    )));
                }
                if !data.shortcut {
                    continue;
                }
                let middle = data.payload;
                let first = self.weight_between(middle, node, !data.forward);
                let second = self.weight_between(middle, self.target(edge), data.forward);
                match (first, second) {
                    (Some(a), Some(b)) if a + b == data.weight => {}
                    _ => {
                        return Err(ErrorKind::InternalInvariant(format!(
                            "shortcut {node} -> {} via {middle} has no matching pair",
                            self.target(edge)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Cheapest weight of an edge stored at `middle` toward `other` in the
    /// requested direction. Shortcut halves live in the middle node's
    /// adjacency because the middle was contracted before both endpoints.
    fn weight_between(&self, middle: u32, other: u32, forward: bool) -> Option<Weight> {
        self.find_smallest_edge(middle, other, forward, usize::MAX)
            .map(|(_, d)| d.weight)
    }

    /// CRC32 of the packed edge array; persisted in `.hsgr` and compared
    /// on load against the dataset it was built from.
    pub fn edges_crc32(&self) -> u32 {
        const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
        let mut digest = CRC32.digest();
        for (target, data) in self.targets.iter().zip(self.edge_data.iter()) {
            digest.update(&target.to_le_bytes());
            digest.update(&data.weight.to_le_bytes());
            digest.update(&data.duration.to_le_bytes());
            digest.update(&data.original_edges.to_le_bytes());
            digest.update(&data.payload.to_le_bytes());
            let flags = (data.shortcut as u8)
                | ((data.forward as u8) << 1)
                | ((data.backward as u8) << 2);
            digest.update(&[flags]);
        }
        digest.finalize()
    }

    pub(crate) fn into_parts(self) -> (Vec<u32>, Vec<u32>, Vec<QueryEdgeData>, Vec<Vec<bool>>) {
        (self.node_offsets, self.targets, self.edge_data, self.filters)
    }

    pub(crate) fn from_parts(
        node_offsets: Vec<u32>,
        targets: Vec<u32>,
        edge_data: Vec<QueryEdgeData>,
        filters: Vec<Vec<bool>>,
    ) -> Self {
        Self {
            node_offsets,
            targets,
            edge_data,
            filters,
        }
    }
}
