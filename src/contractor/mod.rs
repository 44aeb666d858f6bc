//! Contraction Hierarchies preprocessing
//!
//! `graph` holds the mutable contraction graph, `core` the per-node
//! witness search and shortcut synthesis, `scheduler` the ordering,
//! parallelization and the excludable-class variant.

pub mod core;
pub mod graph;
pub mod scheduler;

pub use graph::{ContractorEdgeData, ContractorGraph, InputEdge};
pub use scheduler::{
    contract_excludable, contract_graph, ContractionOutput, ExcludableOutput, FinalEdge,
    SchedulerSettings,
};

use crate::ebg::EdgeBasedGraph;

/// Directed contractor input edges from the expanded graph.
pub fn input_edges(ebg: &EdgeBasedGraph) -> Vec<InputEdge> {
    ebg.edges
        .iter()
        .enumerate()
        .map(|(id, e)| InputEdge {
            source: e.source,
            target: e.target,
            weight: e.weight,
            duration: e.duration,
            edge_id: id as u32,
        })
        .collect()
}
