//! Node-based street graph
//!
//! Directed multigraph over junction nodes, built from parsed ways and the
//! active profile. External 64-bit ids are translated to dense u32 ids on
//! entry and only kept in a mapping table for the persistence boundary.

use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, Result};
use crate::geo::{self, FixedLatLon};
use crate::profile::{Profile, RoadClass, TagMap, TravelMode};

use super::{weight_for, EdgeId, NodeId, Weight};

/// A node of the source dataset, before internal ids are assigned.
#[derive(Debug, Clone)]
pub struct ImportNode {
    pub id: i64,
    pub coordinate: FixedLatLon,
    pub tags: TagMap,
}

/// A way of the source dataset.
#[derive(Debug, Clone)]
pub struct ImportWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: TagMap,
}

#[derive(Debug, Clone)]
pub struct NodeBasedEdgeData {
    pub distance_m: f64,
    pub weight_forward: Weight,
    pub weight_backward: Weight,
    pub forward: bool,
    pub backward: bool,
    pub access_restricted: bool,
    pub roundabout: bool,
    pub contra_flow: bool,
    pub class: RoadClass,
    pub name_id: u32,
    pub travel_mode_forward: TravelMode,
    pub travel_mode_backward: TravelMode,
    pub way_id: i64,
}

#[derive(Debug, Clone)]
pub struct NodeBasedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: NodeBasedEdgeData,
}

#[derive(Debug)]
pub struct NodeBasedGraph {
    pub coordinates: Vec<FixedLatLon>,
    pub external_ids: Vec<i64>,
    pub barrier: Vec<bool>,
    pub signal: Vec<bool>,
    pub edges: Vec<NodeBasedEdge>,
    /// Edge ids incident to each node, both directions.
    adjacency: Vec<Vec<EdgeId>>,
    /// Deduplicated street names; `name_id` indexes into this.
    pub names: Vec<String>,
    external_to_internal: FxHashMap<i64, NodeId>,
}

impl NodeBasedGraph {
    /// Build the graph from parsed ways, consulting the profile for
    /// per-way speeds and per-node barriers.
    pub fn from_ways(
        nodes: Vec<ImportNode>,
        ways: Vec<ImportWay>,
        profile: &dyn Profile,
    ) -> Result<NodeBasedGraph> {
        if ways.is_empty() {
            return Err(ErrorKind::BadInput("dataset contains no ways".to_string()));
        }

        let mut node_index: FxHashMap<i64, &ImportNode> = FxHashMap::default();
        for node in &nodes {
            node_index.insert(node.id, node);
        }

        // classify ways first so only routable ways claim node ids
        let mut classified = Vec::with_capacity(ways.len());
        for way in &ways {
            if way.nodes.len() < 2 {
                continue;
            }
            if let Some(props) = profile.way_speed(&way.tags) {
                if props.forward_speed_kmh > 0.0 || props.backward_speed_kmh > 0.0 {
                    classified.push((way, props));
                }
            }
        }
        if classified.is_empty() {
            return Err(ErrorKind::BadInput(
                "no routable ways after profile classification".to_string(),
            ));
        }

        // assign dense internal ids in external-id order for determinism
        let mut used: Vec<i64> = classified
            .iter()
            .flat_map(|(way, _)| way.nodes.iter().copied())
            .collect();
        used.sort_unstable();
        used.dedup();

        let mut external_to_internal = FxHashMap::default();
        let mut coordinates = Vec::with_capacity(used.len());
        let mut external_ids = Vec::with_capacity(used.len());
        let mut barrier = vec![false; used.len()];
        let mut signal = vec![false; used.len()];
        for (internal, &external) in used.iter().enumerate() {
            let import = node_index.get(&external).ok_or_else(|| {
                ErrorKind::BadInput(format!("way references unknown node {external}"))
            })?;
            external_to_internal.insert(external, internal as NodeId);
            coordinates.push(import.coordinate);
            external_ids.push(external);
            let props = profile.node_barrier(&import.tags);
            barrier[internal] = props.is_barrier;
            signal[internal] = props.is_signal;
        }

        let mut names: Vec<String> = vec![String::new()];
        let mut name_ids: FxHashMap<String, u32> = FxHashMap::default();
        name_ids.insert(String::new(), 0);

        let mut graph = NodeBasedGraph {
            adjacency: vec![Vec::new(); coordinates.len()],
            coordinates,
            external_ids,
            barrier,
            signal,
            edges: Vec::new(),
            names: Vec::new(),
            external_to_internal,
        };

        for (way, props) in classified {
            let name_id = *name_ids.entry(props.name.clone()).or_insert_with(|| {
                names.push(props.name.clone());
                (names.len() - 1) as u32
            });

            for pair in way.nodes.windows(2) {
                let source = graph.external_to_internal[&pair[0]];
                let target = graph.external_to_internal[&pair[1]];
                if source == target {
                    continue;
                }
                let distance_m =
                    geo::approx_distance(graph.coordinates[source as usize], graph.coordinates[target as usize]);
                let forward = props.forward_speed_kmh > 0.0;
                let backward = props.backward_speed_kmh > 0.0;
                let data = NodeBasedEdgeData {
                    distance_m,
                    weight_forward: if forward {
                        weight_for(distance_m, props.forward_speed_kmh)
                    } else {
                        0
                    },
                    weight_backward: if backward {
                        weight_for(distance_m, props.backward_speed_kmh)
                    } else {
                        0
                    },
                    forward,
                    backward,
                    access_restricted: props.access_restricted,
                    roundabout: props.roundabout,
                    contra_flow: props.contra_flow,
                    class: props.classification,
                    name_id,
                    travel_mode_forward: props.travel_mode_forward,
                    travel_mode_backward: props.travel_mode_backward,
                    way_id: way.id,
                };
                graph.push_edge(source, target, data);
            }
        }

        graph.names = names;
        Ok(graph)
    }

    fn push_edge(&mut self, source: NodeId, target: NodeId, data: NodeBasedEdgeData) {
        let id = self.edges.len() as EdgeId;
        self.adjacency[source as usize].push(id);
        self.adjacency[target as usize].push(id);
        self.edges.push(NodeBasedEdge {
            source,
            target,
            data,
        });
    }

    pub fn node_count(&self) -> usize {
        self.coordinates.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn internal_id(&self, external: i64) -> Option<NodeId> {
        self.external_to_internal.get(&external).copied()
    }

    /// All edge ids incident to `node`, regardless of direction.
    pub fn incident_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.adjacency[node as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &NodeBasedEdge {
        &self.edges[id as usize]
    }

    /// True if `edge` can be traversed leaving `from`.
    pub fn traversable_from(&self, edge: EdgeId, from: NodeId) -> bool {
        let e = self.edge(edge);
        (e.source == from && e.data.forward) || (e.target == from && e.data.backward)
    }

    /// The opposite endpoint of `edge` as seen from `node`.
    pub fn other_endpoint(&self, edge: EdgeId, node: NodeId) -> NodeId {
        let e = self.edge(edge);
        if e.source == node {
            e.target
        } else {
            e.source
        }
    }
}
