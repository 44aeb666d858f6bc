//! CSV speed and turn-penalty overrides
//!
//! Segment speeds arrive as `osm_from,osm_to,speed_kmh[,comment]` and
//! rewrite individual geometry segment weights; a speed of zero disables
//! the segment's direction. Turn penalties arrive as
//! `osm_from,osm_via,osm_to,penalty_seconds[,comment]` and are applied
//! during edge expansion; a negative penalty bans the turn. Files stack in
//! order, the last mention of a segment or turn wins.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::{ErrorKind, Result};
use crate::geo;
use crate::graph::compress::{CompressedEdge, CompressedGeometryStore};
use crate::graph::node_based::NodeBasedGraph;
use crate::graph::{weight_for, DatasourceId, NodeId, Weight};

/// Sentinel weight for a segment disabled by a zero speed.
pub const SEGMENT_DISABLED: Weight = Weight::MAX;

/// Relative weight change beyond which an override is logged.
pub const DEFAULT_LOG_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy)]
struct SpeedRecord {
    from: i64,
    to: i64,
    speed_kmh: f64,
}

fn parse_speed_file(path: &Path) -> Result<Vec<SpeedRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| ErrorKind::BadInput(format!("{}: {e}", path.display())))?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| ErrorKind::BadInput(format!("{}: {e}", path.display())))?;
        if row.len() < 3 {
            return Err(ErrorKind::BadInput(format!(
                "{}:{}: expected osm_from,osm_to,speed",
                path.display(),
                line + 1
            )));
        }
        let parse = |i: usize| -> Result<f64> {
            row[i].parse::<f64>().map_err(|_| {
                ErrorKind::BadInput(format!(
                    "{}:{}: malformed field {:?}",
                    path.display(),
                    line + 1,
                    &row[i]
                ))
            })
        };
        let record = SpeedRecord {
            from: parse(0)? as i64,
            to: parse(1)? as i64,
            speed_kmh: parse(2)?,
        };
        if record.speed_kmh < 0.0 {
            return Err(ErrorKind::BadInput(format!(
                "{}:{}: negative speed",
                path.display(),
                line + 1
            )));
        }
        records.push(record);
    }
    Ok(records)
}

/// Apply stacked segment-speed files to the compressed graph. Returns the
/// datasource name table: index 0 is the profile, 1..N the files in
/// order.
pub fn apply_segment_speeds(
    files: &[PathBuf],
    graph: &NodeBasedGraph,
    edges: &mut [CompressedEdge],
    geometry: &mut CompressedGeometryStore,
    log_factor: f64,
) -> Result<Vec<String>> {
    if files.len() > (DatasourceId::MAX - 1) as usize {
        return Err(ErrorKind::BadInput(format!(
            "{} speed files exceed the datasource id space",
            files.len()
        )));
    }

    // directed segment -> (edge index, geometry id, segment, is_forward)
    let mut segments: FxHashMap<(NodeId, NodeId), Vec<(usize, u32, usize, bool)>> =
        FxHashMap::default();
    for (edge_idx, edge) in edges.iter().enumerate() {
        let chain = geometry.nodes(edge.geometry_id);
        let mut prev = edge.source;
        for (segment, &head) in chain.iter().enumerate() {
            segments
                .entry((prev, head))
                .or_default()
                .push((edge_idx, edge.geometry_id, segment, true));
            segments
                .entry((head, prev))
                .or_default()
                .push((edge_idx, edge.geometry_id, segment, false));
            prev = head;
        }
    }

    let mut touched_edges: Vec<bool> = vec![false; edges.len()];

    for (file_idx, file) in files.iter().enumerate() {
        let datasource = (file_idx + 1) as DatasourceId;
        for record in parse_speed_file(file)? {
            let (Some(from), Some(to)) = (
                graph.internal_id(record.from),
                graph.internal_id(record.to),
            ) else {
                continue;
            };
            let Some(hits) = segments.get(&(from, to)) else {
                continue;
            };
            for &(edge_idx, geometry_id, segment, is_forward) in hits {
                let length_m = geo::approx_distance(
                    graph.coordinates[from as usize],
                    graph.coordinates[to as usize],
                );
                let new_weight = if record.speed_kmh == 0.0 {
                    SEGMENT_DISABLED
                } else {
                    weight_for(length_m, record.speed_kmh)
                };

                let old_fwd = geometry.forward_weights(geometry_id)[segment];
                let old_rev = geometry.reverse_weights(geometry_id)[segment];
                let (fwd, rev, old) = if is_forward {
                    (new_weight, old_rev, old_fwd)
                } else {
                    (old_fwd, new_weight, old_rev)
                };
                geometry.override_segment(geometry_id, segment, fwd, rev, datasource);
                touched_edges[edge_idx] = true;

                if old != 0 && old != SEGMENT_DISABLED && new_weight != SEGMENT_DISABLED {
                    let ratio = new_weight as f64 / old as f64;
                    if ratio > log_factor || ratio < 1.0 / log_factor {
                        warn!(
                            osm_from = record.from,
                            osm_to = record.to,
                            old_weight = old,
                            new_weight,
                            file = %file.display(),
                            "speed override changed segment weight substantially"
                        );
                    }
                }
            }
        }
    }

    // re-derive edge weights in parallel so the segment-sum invariant
    // holds; a disabled segment closes its direction
    let geometry_view: &CompressedGeometryStore = geometry;
    edges
        .par_iter_mut()
        .enumerate()
        .filter(|(edge_idx, _)| touched_edges[*edge_idx])
        .for_each(|(_, edge)| {
            let fwd = geometry_view.forward_weights(edge.geometry_id);
            if edge.data.forward {
                if fwd.contains(&SEGMENT_DISABLED) {
                    edge.data.forward = false;
                    edge.data.weight_forward = 0;
                } else {
                    edge.data.weight_forward = fwd.iter().sum();
                }
            }
            let rev = geometry_view.reverse_weights(edge.geometry_id);
            if edge.data.backward {
                if rev.contains(&SEGMENT_DISABLED) {
                    edge.data.backward = false;
                    edge.data.weight_backward = 0;
                } else {
                    edge.data.weight_backward = rev.iter().sum();
                }
            }
        });

    let mut names = Vec::with_capacity(files.len() + 1);
    names.push("profile".to_string());
    for file in files {
        names.push(
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string()),
        );
    }
    Ok(names)
}

/// Compiled turn-penalty overrides, keyed by internal node triples.
#[derive(Debug, Default)]
pub struct TurnPenaltyOverrides {
    map: FxHashMap<(NodeId, NodeId, NodeId), i64>,
}

impl TurnPenaltyOverrides {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(files: &[PathBuf], graph: &NodeBasedGraph) -> Result<TurnPenaltyOverrides> {
        let mut map = FxHashMap::default();
        for file in files {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_path(file)
                .map_err(|e| ErrorKind::BadInput(format!("{}: {e}", file.display())))?;
            for (line, row) in reader.records().enumerate() {
                let row = row
                    .map_err(|e| ErrorKind::BadInput(format!("{}: {e}", file.display())))?;
                if row.len() < 4 {
                    return Err(ErrorKind::BadInput(format!(
                        "{}:{}: expected osm_from,osm_via,osm_to,penalty",
                        file.display(),
                        line + 1
                    )));
                }
                let parse_id = |i: usize| -> Result<i64> {
                    row[i].parse::<i64>().map_err(|_| {
                        ErrorKind::BadInput(format!(
                            "{}:{}: malformed node id {:?}",
                            file.display(),
                            line + 1,
                            &row[i]
                        ))
                    })
                };
                let penalty_seconds = row[3].parse::<f64>().map_err(|_| {
                    ErrorKind::BadInput(format!(
                        "{}:{}: malformed penalty {:?}",
                        file.display(),
                        line + 1,
                        &row[3]
                    ))
                })?;
                let (Some(from), Some(via), Some(to)) = (
                    graph.internal_id(parse_id(0)?),
                    graph.internal_id(parse_id(1)?),
                    graph.internal_id(parse_id(2)?),
                ) else {
                    continue;
                };
                // stacking: the last file mentioning a turn wins
                map.insert((from, via, to), (penalty_seconds * 10.0) as i64);
            }
        }
        Ok(TurnPenaltyOverrides { map })
    }

    /// Penalty in deci-seconds; negative means the turn is banned.
    pub fn lookup(&self, from: NodeId, via: NodeId, to: NodeId) -> Option<i64> {
        self.map.get(&(from, via, to)).copied()
    }

    /// Via nodes carrying an override; compression must keep them.
    pub fn via_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.map.keys().map(|&(_, via, _)| via).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
