//! Route assembly
//!
//! Turns unpacked edge-based edges into a per-segment path: node ids,
//! names, travel modes, segment durations and turn instructions, with the
//! first and last segments trimmed by the phantom offsets. The terminal
//! entry uses `INVALID_NODE` as a marker for the snapped target location.

use crate::ebg::turns::TurnInstruction;
use crate::error::{ErrorKind, Result};
use crate::facade::RouteData;
use crate::graph::{DatasourceId, NodeId, Weight, INVALID_NODE};
use crate::profile::TravelMode;

use super::phantom::PhantomPoint;
use super::unpack::UnpackedEdge;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathData {
    /// Geometry node at the end of this segment; `INVALID_NODE` marks the
    /// snapped target location itself.
    pub node: NodeId,
    pub name_id: u32,
    pub instruction: TurnInstruction,
    pub segment_duration: Weight,
    pub travel_mode: TravelMode,
    pub datasource: DatasourceId,
}

/// One compressed-edge traversal flattened into segment order.
struct TraversalView {
    heads: Vec<NodeId>,
    durations: Vec<Weight>,
    datasources: Vec<DatasourceId>,
    /// cum[i] = cost from the traversal tail to the start of segment i.
    cum: Vec<Weight>,
}

impl TraversalView {
    fn build(
        data: &dyn RouteData,
        geometry_id: u32,
        reversed: bool,
        head_node: Option<NodeId>,
    ) -> TraversalView {
        let chain = data.geometry_nodes(geometry_id);
        let forward = data.geometry_forward_weights(geometry_id);
        let reverse = data.geometry_reverse_weights(geometry_id);
        let sources = data.geometry_datasources(geometry_id);
        let len = chain.len();

        let (heads, durations, datasources) = if reversed {
            let heads = (0..len)
                .map(|j| {
                    if j + 1 < len {
                        chain[len - 2 - j]
                    } else {
                        head_node.unwrap_or(INVALID_NODE)
                    }
                })
                .collect();
            let durations: Vec<Weight> = (0..len).map(|j| reverse[len - 1 - j]).collect();
            let datasources = (0..len).map(|j| sources[len - 1 - j]).collect();
            (heads, durations, datasources)
        } else {
            (chain.to_vec(), forward.to_vec(), sources.to_vec())
        };

        let mut cum = Vec::with_capacity(len + 1);
        cum.push(0);
        for &d in &durations {
            cum.push(cum.last().unwrap() + d);
        }

        TraversalView {
            heads,
            durations,
            datasources,
            cum,
        }
    }

    fn len(&self) -> usize {
        self.heads.len()
    }
}

/// Phantom position translated into one traversal orientation.
fn phantom_position(phantom: &PhantomPoint, reversed: bool, len: usize) -> (usize, Weight) {
    if reversed {
        (
            len - 1 - phantom.segment_position as usize,
            phantom.reverse_offset,
        )
    } else {
        (phantom.segment_position as usize, phantom.forward_offset)
    }
}

/// Expand one leg into path data.
///
/// `packed_first`/`packed_last` are the endpoints of the packed node
/// sequence; they decide which traversal direction each phantom was
/// entered in.
pub fn assemble_leg(
    data: &dyn RouteData,
    unpacked: &[UnpackedEdge],
    packed_first: u32,
    packed_last: u32,
    source: &PhantomPoint,
    target: &PhantomPoint,
) -> Result<Vec<PathData>> {
    let start_reversed = source.forward_node != Some(packed_first);
    let target_reversed = target.forward_node != Some(packed_last);
    let mut path: Vec<PathData> = Vec::new();

    if unpacked.is_empty() {
        // both phantoms on the same traversal: a direct sub-segment, no
        // shortcut expansion
        if source.geometry_id != target.geometry_id {
            return Err(ErrorKind::InternalInvariant(
                "empty path between distinct edges".to_string(),
            ));
        }
        let view = TraversalView::build(data, source.geometry_id, start_reversed, None);
        let (p_s, o_s) = phantom_position(source, start_reversed, view.len());
        let (p_t, o_t) = phantom_position(target, start_reversed, view.len());
        if o_t < o_s {
            return Err(ErrorKind::InternalInvariant(
                "local path runs against the traversal".to_string(),
            ));
        }
        for j in p_s..p_t {
            let from = if j == p_s { o_s } else { view.cum[j] };
            path.push(PathData {
                node: view.heads[j],
                name_id: source.name_id,
                instruction: TurnInstruction::NoTurn,
                segment_duration: view.cum[j + 1] - from,
                travel_mode: TravelMode::Driving,
                datasource: view.datasources[j],
            });
        }
        path.push(PathData {
            node: INVALID_NODE,
            name_id: target.name_id,
            instruction: TurnInstruction::NoTurn,
            segment_duration: o_t - view.cum[p_t].max(o_s).min(o_t),
            travel_mode: TravelMode::Driving,
            datasource: view.datasources[p_t.min(view.len() - 1)],
        });
        return Ok(path);
    }

    // every step emits the geometry of the traversal it leaves, with the
    // turn instruction on the boundary segment
    for (k, step) in unpacked.iter().enumerate() {
        let ann = data.turn_annotation_of(step.edge_based_edge_id);
        let view =
            TraversalView::build(data, ann.geometry_id, ann.reversed, Some(ann.via_node));
        let (start_j, o_s) = if k == 0 {
            phantom_position(source, start_reversed, view.len())
        } else {
            (0, 0)
        };
        for j in start_j..view.len() {
            let from = if j == start_j { o_s } else { view.cum[j] };
            path.push(PathData {
                node: view.heads[j],
                name_id: ann.name_id,
                instruction: TurnInstruction::NoTurn,
                segment_duration: view.cum[j + 1].saturating_sub(from),
                travel_mode: ann.travel_mode,
                datasource: view.datasources[j],
            });
        }
        path.last_mut().expect("step emits segments").instruction = ann.instruction;
    }

    // the target phantom's own traversal, up to the snapped point
    let mode = path
        .last()
        .map(|p| p.travel_mode)
        .unwrap_or(TravelMode::Driving);
    let view = TraversalView::build(data, target.geometry_id, target_reversed, None);
    let (p_t, o_t) = phantom_position(target, target_reversed, view.len());
    for j in 0..p_t {
        path.push(PathData {
            node: view.heads[j],
            name_id: target.name_id,
            instruction: TurnInstruction::NoTurn,
            segment_duration: view.durations[j],
            travel_mode: mode,
            datasource: view.datasources[j],
        });
    }
    path.push(PathData {
        node: INVALID_NODE,
        name_id: target.name_id,
        instruction: TurnInstruction::NoTurn,
        segment_duration: o_t.saturating_sub(view.cum[p_t]),
        travel_mode: mode,
        datasource: view.datasources[p_t.min(view.len() - 1)],
    });

    Ok(path)
}

/// Post-concatenation repair: promote silent mode changes to straights,
/// silence repeated same-name straights, and tag the destination.
pub fn repair_instructions(path: &mut [PathData]) {
    for i in 1..path.len() {
        let prev = path[i - 1];
        let current = &mut path[i];
        if current.instruction == TurnInstruction::NoTurn
            && current.name_id == prev.name_id
            && current.travel_mode != prev.travel_mode
        {
            current.instruction = TurnInstruction::GoStraight;
        } else if current.instruction == TurnInstruction::GoStraight
            && current.name_id == prev.name_id
            && current.travel_mode == prev.travel_mode
        {
            current.instruction = TurnInstruction::NoTurn;
        }
    }
    if let Some(last) = path.last_mut() {
        last.instruction = TurnInstruction::ReachedYourDestination;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name_id: u32, instruction: TurnInstruction, mode: TravelMode) -> PathData {
        PathData {
            node: 0,
            name_id,
            instruction,
            segment_duration: 10,
            travel_mode: mode,
            datasource: 0,
        }
    }

    #[test]
    fn test_repair_tags_destination() {
        let mut path = vec![
            entry(1, TurnInstruction::HeadOn, TravelMode::Driving),
            entry(1, TurnInstruction::NoTurn, TravelMode::Driving),
        ];
        repair_instructions(&mut path);
        assert_eq!(
            path.last().unwrap().instruction,
            TurnInstruction::ReachedYourDestination
        );
    }

    #[test]
    fn test_repair_promotes_mode_change() {
        let mut path = vec![
            entry(1, TurnInstruction::HeadOn, TravelMode::Driving),
            entry(1, TurnInstruction::NoTurn, TravelMode::Ferry),
            entry(1, TurnInstruction::NoTurn, TravelMode::Ferry),
        ];
        repair_instructions(&mut path);
        assert_eq!(path[1].instruction, TurnInstruction::GoStraight);
    }

    #[test]
    fn test_repair_merges_same_name_straights() {
        let mut path = vec![
            entry(2, TurnInstruction::HeadOn, TravelMode::Driving),
            entry(2, TurnInstruction::GoStraight, TravelMode::Driving),
            entry(2, TurnInstruction::NoTurn, TravelMode::Driving),
        ];
        repair_instructions(&mut path);
        assert_eq!(path[1].instruction, TurnInstruction::NoTurn);
    }
}
