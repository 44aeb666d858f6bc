//! Turn restriction index
//!
//! Restrictions arrive as (from_way, via_node, to_way, kind, exceptions)
//! and are compiled into a map keyed by (from_way, via_node) that the edge
//! expander consults per candidate turn. Via-way restrictions are not
//! supported and surface a diagnostic instead of a guess.

use rustc_hash::FxHashMap;

use crate::error::{ErrorKind, Result};
use crate::graph::{NodeBasedGraph, NodeId};
use crate::profile::Profile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    /// Forbids the specific turn.
    No,
    /// Forbids every turn at the via node except the listed one.
    Only,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionVia {
    Node(i64),
    Way(i64),
}

/// A restriction as parsed from the source dataset.
#[derive(Debug, Clone)]
pub struct InputRestriction {
    pub kind: RestrictionKind,
    pub from_way: i64,
    pub via: RestrictionVia,
    pub to_way: i64,
    /// Vehicle classes exempt from this restriction.
    pub exceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
struct CompiledRestriction {
    kind: RestrictionKind,
    to_way: i64,
}

#[derive(Debug, Default)]
pub struct RestrictionIndex {
    by_from_and_via: FxHashMap<(i64, NodeId), Vec<CompiledRestriction>>,
}

impl RestrictionIndex {
    /// Compile restrictions against the graph's id space, dropping the
    /// ones the profile is exempt from.
    pub fn compile(
        restrictions: &[InputRestriction],
        graph: &NodeBasedGraph,
        profile: &dyn Profile,
    ) -> Result<RestrictionIndex> {
        let mut index = RestrictionIndex::default();
        if !profile.use_turn_restrictions() {
            return Ok(index);
        }

        for r in restrictions {
            let via_node = match r.via {
                RestrictionVia::Node(n) => n,
                RestrictionVia::Way(w) => {
                    return Err(ErrorKind::BadInput(format!(
                        "restriction from way {} uses via-way {} which is unsupported",
                        r.from_way, w
                    )));
                }
            };

            if r.exceptions
                .iter()
                .any(|e| profile.exceptions().contains(e))
            {
                continue;
            }

            // restrictions on nodes outside the routable network are inert
            let Some(via) = graph.internal_id(via_node) else {
                continue;
            };

            index
                .by_from_and_via
                .entry((r.from_way, via))
                .or_default()
                .push(CompiledRestriction {
                    kind: r.kind,
                    to_way: r.to_way,
                });
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.by_from_and_via.values().map(Vec::len).sum()
    }

    /// Via nodes anchoring at least one restriction; compression must
    /// keep them addressable.
    pub fn via_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.by_from_and_via.keys().map(|&(_, via)| via).collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    pub fn is_empty(&self) -> bool {
        self.by_from_and_via.is_empty()
    }

    /// Whether the turn from_way -> via -> to_way is forbidden.
    pub fn forbids(&self, from_way: i64, via: NodeId, to_way: i64) -> bool {
        match self.by_from_and_via.get(&(from_way, via)) {
            None => false,
            Some(rules) => rules.iter().any(|r| match r.kind {
                RestrictionKind::No => r.to_way == to_way,
                RestrictionKind::Only => r.to_way != to_way,
            }),
        }
    }

    /// The mandated target way of an only-restriction, if one applies.
    pub fn only_target(&self, from_way: i64, via: NodeId) -> Option<i64> {
        self.by_from_and_via
            .get(&(from_way, via))?
            .iter()
            .find(|r| r.kind == RestrictionKind::Only)
            .map(|r| r.to_way)
    }
}
