//! Phantom points and query hints
//!
//! A phantom point is a query coordinate projected onto an edge-based
//! edge, with cumulative weight offsets along both traversal directions.
//! A hint is an opaque base64 snapshot of a phantom plus the dataset
//! checksum, letting a repeated query skip the R-tree lookup.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::geo::FixedLatLon;
use crate::graph::Weight;

use super::search::{Seed, SearchWeight};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhantomPoint {
    /// Edge-based node traversing the underlying edge in geometry order.
    pub forward_node: Option<u32>,
    /// Opposite traversal, when that direction is open.
    pub reverse_node: Option<u32>,
    /// Cost from the forward traversal's tail to the snapped point.
    pub forward_offset: Weight,
    /// Remaining cost from the snapped point to the forward head.
    pub forward_weight: Weight,
    pub reverse_offset: Weight,
    pub reverse_weight: Weight,
    /// Segment index under the snapped point, in geometry order.
    pub segment_position: u32,
    pub location: FixedLatLon,
    pub name_id: u32,
    pub geometry_id: u32,
    pub small_component: bool,
}

impl PhantomPoint {
    pub fn is_valid(&self) -> bool {
        self.forward_node.is_some() || self.reverse_node.is_some()
    }

    /// Whether both traversal directions are usable.
    pub fn is_bidirected(&self) -> bool {
        self.forward_node.is_some() && self.reverse_node.is_some()
    }

    /// Seeds for the forward heap when this phantom is a leg source. Keys
    /// are the remaining cost to the end of the seeded edge.
    pub fn source_seeds(&self, allow_forward: bool, allow_reverse: bool) -> Vec<Seed> {
        let mut seeds = Vec::with_capacity(2);
        if allow_forward {
            if let Some(node) = self.forward_node {
                seeds.push(Seed {
                    node,
                    key: self.forward_weight as SearchWeight,
                });
            }
        }
        if allow_reverse {
            if let Some(node) = self.reverse_node {
                seeds.push(Seed {
                    node,
                    key: self.reverse_weight as SearchWeight,
                });
            }
        }
        seeds
    }

    /// Seeds for the reverse heap when this phantom is a leg target. Keys
    /// are negative so the offset cancels at the meeting node.
    pub fn target_seeds(&self, allow_forward: bool, allow_reverse: bool) -> Vec<Seed> {
        let mut seeds = Vec::with_capacity(2);
        if allow_forward {
            if let Some(node) = self.forward_node {
                seeds.push(Seed {
                    node,
                    key: -(self.forward_weight as SearchWeight),
                });
            }
        }
        if allow_reverse {
            if let Some(node) = self.reverse_node {
                seeds.push(Seed {
                    node,
                    key: -(self.reverse_weight as SearchWeight),
                });
            }
        }
        seeds
    }

    /// True when both phantoms lie on the same directed traversal.
    pub fn shares_forward_edge(&self, other: &PhantomPoint) -> bool {
        self.forward_node.is_some() && self.forward_node == other.forward_node
    }
}

/// Opaque snapshot of a snapped location, valid for one dataset only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hint {
    pub phantom: PhantomPoint,
    pub checksum: u32,
}

impl Hint {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("hint serialization");
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Returns `None` for garbage input or a checksum from another
    /// dataset; the caller falls back to the R-tree.
    pub fn decode(encoded: &str, expected_checksum: u32) -> Option<Hint> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let hint: Hint = serde_json::from_slice(&bytes).ok()?;
        if hint.checksum != expected_checksum || !hint.phantom.is_valid() {
            return None;
        }
        Some(hint)
    }
}
