//! Import boundary
//!
//! The engine does not parse OSM itself; an extractor hands it a JSON
//! document of nodes, ways and turn restrictions. This module maps that
//! document onto the internal import types.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ErrorKind, Result};
use crate::geo::FixedLatLon;
use crate::graph::node_based::{ImportNode, ImportWay};
use crate::profile::TagMap;
use crate::restrictions::{InputRestriction, RestrictionKind, RestrictionVia};

#[derive(Debug, Deserialize)]
struct WireNode {
    id: i64,
    lat: f64,
    lon: f64,
    #[serde(default)]
    tags: TagMap,
}

#[derive(Debug, Deserialize)]
struct WireWay {
    id: i64,
    nodes: Vec<i64>,
    #[serde(default)]
    tags: TagMap,
}

#[derive(Debug, Deserialize)]
struct WireRestriction {
    kind: String,
    from_way: i64,
    #[serde(default)]
    via_node: Option<i64>,
    #[serde(default)]
    via_way: Option<i64>,
    to_way: i64,
    #[serde(default)]
    except: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireExtract {
    nodes: Vec<WireNode>,
    ways: Vec<WireWay>,
    #[serde(default)]
    restrictions: Vec<WireRestriction>,
}

pub struct Extract {
    pub nodes: Vec<ImportNode>,
    pub ways: Vec<ImportWay>,
    pub restrictions: Vec<InputRestriction>,
}

pub fn read_extract(path: &Path) -> Result<Extract> {
    let bytes = std::fs::read(path).map_err(|e| ErrorKind::io(path, e))?;
    let wire: WireExtract = serde_json::from_slice(&bytes)
        .map_err(|e| ErrorKind::BadInput(format!("{}: {e}", path.display())))?;
    from_wire(wire)
}

fn from_wire(wire: WireExtract) -> Result<Extract> {
    let nodes = wire
        .nodes
        .into_iter()
        .map(|n| ImportNode {
            id: n.id,
            coordinate: FixedLatLon::from_degrees(n.lat, n.lon),
            tags: n.tags,
        })
        .collect();
    let ways = wire
        .ways
        .into_iter()
        .map(|w| ImportWay {
            id: w.id,
            nodes: w.nodes,
            tags: w.tags,
        })
        .collect();
    let restrictions = wire
        .restrictions
        .into_iter()
        .map(|r| {
            let kind = match r.kind.as_str() {
                "no" => RestrictionKind::No,
                "only" => RestrictionKind::Only,
                other => {
                    return Err(ErrorKind::BadInput(format!(
                        "unknown restriction kind {other:?}"
                    )))
                }
            };
            let via = match (r.via_node, r.via_way) {
                (Some(node), None) => RestrictionVia::Node(node),
                (None, Some(way)) => RestrictionVia::Way(way),
                _ => {
                    return Err(ErrorKind::BadInput(
                        "restriction needs exactly one of via_node, via_way".to_string(),
                    ))
                }
            };
            Ok(InputRestriction {
                kind,
                from_way: r.from_way,
                via,
                to_way: r.to_way,
                exceptions: r.except,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Extract {
        nodes,
        ways,
        restrictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_extract() {
        let json = r#"{
            "nodes": [{"id": 1, "lat": 50.0, "lon": 4.0},
                      {"id": 2, "lat": 50.0, "lon": 4.01, "tags": {"highway": "traffic_signals"}}],
            "ways": [{"id": 100, "nodes": [1, 2], "tags": {"highway": "residential"}}],
            "restrictions": [{"kind": "no", "from_way": 100, "via_node": 2, "to_way": 100}]
        }"#;
        let wire: WireExtract = serde_json::from_str(json).unwrap();
        let extract = from_wire(wire).unwrap();
        assert_eq!(extract.nodes.len(), 2);
        assert_eq!(extract.ways[0].nodes, vec![1, 2]);
        assert_eq!(extract.restrictions[0].kind, RestrictionKind::No);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let wire = WireExtract {
            nodes: vec![],
            ways: vec![],
            restrictions: vec![WireRestriction {
                kind: "maybe".to_string(),
                from_way: 1,
                via_node: Some(2),
                via_way: None,
                to_way: 3,
                except: vec![],
            }],
        };
        assert!(matches!(from_wire(wire), Err(ErrorKind::BadInput(_))));
    }

    #[test]
    fn test_via_way_passes_through_for_later_diagnosis() {
        let wire = WireExtract {
            nodes: vec![],
            ways: vec![],
            restrictions: vec![WireRestriction {
                kind: "no".to_string(),
                from_way: 1,
                via_node: None,
                via_way: Some(2),
                to_way: 3,
                except: vec![],
            }],
        };
        let extract = from_wire(wire).unwrap();
        assert_eq!(extract.restrictions[0].via, RestrictionVia::Way(2));
    }
}
