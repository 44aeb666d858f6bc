//! Monarch-Route: offline-preprocessing, online-query road routing
//!
//! Pipeline:
//! - Import - extractor output becomes the node-based street graph
//! - Compression - degree-2 chains collapse into geometry chains
//! - Overrides - CSV segment speeds and turn penalties rewrite weights
//! - Expansion - turns become first-class edges (THE routing graph)
//! - Contraction - priority-ordered node contraction with witness search
//! - Query - bidirectional CH search, shortcut unpacking, annotation
//!
//! Key principle: the edge-based graph is the single source of truth for
//! routing; every query runs on the same contracted edge-based graph.

pub mod cli;
pub mod contractor;
pub mod ebg;
pub mod engine;
pub mod error;
pub mod facade;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod heap;
pub mod import;
pub mod overrides;
pub mod polyline;
pub mod prepare;
pub mod profile;
pub mod query;
pub mod range_table;
pub mod response;
pub mod restrictions;
pub mod server;
pub mod simplify;
pub mod spatial;

pub use engine::RouteEngine;
pub use error::{ErrorKind, Result};
pub use facade::{InternalDataFacade, RouteData, SharedDataFacade, SharedRegions};
pub use prepare::{prepare, PrepareConfig, PreparedDataset};
pub use profile::{CarProfile, Profile};
