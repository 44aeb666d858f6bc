//! Online query machinery: the static graph, the bidirectional search,
//! shortcut unpacking, phantom points and route assembly.

pub mod annotate;
pub mod graph;
pub mod phantom;
pub mod search;
pub mod unpack;

pub use annotate::{assemble_leg, repair_instructions, PathData};
pub use graph::QueryGraph;
pub use phantom::{Hint, PhantomPoint};
pub use search::{BidirSearch, SearchOptions, SearchResult, Seed};
pub use unpack::{unpack_path, UnpackedEdge};
