//! Data facade
//!
//! Query components are polymorphic over one capability interface; the
//! interface is satisfied by an owned-buffer backing and by a
//! memory-mapped backing. The reload module provides the rendezvous that
//! swaps the active backing under running queries.

pub mod internal;
pub mod reload;
pub mod shared;

use std::path::{Path, PathBuf};

use crate::ebg::TurnAnnotation;
use crate::geo::FixedLatLon;
use crate::graph::{DatasourceId, NodeId, Weight};
use crate::query::graph::QueryGraph;
use crate::query::phantom::PhantomPoint;
use crate::spatial::BearingFilter;

pub use internal::InternalDataFacade;
pub use reload::SharedRegions;
pub use shared::SharedDataFacade;

/// Everything the query side may ask of a dataset.
pub trait RouteData: Send + Sync {
    fn coordinate_of(&self, node: NodeId) -> FixedLatLon;
    fn name_of(&self, name_id: u32) -> &str;
    fn turn_annotation_of(&self, edge_based_edge: u32) -> TurnAnnotation;
    fn geometry_nodes(&self, geometry_id: u32) -> &[NodeId];
    fn geometry_forward_weights(&self, geometry_id: u32) -> &[Weight];
    fn geometry_reverse_weights(&self, geometry_id: u32) -> &[Weight];
    fn geometry_datasources(&self, geometry_id: u32) -> &[DatasourceId];
    fn datasource_name(&self, source: DatasourceId) -> &str;
    fn query_graph(&self) -> &QueryGraph;
    fn core_flags(&self) -> &[bool];
    fn levels(&self) -> &[u32];
    /// Low 32 bits of the dataset fingerprint checksum; hints embed it.
    fn checksum(&self) -> u32;
    fn timestamp(&self) -> &str;
    fn locate_nearest_edge(
        &self,
        coordinate: FixedLatLon,
        bearing: Option<BearingFilter>,
    ) -> Option<PhantomPoint>;
}

/// The file family of one dataset: `<base>.nodes`, `<base>.hsgr`, ...
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    base: PathBuf,
}

impl DatasetPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .base
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.push('.');
        name.push_str(suffix);
        self.base.with_file_name(name)
    }

    pub fn nodes(&self) -> PathBuf {
        self.with_suffix("nodes")
    }

    pub fn edges(&self) -> PathBuf {
        self.with_suffix("edges")
    }

    pub fn geometry(&self) -> PathBuf {
        self.with_suffix("geometry")
    }

    pub fn hsgr(&self) -> PathBuf {
        self.with_suffix("hsgr")
    }

    pub fn core(&self) -> PathBuf {
        self.with_suffix("core")
    }

    pub fn level(&self) -> PathBuf {
        self.with_suffix("level")
    }

    pub fn ram_index(&self) -> PathBuf {
        self.with_suffix("ramIndex")
    }

    pub fn file_index(&self) -> PathBuf {
        self.with_suffix("fileIndex")
    }

    pub fn names(&self) -> PathBuf {
        self.with_suffix("names")
    }

    pub fn timestamp(&self) -> PathBuf {
        self.with_suffix("timestamp")
    }

    pub fn datasource_names(&self) -> PathBuf {
        self.with_suffix("datasource_names")
    }

    pub fn datasource_indexes(&self) -> PathBuf {
        self.with_suffix("datasource_indexes")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_paths() {
        let paths = DatasetPaths::new("/data/monaco.osrm");
        assert_eq!(paths.nodes(), PathBuf::from("/data/monaco.osrm.nodes"));
        assert_eq!(paths.hsgr(), PathBuf::from("/data/monaco.osrm.hsgr"));
        assert_eq!(
            paths.datasource_indexes(),
            PathBuf::from("/data/monaco.osrm.datasource_indexes")
        );
    }
}
