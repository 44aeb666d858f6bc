//! Owned-buffer data facade
//!
//! Loads every artifact into process memory. Used by single-process
//! deployments and by the preprocessing pipeline when it serves what it
//! just built without a round-trip through the filesystem.

use crate::ebg::TurnAnnotation;
use crate::error::{ErrorKind, Result};
use crate::formats::{
    corelevel::{CoreFile, LevelFile},
    datasource::{DatasourceIndexesFile, DatasourceNamesFile},
    edges::EdgesFile,
    geometry::GeometryFile,
    hsgr::HsgrFile,
    names::NamesFile,
    nodes::NodesFile,
    rtree::{FileIndexFile, RamIndexFile},
    timestamp::TimestampFile,
};
use crate::geo::FixedLatLon;
use crate::graph::compress::CompressedGeometryStore;
use crate::graph::{DatasourceId, NodeId, Weight};
use crate::query::graph::QueryGraph;
use crate::query::phantom::PhantomPoint;
use crate::spatial::{BearingFilter, SegmentRecord, SpatialIndex};

use super::{DatasetPaths, RouteData};

pub struct InternalDataFacade {
    coordinates: Vec<FixedLatLon>,
    external_ids: Vec<i64>,
    names: Vec<String>,
    annotations: Vec<TurnAnnotation>,
    geometry: CompressedGeometryStore,
    query_graph: QueryGraph,
    is_core: Vec<bool>,
    levels: Vec<u32>,
    datasource_names: Vec<String>,
    timestamp: String,
    checksum: u64,
    spatial: SpatialIndex,
}

impl InternalDataFacade {
    /// Load a dataset from disk, refusing mixed-dataset file families.
    pub fn load(paths: &DatasetPaths) -> Result<InternalDataFacade> {
        let (fp_nodes, external_ids, coordinates) = NodesFile::read(&paths.nodes())?;
        let (fp_edges, annotations) = EdgesFile::read(&paths.edges())?;
        let (fp_geometry, mut geometry) = GeometryFile::read(&paths.geometry())?;
        let (fp_hsgr, query_graph) = HsgrFile::read(&paths.hsgr())?;
        let (fp_core, is_core) = CoreFile::read(&paths.core())?;
        let (fp_level, levels) = LevelFile::read(&paths.level())?;
        let (fp_names, names) = NamesFile::read(&paths.names())?;
        let (fp_stamp, timestamp) = TimestampFile::read(&paths.timestamp())?;
        let (fp_ds_names, datasource_names) =
            DatasourceNamesFile::read(&paths.datasource_names())?;
        let (fp_ds_idx, datasources) =
            DatasourceIndexesFile::read(&paths.datasource_indexes())?;
        let (fp_ram, record_count) = RamIndexFile::read(&paths.ram_index())?;
        let (fp_file, records) = FileIndexFile::read(&paths.file_index(), record_count)?;

        let checksum = fp_nodes.checksum;
        for (name, fp) in [
            ("edges", fp_edges),
            ("geometry", fp_geometry),
            ("hsgr", fp_hsgr),
            ("core", fp_core),
            ("level", fp_level),
            ("names", fp_names),
            ("timestamp", fp_stamp),
            ("datasource_names", fp_ds_names),
            ("datasource_indexes", fp_ds_idx),
            ("ramIndex", fp_ram),
            ("fileIndex", fp_file),
        ] {
            if fp.checksum != checksum {
                return Err(ErrorKind::IncompatibleDataset(format!(
                    ".{name} belongs to a different dataset than .nodes"
                )));
            }
        }

        geometry.overlay_datasources(&datasources)?;
        query_graph.check_invariants()?;

        if is_core.len() != query_graph.node_count() || levels.len() != query_graph.node_count()
        {
            return Err(ErrorKind::IncompatibleDataset(
                "core/level tables do not match the query graph".to_string(),
            ));
        }

        Ok(Self::from_memory(FacadePieces {
            coordinates,
            external_ids,
            names,
            annotations,
            geometry,
            query_graph,
            is_core,
            levels,
            datasource_names,
            timestamp,
            checksum,
            records,
        }))
    }

    /// Assemble directly from preprocessing output.
    pub fn from_memory(pieces: FacadePieces) -> InternalDataFacade {
        InternalDataFacade {
            coordinates: pieces.coordinates,
            external_ids: pieces.external_ids,
            names: pieces.names,
            annotations: pieces.annotations,
            geometry: pieces.geometry,
            query_graph: pieces.query_graph,
            is_core: pieces.is_core,
            levels: pieces.levels,
            datasource_names: pieces.datasource_names,
            timestamp: pieces.timestamp,
            checksum: pieces.checksum,
            spatial: SpatialIndex::from_records(pieces.records),
        }
    }

    pub fn external_ids(&self) -> &[i64] {
        &self.external_ids
    }
}

/// Everything needed to assemble a facade in memory.
pub struct FacadePieces {
    pub coordinates: Vec<FixedLatLon>,
    pub external_ids: Vec<i64>,
    pub names: Vec<String>,
    pub annotations: Vec<TurnAnnotation>,
    pub geometry: CompressedGeometryStore,
    pub query_graph: QueryGraph,
    pub is_core: Vec<bool>,
    pub levels: Vec<u32>,
    pub datasource_names: Vec<String>,
    pub timestamp: String,
    pub checksum: u64,
    pub records: Vec<SegmentRecord>,
}

impl RouteData for InternalDataFacade {
    fn coordinate_of(&self, node: NodeId) -> FixedLatLon {
        self.coordinates[node as usize]
    }

    fn name_of(&self, name_id: u32) -> &str {
        self.names
            .get(name_id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    fn turn_annotation_of(&self, edge_based_edge: u32) -> TurnAnnotation {
        self.annotations[edge_based_edge as usize]
    }

    fn geometry_nodes(&self, geometry_id: u32) -> &[NodeId] {
        self.geometry.nodes(geometry_id)
    }

    fn geometry_forward_weights(&self, geometry_id: u32) -> &[Weight] {
        self.geometry.forward_weights(geometry_id)
    }

    fn geometry_reverse_weights(&self, geometry_id: u32) -> &[Weight] {
        self.geometry.reverse_weights(geometry_id)
    }

    fn geometry_datasources(&self, geometry_id: u32) -> &[DatasourceId] {
        self.geometry.datasources(geometry_id)
    }

    fn datasource_name(&self, source: DatasourceId) -> &str {
        self.datasource_names
            .get(source as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    fn query_graph(&self) -> &QueryGraph {
        &self.query_graph
    }

    fn core_flags(&self) -> &[bool] {
        &self.is_core
    }

    fn levels(&self) -> &[u32] {
        &self.levels
    }

    fn checksum(&self) -> u32 {
        self.checksum as u32
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn locate_nearest_edge(
        &self,
        coordinate: FixedLatLon,
        bearing: Option<BearingFilter>,
    ) -> Option<PhantomPoint> {
        self.spatial.snap(&self.geometry, coordinate, bearing)
    }
}
