//! Memory-mapped data facade
//!
//! Maps the geometry weight arrays, the bulk of a continent dataset,
//! read-only into the process and serves slices straight out of the map.
//! The remaining tables are small and loaded owned. The mapped path
//! assumes a little-endian host, like every artifact in the family.

use bytemuck::cast_slice;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::ebg::TurnAnnotation;
use crate::error::{ErrorKind, Result};
use crate::formats::{
    self,
    corelevel::{CoreFile, LevelFile},
    datasource::{DatasourceIndexesFile, DatasourceNamesFile},
    edges::EdgesFile,
    hsgr::HsgrFile,
    names::NamesFile,
    nodes::NodesFile,
    rtree::{FileIndexFile, RamIndexFile},
    timestamp::TimestampFile,
    Fingerprint,
};
use crate::geo::FixedLatLon;
use crate::graph::{DatasourceId, NodeId, Weight};
use crate::query::graph::QueryGraph;
use crate::query::phantom::PhantomPoint;
use crate::range_table::{RangeTable, BLOCK_SIZE};
use crate::spatial::{BearingFilter, GeometryWeights, SpatialIndex};

use super::{DatasetPaths, RouteData};

/// Zero-copy view over the `.geometry` arrays.
pub struct MappedGeometry {
    map: Mmap,
    offsets: Vec<u32>,
    nodes_start: usize,
    forward_start: usize,
    reverse_start: usize,
    total: usize,
    datasources: Vec<DatasourceId>,
}

impl MappedGeometry {
    fn open(paths: &DatasetPaths) -> Result<(Fingerprint, MappedGeometry)> {
        let path = paths.geometry();
        let file = File::open(&path).map_err(|e| ErrorKind::io(&path, e))?;
        let mut reader = BufReader::new(&file);
        let fingerprint = Fingerprint::read(&mut reader, &path)?;

        let len = formats::read_u32(&mut reader, &path)? as usize;
        let n_blocks = formats::read_u32(&mut reader, &path)? as usize;
        let mut block_offsets = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            block_offsets.push(formats::read_u32(&mut reader, &path)?);
        }
        let mut diff_blocks = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            let mut block = [0u8; BLOCK_SIZE];
            reader.read_exact(&mut block).map_err(|e| ErrorKind::io(&path, e))?;
            diff_blocks.push(block);
        }
        let sum_lengths = formats::read_u32(&mut reader, &path)?;
        if len == 0 {
            return Err(ErrorKind::BadInput(format!(
                "{}: empty geometry section",
                path.display()
            )));
        }
        let table = RangeTable::from_parts(block_offsets, diff_blocks, sum_lengths, len);
        let mut offsets = Vec::with_capacity(len + 1);
        for id in 0..len {
            offsets.push(table.range(id).start);
        }
        offsets.push(sum_lengths);

        let nodes_start = reader
            .stream_position()
            .map_err(|e| ErrorKind::io(&path, e))? as usize;
        let total = sum_lengths as usize;
        let forward_start = nodes_start + total * 4;
        let reverse_start = forward_start + total * 4;

        let mut file = reader.into_inner();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ErrorKind::io(&path, e))?;
        // read-only map shared between workers
        let map = unsafe { Mmap::map(file) }.map_err(|e| ErrorKind::io(&path, e))?;
        if map.len() < reverse_start + total * 4 {
            return Err(ErrorKind::BadInput(format!(
                "{}: truncated geometry arrays",
                path.display()
            )));
        }

        Ok((
            fingerprint,
            MappedGeometry {
                map,
                offsets,
                nodes_start,
                forward_start,
                reverse_start,
                total,
                datasources: vec![0; total],
            },
        ))
    }

    fn chain(&self, geometry_id: u32) -> std::ops::Range<usize> {
        let start = self.offsets[geometry_id as usize] as usize;
        let end = self.offsets[geometry_id as usize + 1] as usize;
        start..end
    }

    fn array(&self, base: usize) -> &[u32] {
        cast_slice(&self.map[base..base + self.total * 4])
    }

    fn nodes(&self, geometry_id: u32) -> &[NodeId] {
        &self.array(self.nodes_start)[self.chain(geometry_id)]
    }

    fn forward(&self, geometry_id: u32) -> &[Weight] {
        &self.array(self.forward_start)[self.chain(geometry_id)]
    }

    fn reverse(&self, geometry_id: u32) -> &[Weight] {
        &self.array(self.reverse_start)[self.chain(geometry_id)]
    }

    fn datasources_of(&self, geometry_id: u32) -> &[DatasourceId] {
        &self.datasources[self.chain(geometry_id)]
    }
}

impl GeometryWeights for MappedGeometry {
    fn forward_weights_of(&self, geometry_id: u32) -> &[Weight] {
        self.forward(geometry_id)
    }

    fn reverse_weights_of(&self, geometry_id: u32) -> &[Weight] {
        self.reverse(geometry_id)
    }
}

pub struct SharedDataFacade {
    coordinates: Vec<FixedLatLon>,
    names: Vec<String>,
    annotations: Vec<TurnAnnotation>,
    geometry: MappedGeometry,
    query_graph: QueryGraph,
    is_core: Vec<bool>,
    levels: Vec<u32>,
    datasource_names: Vec<String>,
    timestamp: String,
    checksum: u64,
    spatial: SpatialIndex,
}

impl SharedDataFacade {
    pub fn load(paths: &DatasetPaths) -> Result<SharedDataFacade> {
        let (fp_nodes, _external_ids, coordinates) = NodesFile::read(&paths.nodes())?;
        let (fp_edges, annotations) = EdgesFile::read(&paths.edges())?;
        let (fp_geometry, mut geometry) = MappedGeometry::open(paths)?;
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

        if datasources.len() != geometry.total {
            return Err(ErrorKind::IncompatibleDataset(format!(
                "datasource table has {} entries for {} geometry segments",
                datasources.len(),
                geometry.total
            )));
        }
        geometry.datasources = datasources;
        query_graph.check_invariants()?;

        Ok(SharedDataFacade {
            coordinates,
            names,
            annotations,
            geometry,
            query_graph,
            is_core,
            levels,
            datasource_names,
            timestamp,
            checksum,
            spatial: SpatialIndex::from_records(records),
        })
    }
}

impl RouteData for SharedDataFacade {
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
        self.geometry.forward(geometry_id)
    }

    fn geometry_reverse_weights(&self, geometry_id: u32) -> &[Weight] {
        self.geometry.reverse(geometry_id)
    }

    fn geometry_datasources(&self, geometry_id: u32) -> &[DatasourceId] {
        self.geometry.datasources_of(geometry_id)
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
