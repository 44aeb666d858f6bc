//! Offline preprocessing pipeline
//!
//! Parsed ways in, serialized dataset out: node-based graph, geometry
//! compression, CSV overrides, edge expansion, contraction, query graph
//! and the artifact family. The node-based graph is dropped as soon as
//! the edge-based graph exists; the contractor graph dies with the
//! scheduler.

use std::path::PathBuf;
use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::contractor::{self, contract_excludable, ContractorGraph, SchedulerSettings};
use crate::ebg::{EdgeBasedGraph, EdgeExpander, TurnAnnotation};
use crate::error::Result;
use crate::facade::internal::{FacadePieces, InternalDataFacade};
use crate::facade::DatasetPaths;
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
use crate::graph::node_based::{ImportNode, ImportWay, NodeBasedGraph};
use crate::graph::GeometryCompressor;
use crate::overrides::{self, TurnPenaltyOverrides};
use crate::profile::{Profile, TravelMode};
use crate::query::graph::QueryGraph;
use crate::restrictions::{InputRestriction, RestrictionIndex};
use crate::spatial::{build_segment_records, SegmentRecord};

/// Node classes a metric may exclude; the scheduler then builds one query
/// graph whose edges carry a per-metric filter bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludableClass {
    Ferry,
    AccessRestricted,
}

#[derive(Debug, Default)]
pub struct PrepareConfig {
    pub speed_files: Vec<PathBuf>,
    pub turn_penalty_files: Vec<PathBuf>,
    pub excludes: Vec<ExcludableClass>,
    pub scheduler: SchedulerSettings,
    /// Defaults to the current UTC time.
    pub timestamp: Option<String>,
}

pub struct PreparedDataset {
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

pub fn prepare(
    nodes: Vec<ImportNode>,
    ways: Vec<ImportWay>,
    restrictions: &[InputRestriction],
    profile: &dyn Profile,
    config: &PrepareConfig,
) -> Result<PreparedDataset> {
    let start = Instant::now();

    println!("Building node-based graph...");
    let graph = NodeBasedGraph::from_ways(nodes, ways, profile)?;
    println!(
        "  ✓ {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    println!("Compiling {} turn restriction(s)...", restrictions.len());
    let restriction_index = RestrictionIndex::compile(restrictions, &graph, profile)?;
    let turn_overrides = if config.turn_penalty_files.is_empty() {
        TurnPenaltyOverrides::empty()
    } else {
        TurnPenaltyOverrides::load(&config.turn_penalty_files, &graph)?
    };

    println!("Compressing degree-2 chains...");
    let (mut compressed_edges, mut geometry) =
        GeometryCompressor::new(&graph, profile.traffic_signal_penalty())
            .with_protected_nodes(&restriction_index.via_nodes())
            .with_protected_nodes(&turn_overrides.via_nodes())
            .run();
    println!(
        "  ✓ {} compressed edges, {} geometry chains",
        compressed_edges.len(),
        geometry.chain_count()
    );

    let datasource_names = if config.speed_files.is_empty() {
        vec!["profile".to_string()]
    } else {
        println!("Applying {} speed override file(s)...", config.speed_files.len());
        overrides::apply_segment_speeds(
            &config.speed_files,
            &graph,
            &mut compressed_edges,
            &mut geometry,
            overrides::DEFAULT_LOG_FACTOR,
        )?
    };

    println!("Expanding to edge-based graph...");
    let ebg = EdgeExpander::new(
        &graph,
        &compressed_edges,
        &geometry,
        &restriction_index,
        profile,
    )
    .with_turn_overrides(&turn_overrides)
    .run()?;
    println!("  ✓ {} nodes, {} turns", ebg.node_count(), ebg.edge_count());

    let records = build_segment_records(&ebg, &geometry, &graph.coordinates);

    // the node-based graph is no longer needed past this point; keep only
    // what the artifacts reference
    let coordinates = graph.coordinates;
    let external_ids = graph.external_ids;
    let names = graph.names;

    println!("Contracting...");
    let filters = metric_filters(&ebg, &config.excludes);
    let input_edges = contractor::input_edges(&ebg);
    let contractor_graph = ContractorGraph::new(ebg.node_count(), &input_edges);
    let output = contract_excludable(contractor_graph, &filters, &config.scheduler);
    println!(
        "  ✓ {} query edges, {} core nodes",
        output.edges.len(),
        output.is_core.iter().filter(|&&c| c).count()
    );

    let query_graph = QueryGraph::new(ebg.node_count(), output.edges, output.edge_filters)?;
    query_graph.check_invariants()?;

    let timestamp = config.timestamp.clone().unwrap_or_else(|| {
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    });
    let checksum = dataset_checksum(&external_ids, &coordinates, &query_graph, &timestamp);
    println!("  dataset checksum {}", hex::encode(checksum.to_le_bytes()));

    println!("Preprocessing finished in {:.2}s", start.elapsed().as_secs_f64());

    Ok(PreparedDataset {
        coordinates,
        external_ids,
        names,
        annotations: ebg.annotations,
        geometry,
        query_graph,
        is_core: output.is_core,
        levels: output.levels,
        datasource_names,
        timestamp,
        checksum,
        records,
    })
}

/// Metric 0 allows everything; each exclude adds one metric whose filter
/// drops nodes of that class.
fn metric_filters(ebg: &EdgeBasedGraph, excludes: &[ExcludableClass]) -> Vec<Vec<bool>> {
    let mut filters = vec![vec![true; ebg.node_count()]];
    for exclude in excludes {
        let filter = ebg
            .nodes
            .iter()
            .map(|n| match exclude {
                ExcludableClass::Ferry => n.travel_mode != TravelMode::Ferry,
                ExcludableClass::AccessRestricted => !n.access_restricted,
            })
            .collect();
        filters.push(filter);
    }
    filters
}

fn dataset_checksum(
    external_ids: &[i64],
    coordinates: &[FixedLatLon],
    query_graph: &QueryGraph,
    timestamp: &str,
) -> u64 {
    let mut hasher = Sha256::new();
    for id in external_ids {
        hasher.update(id.to_le_bytes());
    }
    for c in coordinates {
        hasher.update(c.lat.to_le_bytes());
        hasher.update(c.lon.to_le_bytes());
    }
    hasher.update(query_graph.edges_crc32().to_le_bytes());
    hasher.update(timestamp.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().expect("8 bytes"))
}

impl PreparedDataset {
    /// Write the whole artifact family.
    pub fn write(&self, paths: &DatasetPaths) -> Result<()> {
        NodesFile::write(
            &paths.nodes(),
            self.checksum,
            &self.external_ids,
            &self.coordinates,
        )?;
        EdgesFile::write(&paths.edges(), self.checksum, &self.annotations)?;
        GeometryFile::write(&paths.geometry(), self.checksum, &self.geometry)?;
        HsgrFile::write(&paths.hsgr(), self.checksum, &self.query_graph)?;
        CoreFile::write(&paths.core(), self.checksum, &self.is_core)?;
        LevelFile::write(&paths.level(), self.checksum, &self.levels)?;
        NamesFile::write(&paths.names(), self.checksum, &self.names)?;
        TimestampFile::write(&paths.timestamp(), self.checksum, &self.timestamp)?;
        DatasourceNamesFile::write(
            &paths.datasource_names(),
            self.checksum,
            &self.datasource_names,
        )?;
        let (_, _, _, _, datasources) = self.geometry.parts();
        DatasourceIndexesFile::write(&paths.datasource_indexes(), self.checksum, datasources)?;
        RamIndexFile::write(&paths.ram_index(), self.checksum, self.records.len())?;
        FileIndexFile::write(&paths.file_index(), self.checksum, &self.records)?;
        Ok(())
    }

    /// Serve straight from memory without touching the filesystem.
    pub fn into_facade(self) -> InternalDataFacade {
        InternalDataFacade::from_memory(FacadePieces {
            coordinates: self.coordinates,
            external_ids: self.external_ids,
            names: self.names,
            annotations: self.annotations,
            geometry: self.geometry,
            query_graph: self.query_graph,
            is_core: self.is_core,
            levels: self.levels,
            datasource_names: self.datasource_names,
            timestamp: self.timestamp,
            checksum: self.checksum,
            records: self.records,
        })
    }
}
