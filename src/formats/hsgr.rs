//! `.hsgr` - the contracted query graph: fingerprint, edge-array CRC32,
//! counts, CSR node offsets, CSR edges, and the per-metric edge filters

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::query::graph::{QueryEdgeData, QueryGraph};

use super::{
    io_err, pack_bits, read_u32, read_u64, read_u8, unpack_bits, write_u32, write_u64, write_u8,
    Fingerprint,
};

pub struct HsgrFile;

impl HsgrFile {
    pub fn write(path: &Path, checksum: u64, graph: &QueryGraph) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, graph.edges_crc32(), path)?;
        write_u32(&mut w, graph.node_count() as u32, path)?;
        write_u64(&mut w, graph.edge_count() as u64, path)?;

        for node in 0..graph.node_count() as u32 {
            write_u32(&mut w, graph.adjacent_edges(node).start, path)?;
        }
        write_u32(&mut w, graph.edge_count() as u32, path)?;

        for edge in 0..graph.edge_count() as u32 {
            let data = graph.edge(edge);
            write_u32(&mut w, graph.target(edge), path)?;
            write_u32(&mut w, data.weight, path)?;
            write_u32(&mut w, data.duration, path)?;
            write_u32(&mut w, data.original_edges, path)?;
            write_u32(&mut w, data.payload, path)?;
            let flags = (data.shortcut as u8)
                | ((data.forward as u8) << 1)
                | ((data.backward as u8) << 2);
            write_u8(&mut w, flags, path)?;
        }

        let metric_count = match graph.filter(0) {
            Some(_) => {
                let mut count = 0;
                while graph.filter(count).is_some() {
                    count += 1;
                }
                count
            }
            None => 0,
        };
        write_u8(&mut w, metric_count as u8, path)?;
        for metric in 0..metric_count {
            for word in pack_bits(graph.filter(metric).expect("counted")) {
                write_u64(&mut w, word, path)?;
            }
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, QueryGraph)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let stored_crc = read_u32(&mut r, path)?;
        let node_count = read_u32(&mut r, path)? as usize;
        let edge_count = read_u64(&mut r, path)? as usize;
        if node_count == 0 {
            return Err(ErrorKind::BadInput(format!(
                "{}: empty query graph",
                path.display()
            )));
        }

        let mut node_offsets = Vec::with_capacity(node_count + 1);
        for _ in 0..=node_count {
            node_offsets.push(read_u32(&mut r, path)?);
        }

        let mut targets = Vec::with_capacity(edge_count);
        let mut edge_data = Vec::with_capacity(edge_count);
        for _ in 0..edge_count {
            let target = read_u32(&mut r, path)?;
            let weight = read_u32(&mut r, path)?;
            let duration = read_u32(&mut r, path)?;
            let original_edges = read_u32(&mut r, path)?;
            let payload = read_u32(&mut r, path)?;
            let flags = read_u8(&mut r, path)?;
            targets.push(target);
            edge_data.push(QueryEdgeData {
                weight,
                duration,
                original_edges,
                payload,
                shortcut: flags & 1 != 0,
                forward: flags & 2 != 0,
                backward: flags & 4 != 0,
            });
        }

        let metric_count = read_u8(&mut r, path)? as usize;
        let mut filters = Vec::with_capacity(metric_count);
        for _ in 0..metric_count {
            let mut words = Vec::with_capacity(edge_count.div_ceil(64));
            for _ in 0..edge_count.div_ceil(64) {
                words.push(read_u64(&mut r, path)?);
            }
            filters.push(unpack_bits(&words, edge_count));
        }

        let graph = QueryGraph::from_parts(node_offsets, targets, edge_data, filters);
        if graph.edges_crc32() != stored_crc {
            return Err(ErrorKind::IncompatibleDataset(format!(
                "{}: edge checksum mismatch",
                path.display()
            )));
        }
        Ok((fingerprint, graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::FinalEdge;
    use tempfile::tempdir;

    fn sample_graph() -> QueryGraph {
        let edges = vec![
            FinalEdge {
                source: 0,
                target: 1,
                data: QueryEdgeData {
                    weight: 10,
                    duration: 10,
                    original_edges: 1,
                    payload: 100,
                    shortcut: false,
                    forward: true,
                    backward: false,
                },
            },
            FinalEdge {
                source: 0,
                target: 2,
                data: QueryEdgeData {
                    weight: 30,
                    duration: 30,
                    original_edges: 2,
                    payload: 1,
                    shortcut: true,
                    forward: true,
                    backward: true,
                },
            },
        ];
        QueryGraph::new(3, edges, vec![vec![true, false]]).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.hsgr");
        let graph = sample_graph();
        HsgrFile::write(&path, 21, &graph).unwrap();
        let (fp, read) = HsgrFile::read(&path).unwrap();
        assert_eq!(fp.checksum, 21);
        assert_eq!(read.node_count(), 3);
        assert_eq!(read.edge_count(), 2);
        assert_eq!(read.edges_crc32(), graph.edges_crc32());
        assert_eq!(read.edge(1).payload, 1);
        assert!(read.passes_filter(0, 0));
        assert!(!read.passes_filter(1, 0));
    }

    #[test]
    fn test_corrupt_edges_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.hsgr");
        HsgrFile::write(&path, 21, &sample_graph()).unwrap();
        // flip one byte in the edge section
        let mut bytes = std::fs::read(&path).unwrap();
        let offset = 16 + 4 + 4 + 8 + 4 * 4 + 2;
        bytes[offset] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            HsgrFile::read(&path),
            Err(ErrorKind::IncompatibleDataset(_))
        ));
    }
}
