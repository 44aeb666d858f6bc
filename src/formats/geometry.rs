//! `.geometry` - compressed geometry chains: a block-compressed range
//! table over chain lengths, then the packed node-id and forward/reverse
//! weight arrays. Segment datasource ids live in `.datasource_indexes`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::graph::compress::CompressedGeometryStore;
use crate::range_table::{RangeTable, BLOCK_SIZE};

use super::{io_err, read_u32, write_u32, Fingerprint};

pub struct GeometryFile;

impl GeometryFile {
    pub fn write(path: &Path, checksum: u64, store: &CompressedGeometryStore) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;

        let table = RangeTable::new(&store.chain_lengths());
        let (block_offsets, diff_blocks, sum_lengths, len) = table.into_parts();
        write_u32(&mut w, len as u32, path)?;
        write_u32(&mut w, block_offsets.len() as u32, path)?;
        for offset in &block_offsets {
            write_u32(&mut w, *offset, path)?;
        }
        for block in &diff_blocks {
            w.write_all(block).map_err(|e| io_err(path, e))?;
        }
        write_u32(&mut w, sum_lengths, path)?;

        let (_, nodes, forward, reverse, _) = store.parts();
        debug_assert_eq!(nodes.len() as u32, sum_lengths);
        for &node in nodes {
            write_u32(&mut w, node, path)?;
        }
        for &weight in forward {
            write_u32(&mut w, weight, path)?;
        }
        for &weight in reverse {
            write_u32(&mut w, weight, path)?;
        }
        Ok(())
    }

    /// Reads the store with datasource ids zeroed; the caller overlays
    /// `.datasource_indexes` afterwards.
    pub fn read(path: &Path) -> Result<(Fingerprint, CompressedGeometryStore)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;

        let len = read_u32(&mut r, path)? as usize;
        let n_blocks = read_u32(&mut r, path)? as usize;
        let mut block_offsets = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            block_offsets.push(read_u32(&mut r, path)?);
        }
        let mut diff_blocks = Vec::with_capacity(n_blocks);
        for _ in 0..n_blocks {
            let mut block = [0u8; BLOCK_SIZE];
            r.read_exact(&mut block).map_err(|e| io_err(path, e))?;
            diff_blocks.push(block);
        }
        let sum_lengths = read_u32(&mut r, path)?;
        let table = RangeTable::from_parts(block_offsets, diff_blocks, sum_lengths, len);

        let mut offsets = Vec::with_capacity(len + 1);
        for id in 0..len {
            offsets.push(table.range(id).start);
        }
        offsets.push(sum_lengths);
        if len == 0 {
            return Err(ErrorKind::BadInput(format!(
                "{}: empty geometry section",
                path.display()
            )));
        }

        let total = sum_lengths as usize;
        let mut nodes = Vec::with_capacity(total);
        for _ in 0..total {
            nodes.push(read_u32(&mut r, path)?);
        }
        let mut forward = Vec::with_capacity(total);
        for _ in 0..total {
            forward.push(read_u32(&mut r, path)?);
        }
        let mut reverse = Vec::with_capacity(total);
        for _ in 0..total {
            reverse.push(read_u32(&mut r, path)?);
        }

        Ok((
            fingerprint,
            CompressedGeometryStore::from_parts(offsets, nodes, forward, reverse, vec![0; total]),
        ))
    }
}
