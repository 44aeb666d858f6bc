//! `.ramIndex` / `.fileIndex` - spatial index persistence
//!
//! The leaf segment records live in `.fileIndex`; `.ramIndex` holds the
//! summary the loader checks before rebuilding the tree (bulk load is
//! cheap compared to a tree-page format and keeps the reader trivial).

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::geo::FixedLatLon;
use crate::spatial::SegmentRecord;

use super::{io_err, read_i32, read_u32, read_u8, write_i32, write_u32, write_u8, Fingerprint};

pub struct RamIndexFile;

impl RamIndexFile {
    pub fn write(path: &Path, checksum: u64, record_count: usize) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, record_count as u32, path)
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, usize)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        Ok((fingerprint, count))
    }
}

pub struct FileIndexFile;

impl FileIndexFile {
    pub fn write(path: &Path, checksum: u64, records: &[SegmentRecord]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, records.len() as u32, path)?;
        for record in records {
            write_i32(&mut w, record.a.lat, path)?;
            write_i32(&mut w, record.a.lon, path)?;
            write_i32(&mut w, record.b.lat, path)?;
            write_i32(&mut w, record.b.lon, path)?;
            write_u32(&mut w, record.forward_node, path)?;
            write_u32(&mut w, record.reverse_node, path)?;
            write_u32(&mut w, record.geometry_id, path)?;
            write_u32(&mut w, record.segment_index, path)?;
            write_u32(&mut w, record.name_id, path)?;
            write_u8(&mut w, record.small_component as u8, path)?;
        }
        Ok(())
    }

    pub fn read(path: &Path, expected_count: usize) -> Result<(Fingerprint, Vec<SegmentRecord>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        if count != expected_count {
            return Err(ErrorKind::IncompatibleDataset(format!(
                "{}: leaf count {} does not match index summary {}",
                path.display(),
                count,
                expected_count
            )));
        }
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let a = FixedLatLon::new(read_i32(&mut r, path)?, read_i32(&mut r, path)?);
            let b = FixedLatLon::new(read_i32(&mut r, path)?, read_i32(&mut r, path)?);
            records.push(SegmentRecord {
                a,
                b,
                forward_node: read_u32(&mut r, path)?,
                reverse_node: read_u32(&mut r, path)?,
                geometry_id: read_u32(&mut r, path)?,
                segment_index: read_u32(&mut r, path)?,
                name_id: read_u32(&mut r, path)?,
                small_component: read_u8(&mut r, path)? != 0,
            });
        }
        Ok((fingerprint, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record() -> SegmentRecord {
        SegmentRecord {
            a: FixedLatLon::from_degrees(50.0, 4.0),
            b: FixedLatLon::from_degrees(50.0, 4.01),
            forward_node: 3,
            reverse_node: 4,
            geometry_id: 2,
            segment_index: 0,
            name_id: 5,
            small_component: true,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let ram = dir.path().join("test.ramIndex");
        let file = dir.path().join("test.fileIndex");
        let records = vec![record()];
        RamIndexFile::write(&ram, 4, records.len()).unwrap();
        FileIndexFile::write(&file, 4, &records).unwrap();
        let (_, count) = RamIndexFile::read(&ram).unwrap();
        let (_, read) = FileIndexFile::read(&file, count).unwrap();
        assert_eq!(read, records);
    }

    #[test]
    fn test_count_mismatch_detected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.fileIndex");
        FileIndexFile::write(&file, 4, &[record()]).unwrap();
        assert!(matches!(
            FileIndexFile::read(&file, 2),
            Err(ErrorKind::IncompatibleDataset(_))
        ));
    }
}
