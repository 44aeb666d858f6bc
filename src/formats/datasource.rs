//! `.datasource_names` and `.datasource_indexes` - CSV override
//! provenance: the list of source names (index 0 is the profile) and the
//! per-geometry-segment source id

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::graph::DatasourceId;

use super::{io_err, read_u32, read_u64, write_u32, write_u64, Fingerprint};

pub struct DatasourceNamesFile;

impl DatasourceNamesFile {
    pub fn write(path: &Path, checksum: u64, names: &[String]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, names.len() as u32, path)?;
        let mut offset = 0u32;
        for name in names {
            write_u32(&mut w, offset, path)?;
            offset += name.len() as u32;
        }
        write_u32(&mut w, offset, path)?;
        for name in names {
            w.write_all(name.as_bytes()).map_err(|e| io_err(path, e))?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<String>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        let mut offsets = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            offsets.push(read_u32(&mut r, path)?);
        }
        let total = *offsets.last().unwrap_or(&0) as usize;
        let mut bytes = vec![0u8; total];
        r.read_exact(&mut bytes).map_err(|e| io_err(path, e))?;
        let mut names = Vec::with_capacity(count);
        for pair in offsets.windows(2) {
            let name = std::str::from_utf8(&bytes[pair[0] as usize..pair[1] as usize])
                .map_err(|_| {
                    ErrorKind::BadInput(format!(
                        "{}: datasource name is not utf-8",
                        path.display()
                    ))
                })?;
            names.push(name.to_string());
        }
        Ok((fingerprint, names))
    }
}

pub struct DatasourceIndexesFile;

impl DatasourceIndexesFile {
    pub fn write(path: &Path, checksum: u64, indexes: &[DatasourceId]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u64(&mut w, indexes.len() as u64, path)?;
        w.write_all(indexes).map_err(|e| io_err(path, e))
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<DatasourceId>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u64(&mut r, path)? as usize;
        let mut indexes = vec![0u8; count];
        r.read_exact(&mut indexes).map_err(|e| io_err(path, e))?;
        Ok((fingerprint, indexes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_names_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.datasource_names");
        let names = vec!["lua profile".to_string(), "speeds.csv".to_string()];
        DatasourceNamesFile::write(&path, 2, &names).unwrap();
        let (_, read) = DatasourceNamesFile::read(&path).unwrap();
        assert_eq!(read, names);
    }

    #[test]
    fn test_indexes_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.datasource_indexes");
        let indexes = vec![0u8, 0, 1, 2, 0, 1];
        DatasourceIndexesFile::write(&path, 2, &indexes).unwrap();
        let (_, read) = DatasourceIndexesFile::read(&path).unwrap();
        assert_eq!(read, indexes);
    }
}
