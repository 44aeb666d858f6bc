//! `.nodes` - external id to coordinate map, in internal-id order

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{ErrorKind, Result};
use crate::geo::FixedLatLon;

use super::{io_err, read_i32, read_i64, read_u32, write_i32, write_i64, write_u32, Fingerprint};

pub struct NodesFile;

impl NodesFile {
    pub fn write(
        path: &Path,
        checksum: u64,
        external_ids: &[i64],
        coordinates: &[FixedLatLon],
    ) -> Result<()> {
        debug_assert_eq!(external_ids.len(), coordinates.len());
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, external_ids.len() as u32, path)?;
        for (external, coordinate) in external_ids.iter().zip(coordinates) {
            write_i64(&mut w, *external, path)?;
            write_i32(&mut w, coordinate.lat, path)?;
            write_i32(&mut w, coordinate.lon, path)?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<i64>, Vec<FixedLatLon>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        if count == 0 {
            return Err(ErrorKind::BadInput(format!(
                "{}: empty node section",
                path.display()
            )));
        }
        let mut external_ids = Vec::with_capacity(count);
        let mut coordinates = Vec::with_capacity(count);
        for _ in 0..count {
            external_ids.push(read_i64(&mut r, path)?);
            let lat = read_i32(&mut r, path)?;
            let lon = read_i32(&mut r, path)?;
            coordinates.push(FixedLatLon::new(lat, lon));
        }
        Ok((fingerprint, external_ids, coordinates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.nodes");
        let ids = vec![42i64, 99, -7];
        let coords = vec![
            FixedLatLon::from_degrees(50.0, 4.0),
            FixedLatLon::from_degrees(51.0, 5.0),
            FixedLatLon::from_degrees(-33.9, 18.4),
        ];
        NodesFile::write(&path, 7, &ids, &coords).unwrap();
        let (fp, read_ids, read_coords) = NodesFile::read(&path).unwrap();
        assert_eq!(fp.checksum, 7);
        assert_eq!(read_ids, ids);
        assert_eq!(read_coords, coords);
    }

    #[test]
    fn test_empty_section_is_bad_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.nodes");
        NodesFile::write(&path, 7, &[], &[]).unwrap();
        assert!(matches!(
            NodesFile::read(&path),
            Err(ErrorKind::BadInput(_))
        ));
    }
}
