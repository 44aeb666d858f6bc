//! `.names` - street name string table: offsets, then packed bytes

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};

use super::{io_err, read_u32, write_u32, Fingerprint};

pub struct NamesFile;

impl NamesFile {
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
            let (start, end) = (pair[0] as usize, pair[1] as usize);
            if start > end || end > bytes.len() {
                return Err(ErrorKind::BadInput(format!(
                    "{}: corrupt name offsets",
                    path.display()
                )));
            }
            let name = std::str::from_utf8(&bytes[start..end]).map_err(|_| {
                ErrorKind::BadInput(format!("{}: name is not utf-8", path.display()))
            })?;
            names.push(name.to_string());
        }
        Ok((fingerprint, names))
    }
}
