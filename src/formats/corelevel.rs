//! `.core` and `.level` - per-node core flag and contraction level

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;

use super::{io_err, pack_bits, read_u32, read_u64, unpack_bits, write_u32, write_u64, Fingerprint};

pub struct CoreFile;

impl CoreFile {
    pub fn write(path: &Path, checksum: u64, is_core: &[bool]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, is_core.len() as u32, path)?;
        for word in pack_bits(is_core) {
            write_u64(&mut w, word, path)?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<bool>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        let mut words = Vec::with_capacity(count.div_ceil(64));
        for _ in 0..count.div_ceil(64) {
            words.push(read_u64(&mut r, path)?);
        }
        Ok((fingerprint, unpack_bits(&words, count)))
    }
}

pub struct LevelFile;

impl LevelFile {
    pub fn write(path: &Path, checksum: u64, levels: &[u32]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, levels.len() as u32, path)?;
        for &level in levels {
            write_u32(&mut w, level, path)?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<u32>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        let mut levels = Vec::with_capacity(count);
        for _ in 0..count {
            levels.push(read_u32(&mut r, path)?);
        }
        Ok((fingerprint, levels))
    }
}
