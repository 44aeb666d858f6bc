//! On-disk artifacts
//!
//! One module per dataset file. Every file starts with the 16-byte
//! fingerprint of `fingerprint.rs`; all numeric fields are little-endian;
//! readers refuse fingerprints with a mismatched major version.

pub mod corelevel;
pub mod datasource;
pub mod edges;
pub mod fingerprint;
pub mod geometry;
pub mod hsgr;
pub mod names;
pub mod nodes;
pub mod rtree;
pub mod timestamp;

pub use fingerprint::Fingerprint;

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};

pub(crate) fn io_err(path: &Path, source: std::io::Error) -> ErrorKind {
    ErrorKind::io(path, source)
}

pub(crate) fn write_u8<W: Write>(w: &mut W, v: u8, path: &Path) -> Result<()> {
    w.write_all(&[v]).map_err(|e| io_err(path, e))
}

pub(crate) fn write_u32<W: Write>(w: &mut W, v: u32, path: &Path) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(|e| io_err(path, e))
}

pub(crate) fn write_u64<W: Write>(w: &mut W, v: u64, path: &Path) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(|e| io_err(path, e))
}

pub(crate) fn write_i32<W: Write>(w: &mut W, v: i32, path: &Path) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(|e| io_err(path, e))
}

pub(crate) fn write_i64<W: Write>(w: &mut W, v: i64, path: &Path) -> Result<()> {
    w.write_all(&v.to_le_bytes()).map_err(|e| io_err(path, e))
}

pub(crate) fn read_u8<R: Read>(r: &mut R, path: &Path) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(r: &mut R, path: &Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, path: &Path) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_i32<R: Read>(r: &mut R, path: &Path) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_i64<R: Read>(r: &mut R, path: &Path) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
    Ok(i64::from_le_bytes(buf))
}

/// Bit-pack a bool slice into u64 words, low bit first.
pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u64> {
    let mut words = vec![0u64; bits.len().div_ceil(64)];
    for (i, &b) in bits.iter().enumerate() {
        if b {
            words[i / 64] |= 1u64 << (i % 64);
        }
    }
    words
}

pub(crate) fn unpack_bits(words: &[u64], len: usize) -> Vec<bool> {
    (0..len).map(|i| words[i / 64] & (1u64 << (i % 64)) != 0).collect()
}
