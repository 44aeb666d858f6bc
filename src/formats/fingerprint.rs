//! 16-byte dataset fingerprint
//!
//! Layout: 4-byte magic `OSRM`, major/minor/patch as one byte each, one
//! reserved zero byte, then an 8-byte dataset checksum. All files of one
//! dataset carry the same checksum; readers refuse a mismatched major.

use std::io::{Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};

use super::io_err;

pub const MAGIC: [u8; 4] = *b"OSRM";
pub const MAJOR: u8 = 0;
pub const MINOR: u8 = 3;
pub const PATCH: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub checksum: u64,
}

impl Fingerprint {
    pub fn current(checksum: u64) -> Self {
        Self {
            major: MAJOR,
            minor: MINOR,
            patch: PATCH,
            checksum,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W, path: &Path) -> Result<()> {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4] = self.major;
        buf[5] = self.minor;
        buf[6] = self.patch;
        buf[7] = 0;
        buf[8..16].copy_from_slice(&self.checksum.to_le_bytes());
        w.write_all(&buf).map_err(|e| io_err(path, e))
    }

    /// Read and validate: magic must match, the major version must equal
    /// ours. Minor/patch drift is tolerated.
    pub fn read<R: Read>(r: &mut R, path: &Path) -> Result<Fingerprint> {
        let mut buf = [0u8; 16];
        r.read_exact(&mut buf).map_err(|e| io_err(path, e))?;
        if buf[0..4] != MAGIC {
            return Err(ErrorKind::IncompatibleDataset(format!(
                "{} does not carry the OSRM magic",
                path.display()
            )));
        }
        let fingerprint = Fingerprint {
            major: buf[4],
            minor: buf[5],
            patch: buf[6],
            checksum: u64::from_le_bytes(buf[8..16].try_into().expect("8 bytes")),
        };
        if fingerprint.major != MAJOR {
            return Err(ErrorKind::IncompatibleDataset(format!(
                "{}: major version {} does not match {}",
                path.display(),
                fingerprint.major,
                MAJOR
            )));
        }
        Ok(fingerprint)
    }
}
