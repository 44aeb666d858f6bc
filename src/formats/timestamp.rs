//! `.timestamp` - freeform ASCII dataset stamp, at most 25 characters

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{ErrorKind, Result};

use super::{io_err, Fingerprint};

pub const MAX_TIMESTAMP_LEN: usize = 25;

pub struct TimestampFile;

impl TimestampFile {
    /// Writes at most `MAX_TIMESTAMP_LEN` ASCII bytes; longer input is
    /// truncated, non-ASCII is rejected.
    pub fn write(path: &Path, checksum: u64, timestamp: &str) -> Result<()> {
        if !timestamp.is_ascii() {
            return Err(ErrorKind::BadInput(
                "timestamp must be ascii".to_string(),
            ));
        }
        let truncated = &timestamp[..timestamp.len().min(MAX_TIMESTAMP_LEN)];
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        w.write_all(truncated.as_bytes())
            .map_err(|e| io_err(path, e))
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, String)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes).map_err(|e| io_err(path, e))?;
        if bytes.len() > MAX_TIMESTAMP_LEN || !bytes.is_ascii() {
            return Err(ErrorKind::BadInput(format!(
                "{}: malformed timestamp",
                path.display()
            )));
        }
        Ok((
            fingerprint,
            String::from_utf8(bytes).expect("ascii is utf-8"),
        ))
    }
}
