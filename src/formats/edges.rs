//! `.edges` - per edge-based edge turn records: via node, name id, turn
//! instruction, and the target traversal's geometry handle

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::ebg::turns::TurnInstruction;
use crate::ebg::TurnAnnotation;
use crate::error::{ErrorKind, Result};
use crate::profile::TravelMode;

use super::{io_err, read_u32, read_u8, write_u32, write_u8, Fingerprint};

pub struct EdgesFile;

impl EdgesFile {
    pub fn write(path: &Path, checksum: u64, annotations: &[TurnAnnotation]) -> Result<()> {
        let mut w = BufWriter::new(File::create(path).map_err(|e| io_err(path, e))?);
        Fingerprint::current(checksum).write(&mut w, path)?;
        write_u32(&mut w, annotations.len() as u32, path)?;
        for a in annotations {
            write_u32(&mut w, a.via_node, path)?;
            write_u32(&mut w, a.name_id, path)?;
            write_u8(&mut w, a.instruction as u8, path)?;
            write_u32(&mut w, a.geometry_id, path)?;
            write_u8(&mut w, a.reversed as u8, path)?;
            write_u8(&mut w, a.travel_mode as u8, path)?;
        }
        Ok(())
    }

    pub fn read(path: &Path) -> Result<(Fingerprint, Vec<TurnAnnotation>)> {
        let mut r = BufReader::new(File::open(path).map_err(|e| io_err(path, e))?);
        let fingerprint = Fingerprint::read(&mut r, path)?;
        let count = read_u32(&mut r, path)? as usize;
        let mut annotations = Vec::with_capacity(count);
        for _ in 0..count {
            let via_node = read_u32(&mut r, path)?;
            let name_id = read_u32(&mut r, path)?;
            let instruction = read_u8(&mut r, path)?;
            let geometry_id = read_u32(&mut r, path)?;
            let reversed = read_u8(&mut r, path)? != 0;
            let travel_mode = read_u8(&mut r, path)?;
            annotations.push(TurnAnnotation {
                via_node,
                name_id,
                instruction: TurnInstruction::from_u8(instruction).ok_or_else(|| {
                    ErrorKind::BadInput(format!(
                        "{}: unknown turn instruction {instruction}",
                        path.display()
                    ))
                })?,
                geometry_id,
                reversed,
                travel_mode: TravelMode::from_u8(travel_mode).ok_or_else(|| {
                    ErrorKind::BadInput(format!(
                        "{}: unknown travel mode {travel_mode}",
                        path.display()
                    ))
                })?,
            });
        }
        Ok((fingerprint, annotations))
    }
}
