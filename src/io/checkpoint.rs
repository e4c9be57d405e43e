//! Checkpoint header for geometry restore.
//!
//! The adapter persists its full parameter tensors itself; what the training
//! loop needs at restore time is only the point count, so the geometry can
//! be re-created at the right size (with placeholder points) before the
//! checkpoint parameters are applied on top.
//!
//! Layout:
//! ```text
//! Header (32 bytes):
//!   - Magic: "GSEDIT\0\0" (8 bytes)
//!   - Version: u32 (4 bytes)
//!   - Num points: u64 (8 bytes)
//!   - Iteration: u64 (8 bytes)
//!   - Reserved: 4 bytes
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 8] = b"GSEDIT\0\0";
const VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a checkpoint file (bad magic)")]
    BadMagic,

    #[error("unsupported checkpoint version: {0}")]
    UnsupportedVersion(u32),
}

/// Restore metadata read ahead of the parameter payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointHeader {
    /// Point count of the persisted geometry tensors.
    pub num_points: u64,

    /// Global step the checkpoint was written at.
    pub iteration: u64,
}

/// Write the header at the current position of `w`.
pub fn write_header<W: Write>(w: &mut W, header: &CheckpointHeader) -> Result<(), CheckpointError> {
    w.write_all(MAGIC)?;
    w.write_u32::<LittleEndian>(VERSION)?;
    w.write_u64::<LittleEndian>(header.num_points)?;
    w.write_u64::<LittleEndian>(header.iteration)?;
    w.write_all(&[0u8; 4])?;
    Ok(())
}

/// Read and validate the header at the current position of `r`.
pub fn read_header<R: Read>(r: &mut R) -> Result<CheckpointHeader, CheckpointError> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(CheckpointError::BadMagic);
    }

    let version = r.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(CheckpointError::UnsupportedVersion(version));
    }

    let num_points = r.read_u64::<LittleEndian>()?;
    let iteration = r.read_u64::<LittleEndian>()?;
    let mut reserved = [0u8; 4];
    r.read_exact(&mut reserved)?;

    Ok(CheckpointHeader {
        num_points,
        iteration,
    })
}

/// Read just the header of a checkpoint file.
pub fn peek_header(path: &Path) -> Result<CheckpointHeader, CheckpointError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_header(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_round_trip() {
        let header = CheckpointHeader {
            num_points: 123_456,
            iteration: 9_000,
        };
        let mut buf = Vec::new();
        write_header(&mut buf, &header).unwrap();
        assert_eq!(buf.len(), 32);

        let read = read_header(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read, header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            &CheckpointHeader {
                num_points: 1,
                iteration: 0,
            },
        )
        .unwrap();
        buf[0] = b'X';
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, CheckpointError::BadMagic));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut buf = Vec::new();
        write_header(
            &mut buf,
            &CheckpointHeader {
                num_points: 1,
                iteration: 0,
            },
        )
        .unwrap();
        buf[8] = 99;
        let err = read_header(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, CheckpointError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_peek_header_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scene.ckpt");
        let header = CheckpointHeader {
            num_points: 42,
            iteration: 7,
        };
        {
            let mut file = File::create(&path).unwrap();
            write_header(&mut file, &header).unwrap();
            // Parameter payload follows the header; the peek must not care.
            file.write_all(&[0u8; 64]).unwrap();
        }
        assert_eq!(peek_header(&path).unwrap(), header);
    }
}
