//! Low-level little-endian field helpers for MS2 header parsing.

use std::io::{self, Read, Write};

use crate::{Error, Result};

/// Reads a little-endian u32.
///
/// # Errors
///
/// Returns an error if the reader encounters EOF or an I/O error.
pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads a little-endian i64.
pub fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Reads a little-endian i64 that must not be negative.
///
/// Sizes, offsets, and counts are stored signed on disk but are never
/// negative in a valid archive.
pub fn read_len<R: Read>(r: &mut R, field: &str) -> Result<u64> {
    let value = read_i64(r).map_err(|e| Error::from_decode(field, e))?;
    u64::try_from(value).map_err(|_| Error::corrupt(format!("negative {field}: {value}")))
}

/// Writes a little-endian u32.
pub fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

/// Writes a length as a little-endian i64.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the value does not fit in an i64.
pub fn write_len<W: Write>(w: &mut W, value: u64, field: &str) -> Result<()> {
    let value = i64::try_from(value)
        .map_err(|_| Error::InvalidFormat(format!("{field} {value} exceeds i64 range")))?;
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}
