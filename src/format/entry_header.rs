//! Entry placement records of the header section.

use std::io::{Read, Write};

use super::reader::{read_len, read_u32, write_len, write_u32};
use super::{CompressionType, HeaderLayout, SizeTriple};
use crate::{Error, Result};

/// Physical placement of one entry in the data blob.
///
/// Equality is structural over all fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHeader {
    id: u32,
    offset: u64,
    compression: CompressionType,
    size: SizeTriple,
}

impl EntryHeader {
    /// Creates a header record.
    pub const fn new(id: u32, offset: u64, compression: CompressionType, size: SizeTriple) -> Self {
        Self {
            id,
            offset,
            compression,
            size,
        }
    }

    /// Returns the numeric id.
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Returns the byte offset of the payload in the data blob.
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the compression tag.
    pub const fn compression(&self) -> CompressionType {
        self.compression
    }

    /// Returns the stage lengths of the payload.
    pub const fn size(&self) -> SizeTriple {
        self.size
    }
}

fn read_field<R: Read>(r: &mut R) -> Result<u32> {
    read_u32(r).map_err(|e| Error::from_decode("header section", e))
}

/// Reads and writes fixed-size entry header records of one layout.
#[derive(Debug, Clone, Copy)]
pub struct EntryHeaderCodec {
    layout: HeaderLayout,
}

impl EntryHeaderCodec {
    /// Creates a codec for the given layout.
    pub const fn new(layout: HeaderLayout) -> Self {
        Self { layout }
    }

    /// Returns the size of one record in bytes.
    pub const fn record_size(&self) -> usize {
        match self.layout {
            HeaderLayout::M => 44,
            HeaderLayout::N => 40,
        }
    }

    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the section is truncated or a
    /// length is negative, and [`Error::UnsupportedCompression`] for an
    /// unknown compression tag.
    pub fn read<R: Read>(&self, r: &mut R) -> Result<EntryHeader> {
        match self.layout {
            HeaderLayout::M => {
                let reserved = read_field(r)?;
                if reserved != 0 {
                    log::debug!("entry header reserved field is {reserved:#x}");
                }
                let id = read_field(r)?;
                let compression = CompressionType::from_tag(read_field(r)?)?;
                let offset = read_len(r, "entry offset")?;
                let encoded = read_len(r, "encoded size")?;
                let compressed = read_len(r, "compressed size")?;
                let size = read_len(r, "size")?;
                Ok(EntryHeader::new(
                    id,
                    offset,
                    compression,
                    SizeTriple::new(encoded, compressed, size),
                ))
            }
            HeaderLayout::N => {
                let compression = CompressionType::from_tag(read_field(r)?)?;
                let id = read_field(r)?;
                let encoded = read_len(r, "encoded size")?;
                let compressed = read_len(r, "compressed size")?;
                let size = read_len(r, "size")?;
                let offset = read_len(r, "entry offset")?;
                Ok(EntryHeader::new(
                    id,
                    offset,
                    compression,
                    SizeTriple::new(encoded, compressed, size),
                ))
            }
        }
    }

    /// Writes one record.
    pub fn write<W: Write>(&self, w: &mut W, header: &EntryHeader) -> Result<()> {
        let size = header.size();
        match self.layout {
            HeaderLayout::M => {
                write_u32(w, 0)?;
                write_u32(w, header.id())?;
                write_u32(w, header.compression().tag())?;
                write_len(w, header.offset(), "entry offset")?;
                write_len(w, size.encoded(), "encoded size")?;
                write_len(w, size.compressed(), "compressed size")?;
                write_len(w, size.size(), "size")?;
            }
            HeaderLayout::N => {
                write_u32(w, header.compression().tag())?;
                write_u32(w, header.id())?;
                write_len(w, size.encoded(), "encoded size")?;
                write_len(w, size.compressed(), "compressed size")?;
                write_len(w, size.size(), "size")?;
                write_len(w, header.offset(), "entry offset")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> EntryHeader {
        EntryHeader::new(
            17,
            4096,
            CompressionType::Zlib,
            SizeTriple::new(48, 37, 120),
        )
    }

    #[test]
    fn test_record_sizes() {
        for layout in [HeaderLayout::M, HeaderLayout::N] {
            let codec = EntryHeaderCodec::new(layout);
            let mut buf = Vec::new();
            codec.write(&mut buf, &sample()).unwrap();
            assert_eq!(buf.len(), codec.record_size());
            assert_eq!(codec.read(&mut Cursor::new(&buf)).unwrap(), sample());
        }
    }

    #[test]
    fn test_layout_m_field_order() {
        let mut buf = Vec::new();
        EntryHeaderCodec::new(HeaderLayout::M)
            .write(&mut buf, &sample())
            .unwrap();
        assert_eq!(&buf[0..4], &0u32.to_le_bytes());
        assert_eq!(&buf[4..8], &17u32.to_le_bytes());
        assert_eq!(&buf[8..12], &0xEE00_0009u32.to_le_bytes());
        assert_eq!(&buf[12..20], &4096i64.to_le_bytes());
        assert_eq!(&buf[36..44], &120i64.to_le_bytes());
    }

    #[test]
    fn test_layout_n_field_order() {
        let mut buf = Vec::new();
        EntryHeaderCodec::new(HeaderLayout::N)
            .write(&mut buf, &sample())
            .unwrap();
        assert_eq!(&buf[0..4], &0xEE00_0009u32.to_le_bytes());
        assert_eq!(&buf[4..8], &17u32.to_le_bytes());
        assert_eq!(&buf[8..16], &48i64.to_le_bytes());
        assert_eq!(&buf[32..40], &4096i64.to_le_bytes());
    }

    #[test]
    fn test_truncated_record() {
        let mut buf = Vec::new();
        let codec = EntryHeaderCodec::new(HeaderLayout::N);
        codec.write(&mut buf, &sample()).unwrap();
        buf.truncate(30);
        assert!(codec.read(&mut Cursor::new(&buf)).unwrap_err().is_corruption());
    }

    #[test]
    fn test_unknown_compression_tag() {
        let mut buf = Vec::new();
        let codec = EntryHeaderCodec::new(HeaderLayout::N);
        codec.write(&mut buf, &sample()).unwrap();
        buf[0..4].copy_from_slice(&0x55u32.to_le_bytes());
        assert!(matches!(
            codec.read(&mut Cursor::new(&buf)),
            Err(Error::UnsupportedCompression { tag: 0x55 })
        ));
    }
}
