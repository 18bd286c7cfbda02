//! The mode-specific block that follows the tag in a header file.

use std::io::{Read, Write};

use super::reader::{read_len, read_u32, write_len, write_u32};
use super::{HeaderLayout, SizeTriple};
use crate::{Error, Result};

/// Section sizes and entry count of one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Stage lengths of the encrypted info section.
    pub info_size: SizeTriple,
    /// Stage lengths of the encrypted header section.
    pub header_size: SizeTriple,
    /// Number of entries in both sections.
    pub entry_count: u64,
}

/// Reads and writes the archive header block of one layout.
///
/// The 4-byte mode tag is not part of this block; the archive reads and
/// writes it before delegating here.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveHeaderCodec {
    layout: HeaderLayout,
}

impl ArchiveHeaderCodec {
    /// Creates a codec for the given layout.
    pub const fn new(layout: HeaderLayout) -> Self {
        Self { layout }
    }

    /// Returns the size of the block in bytes.
    pub const fn encoded_len(&self) -> usize {
        match self.layout {
            HeaderLayout::M => 4 + 7 * 8,
            HeaderLayout::N => 4 + 6 * 8,
        }
    }

    /// Reads the block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the header file is truncated or a
    /// value is negative.
    pub fn read<R: Read>(&self, r: &mut R) -> Result<ArchiveHeader> {
        let first =
            read_u32(r).map_err(|e| Error::from_decode("archive header", e))?;

        let header_compressed = read_len(r, "header section compressed size")?;
        let header_encoded = read_len(r, "header section encoded size")?;
        let info_size = read_len(r, "info section size")?;
        let info_compressed = read_len(r, "info section compressed size")?;
        let info_encoded = read_len(r, "info section encoded size")?;

        let (entry_count, header_size) = match self.layout {
            HeaderLayout::M => {
                if first != 0 {
                    log::debug!("archive header reserved field is {first:#x}");
                }
                let count = read_len(r, "entry count")?;
                (count, read_len(r, "header section size")?)
            }
            HeaderLayout::N => (u64::from(first), read_len(r, "header section size")?),
        };

        Ok(ArchiveHeader {
            info_size: SizeTriple::new(info_encoded, info_compressed, info_size),
            header_size: SizeTriple::new(header_encoded, header_compressed, header_size),
            entry_count,
        })
    }

    /// Writes the block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the entry count does not fit the
    /// layout's count field.
    pub fn write<W: Write>(&self, w: &mut W, header: &ArchiveHeader) -> Result<()> {
        let first = match self.layout {
            HeaderLayout::M => 0,
            HeaderLayout::N => u32::try_from(header.entry_count).map_err(|_| {
                Error::InvalidFormat(format!(
                    "entry count {} does not fit this layout",
                    header.entry_count
                ))
            })?,
        };
        write_u32(w, first)?;

        write_len(w, header.header_size.compressed(), "header section compressed size")?;
        write_len(w, header.header_size.encoded(), "header section encoded size")?;
        write_len(w, header.info_size.size(), "info section size")?;
        write_len(w, header.info_size.compressed(), "info section compressed size")?;
        write_len(w, header.info_size.encoded(), "info section encoded size")?;
        if self.layout == HeaderLayout::M {
            write_len(w, header.entry_count, "entry count")?;
        }
        write_len(w, header.header_size.size(), "header section size")?;
        Ok(())
    }
}
