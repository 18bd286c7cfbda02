//! MS2 format constants, value types, and header codecs.
//!
//! An archive is a pair of files:
//!
//! ```text
//! header file (.m2h)
//! +----------+------------------------+--------------------+----------------------+
//! | u32 tag  | mode archive header    | encrypted info     | encrypted header     |
//! |          | (sizes + entry count)  | section (lines)    | section (records)    |
//! +----------+------------------------+--------------------+----------------------+
//!
//! data file (.m2d)
//! +-----------------+-----------------+-----+
//! | entry 0 payload | entry 1 payload | ... |
//! +-----------------+-----------------+-----+
//! ```
//!
//! The tag selects a [`CryptoMode`], which in turn selects the binary layout
//! used for the archive header and the per-entry header records.

pub mod archive_header;
pub mod entry_header;
pub mod entry_info;
pub(crate) mod reader;
pub mod size;

use std::fmt;

use crate::{Error, Result};

pub use archive_header::{ArchiveHeader, ArchiveHeaderCodec};
pub use entry_header::{EntryHeader, EntryHeaderCodec};
pub use entry_info::{EntryInfo, EntryInfoCodec, derive_root_folder_id};
pub use size::SizeTriple;

/// Size of the mode tag at the start of every header file.
pub const MODE_TAG_SIZE: usize = 4;

/// The crypto/format mode of an archive, identified by its 4-byte tag.
///
/// Each mode owns its own key and IV banks and a header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CryptoMode {
    /// `MS2F`, the first layout.
    Ms2f,
    /// `NS2F`.
    Ns2f,
    /// `OS2F`.
    Os2f,
    /// `PS2F`.
    Ps2f,
}

impl CryptoMode {
    /// All known modes.
    pub const ALL: [CryptoMode; 4] = [
        CryptoMode::Ms2f,
        CryptoMode::Ns2f,
        CryptoMode::Os2f,
        CryptoMode::Ps2f,
    ];

    /// Returns the tag as stored (little-endian u32 of the ASCII name).
    pub const fn tag(self) -> u32 {
        let name = self.name().as_bytes();
        u32::from_le_bytes([name[0], name[1], name[2], name[3]])
    }

    /// Returns the four-letter name of the mode.
    pub const fn name(self) -> &'static str {
        match self {
            CryptoMode::Ms2f => "MS2F",
            CryptoMode::Ns2f => "NS2F",
            CryptoMode::Os2f => "OS2F",
            CryptoMode::Ps2f => "PS2F",
        }
    }

    /// Looks up a mode by its raw tag.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.tag() == tag)
    }

    /// Returns the binary layout of this mode's headers.
    pub const fn layout(self) -> HeaderLayout {
        match self {
            CryptoMode::Ms2f => HeaderLayout::M,
            CryptoMode::Ns2f | CryptoMode::Os2f | CryptoMode::Ps2f => HeaderLayout::N,
        }
    }
}

impl fmt::Display for CryptoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Field order of the archive header and entry header records.
///
/// `M` is used by `MS2F`; every later mode shares `N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// Reserved word first, entry count inside the size block.
    M,
    /// Entry count first, offset at the end of each record.
    N,
}

/// Compression tag of one entry.
///
/// `Usm` and `Png` payloads are stored as-is; only `Zlib` entries go through
/// the compression stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionType {
    /// Stored without compression.
    #[default]
    None,
    /// Video container stored as-is.
    Usm,
    /// Image stored as-is.
    Png,
    /// zlib stream.
    Zlib,
}

impl CompressionType {
    /// Returns the raw tag written to entry header records.
    pub const fn tag(self) -> u32 {
        match self {
            CompressionType::None => 0,
            CompressionType::Usm => 1,
            CompressionType::Png => 2,
            CompressionType::Zlib => 0xEE00_0009,
        }
    }

    /// Parses a raw tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCompression`] for unknown tags.
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Usm),
            2 => Ok(CompressionType::Png),
            0xEE00_0009 => Ok(CompressionType::Zlib),
            _ => Err(Error::UnsupportedCompression { tag }),
        }
    }

    /// Returns `true` if payloads of this type pass through zlib.
    pub const fn is_zlib_compressed(self) -> bool {
        matches!(self, CompressionType::Zlib)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tags_are_ascii_le() {
        assert_eq!(CryptoMode::Ms2f.tag(), 0x4632_534D);
        assert_eq!(CryptoMode::Ns2f.tag(), 0x4632_534E);
        assert_eq!(CryptoMode::Os2f.tag(), 0x4632_534F);
        assert_eq!(CryptoMode::Ps2f.tag(), 0x4632_5350);
        assert_eq!(&CryptoMode::Ms2f.tag().to_le_bytes(), b"MS2F");
    }

    #[test]
    fn test_mode_from_tag() {
        for mode in CryptoMode::ALL {
            assert_eq!(CryptoMode::from_tag(mode.tag()), Some(mode));
        }
        assert_eq!(CryptoMode::from_tag(0), None);
        assert_eq!(CryptoMode::from_tag(u32::from_le_bytes(*b"XS2F")), None);
    }

    #[test]
    fn test_mode_layouts() {
        assert_eq!(CryptoMode::Ms2f.layout(), HeaderLayout::M);
        assert_eq!(CryptoMode::Ns2f.layout(), HeaderLayout::N);
        assert_eq!(CryptoMode::Ps2f.layout(), HeaderLayout::N);
    }

    #[test]
    fn test_compression_tags() {
        for ty in [
            CompressionType::None,
            CompressionType::Usm,
            CompressionType::Png,
            CompressionType::Zlib,
        ] {
            assert_eq!(CompressionType::from_tag(ty.tag()).unwrap(), ty);
        }
        assert!(matches!(
            CompressionType::from_tag(7),
            Err(Error::UnsupportedCompression { tag: 7 })
        ));
        assert!(CompressionType::Zlib.is_zlib_compressed());
        assert!(!CompressionType::Png.is_zlib_compressed());
    }
}
