//! Shared views over the data blob.

use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};

use crate::{Error, Result};

/// A read-only memory map of one data file.
///
/// Shared by every entry of a loaded archive; the mapping lives until the
/// last entry referencing it is dropped or disposed.
pub(crate) struct MappedBlob {
    // None for an empty file, which cannot be mapped.
    map: Option<Mmap>,
    path: PathBuf,
}

impl std::fmt::Debug for MappedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBlob")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

impl MappedBlob {
    /// Maps `file`, which was opened from `path`.
    pub(crate) fn open(file: &File, path: &Path) -> Result<Self> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if file.metadata()?.len() == 0 {
            return Ok(Self { map: None, path });
        }
        // The data file is opened read-only and not modified while mapped;
        // saves targeting the file behind any live blob are rejected.
        let map = unsafe { MmapOptions::new().map(file)? };
        Ok(Self {
            map: Some(map),
            path,
        })
    }

    /// Returns the canonical path of the mapped file.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    pub(crate) fn len(&self) -> u64 {
        self.bytes().len() as u64
    }
}

/// Converts `[offset, offset + len)` to an in-bounds index range.
pub(crate) fn checked_range(offset: u64, len: u64, available: u64) -> Result<Range<usize>> {
    let end = offset
        .checked_add(len)
        .filter(|&end| end <= available)
        .ok_or_else(|| {
            Error::corrupt(format!(
                "range {offset}+{len} exceeds the {available}-byte data blob"
            ))
        })?;
    let start = usize::try_from(offset).map_err(|_| Error::corrupt("offset exceeds address space"))?;
    let end = usize::try_from(end).map_err(|_| Error::corrupt("range exceeds address space"))?;
    Ok(start..end)
}

/// Bytes of one entry as stored, without copying shared backings.
#[derive(Debug, Clone)]
pub(crate) enum DataView {
    /// A range of a mapped data file.
    Mapped {
        blob: Arc<MappedBlob>,
        range: Range<usize>,
    },
    /// A range of a shared buffer.
    Memory {
        data: Arc<[u8]>,
        range: Range<usize>,
    },
    /// Bytes read or produced for this view alone.
    Owned(Vec<u8>),
}

impl DataView {
    pub(crate) fn len(&self) -> usize {
        self.as_ref().len()
    }

    /// Copies a mapped range into memory, detaching it from the data file.
    pub(crate) fn into_owned(self) -> DataView {
        match self {
            DataView::Mapped { blob, range } => DataView::Owned(blob.bytes()[range].to_vec()),
            other => other,
        }
    }
}

impl AsRef<[u8]> for DataView {
    fn as_ref(&self) -> &[u8] {
        match self {
            DataView::Mapped { blob, range } => &blob.bytes()[range.clone()],
            DataView::Memory { data, range } => &data[range.clone()],
            DataView::Owned(bytes) => bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_checked_range() {
        assert_eq!(checked_range(4, 8, 12).unwrap(), 4..12);
        assert!(checked_range(4, 9, 12).unwrap_err().is_corruption());
        assert!(checked_range(u64::MAX, 2, u64::MAX).unwrap_err().is_corruption());
        assert_eq!(checked_range(0, 0, 0).unwrap(), 0..0);
    }

    #[test]
    fn test_mapped_view() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();
        let blob = Arc::new(MappedBlob::open(&file, Path::new("digits.m2d")).unwrap());
        assert_eq!(blob.len(), 10);

        let view = DataView::Mapped {
            blob,
            range: checked_range(3, 4, 10).unwrap(),
        };
        let mut out = Vec::new();
        std::io::Cursor::new(view).read_to_end(&mut out).unwrap();
        assert_eq!(out, b"3456");
    }

    #[test]
    fn test_into_owned_detaches_from_map() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        let blob = Arc::new(MappedBlob::open(file.as_file(), file.path()).unwrap());
        assert_eq!(blob.path(), file.path().canonicalize().unwrap());

        let view = DataView::Mapped {
            blob: Arc::clone(&blob),
            range: 2..5,
        }
        .into_owned();
        drop(blob);
        assert!(matches!(view, DataView::Owned(_)));
        assert_eq!(view.as_ref(), b"234");

        let memory = DataView::Memory {
            data: Arc::from(&b"xyz"[..]),
            range: 0..2,
        }
        .into_owned();
        assert!(matches!(memory, DataView::Memory { .. }));
    }

    #[test]
    fn test_empty_file_is_not_mapped() {
        let file = tempfile::tempfile().unwrap();
        let blob = MappedBlob::open(&file, Path::new("empty.m2d")).unwrap();
        assert_eq!(blob.len(), 0);
        assert!(blob.bytes().is_empty());
    }

    #[test]
    fn test_memory_view() {
        let data: Arc<[u8]> = Arc::from(&b"abcdef"[..]);
        let view = DataView::Memory { data, range: 1..3 };
        assert_eq!(view.as_ref(), b"bc");
        assert_eq!(view.len(), 2);
    }
}
