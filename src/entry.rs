//! Archive entries and their lazily decoded streams.
//!
//! An [`Entry`] pairs an [`EntryInfo`] with an [`EntryHeader`] and a handle
//! to where its bytes live. Nothing is decrypted until a stream is requested:
//!
//! - [`Entry::get_stream`] yields the decoded content.
//! - [`Entry::get_stream_for_archiving`] yields the on-disk form plus its
//!   [`SizeTriple`]. Entries loaded from an archive pass their stored bytes
//!   through untouched; entries holding decoded data are encoded on demand.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::blob::{DataView, MappedBlob, checked_range};
use crate::codec::ZlibOptions;
use crate::crypto::CryptoRepository;
use crate::format::{CompressionType, EntryHeader, EntryInfo, SizeTriple};
use crate::{Error, Result};

// Upper bound on buffers sized from recorded lengths before any byte is read.
const PREALLOC_LIMIT: u64 = 1 << 20;

fn prealloc(len: u64) -> Vec<u8> {
    Vec::with_capacity(len.min(PREALLOC_LIMIT) as usize)
}

trait SeekRead: Read + Seek + Send {}
impl<T: Read + Seek + Send> SeekRead for T {}

enum EntrySource {
    Mapped(Arc<MappedBlob>),
    Memory(Arc<[u8]>),
    Reader(Mutex<Box<dyn SeekRead>>),
}

/// One file inside an archive.
///
/// Entries are shared as `Arc<Entry>` between the archive index and callers.
/// After [`dispose`](Self::dispose) every stream request fails with
/// [`Error::Disposed`].
pub struct Entry {
    id: u64,
    info: EntryInfo,
    header: EntryHeader,
    repository: Arc<CryptoRepository>,
    is_data_encrypted: bool,
    source: RwLock<Option<EntrySource>>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("path", &self.info.path())
            .field("mode", &self.repository.mode())
            .field("size", &self.header.size())
            .field("is_data_encrypted", &self.is_data_encrypted)
            .field("is_disposed", &self.is_disposed())
            .finish()
    }
}

/// Resolves the numeric id of an info/header pair.
///
/// The textual info id wins when it parses; a disagreement with the header
/// record is logged and tolerated.
fn resolve_id(info: &EntryInfo, header: &EntryHeader) -> u64 {
    match info.id().trim().parse::<u64>() {
        Ok(id) => {
            if id != u64::from(header.id()) {
                log::warn!(
                    "entry '{}' has info id {id} but header id {}",
                    info.path(),
                    header.id()
                );
            }
            id
        }
        Err(_) => u64::from(header.id()),
    }
}

impl Entry {
    fn with_source(
        repository: Arc<CryptoRepository>,
        info: EntryInfo,
        header: EntryHeader,
        is_data_encrypted: bool,
        source: EntrySource,
    ) -> Self {
        Self {
            id: resolve_id(&info, &header),
            info,
            header,
            repository,
            is_data_encrypted,
            source: RwLock::new(Some(source)),
        }
    }

    /// Creates an entry backed by a range of a mapped data file.
    pub(crate) fn mapped(
        repository: Arc<CryptoRepository>,
        info: EntryInfo,
        header: EntryHeader,
        blob: Arc<MappedBlob>,
    ) -> Self {
        Self::with_source(repository, info, header, true, EntrySource::Mapped(blob))
    }

    /// Creates an entry from decoded bytes.
    ///
    /// The entry is encoded with `repository` when its archive is saved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the info id is not a number that
    /// fits a header record.
    pub fn from_bytes(
        repository: Arc<CryptoRepository>,
        info: EntryInfo,
        compression: CompressionType,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<Self> {
        let data = data.into();
        let id = info
            .id()
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::InvalidFormat(format!("entry id {:?} is not a u32", info.id())))?;
        let header = EntryHeader::new(
            id,
            0,
            compression,
            SizeTriple::uniform(data.len() as u64),
        );
        Ok(Self::with_source(
            repository,
            info,
            header,
            false,
            EntrySource::Memory(data),
        ))
    }

    /// Creates an entry over a seekable source.
    ///
    /// The bytes start at `header.offset()` and span `header.size().encoded()`
    /// bytes when `is_data_encrypted`, `header.size().size()` otherwise.
    pub fn from_reader<R: Read + Seek + Send + 'static>(
        repository: Arc<CryptoRepository>,
        info: EntryInfo,
        header: EntryHeader,
        reader: R,
        is_data_encrypted: bool,
    ) -> Self {
        Self::with_source(
            repository,
            info,
            header,
            is_data_encrypted,
            EntrySource::Reader(Mutex::new(Box::new(reader))),
        )
    }

    /// Returns the resolved numeric id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the entry path.
    pub fn name(&self) -> &str {
        self.info.path()
    }

    /// Returns the logical identity.
    pub fn info(&self) -> &EntryInfo {
        &self.info
    }

    /// Returns the placement record.
    pub fn header(&self) -> &EntryHeader {
        &self.header
    }

    /// Returns the compression tag.
    pub fn compression(&self) -> CompressionType {
        self.header.compression()
    }

    /// Returns the provider this entry is encoded with.
    pub fn repository(&self) -> &Arc<CryptoRepository> {
        &self.repository
    }

    /// Returns `true` if the stored bytes are in on-disk (encrypted) form.
    pub fn is_data_encrypted(&self) -> bool {
        self.is_data_encrypted
    }

    /// Returns `true` if the content passes through zlib.
    pub fn is_zlib_compressed(&self) -> bool {
        self.header.compression().is_zlib_compressed()
    }

    /// Releases the backing source. Later calls are no-ops.
    pub fn dispose(&self) {
        if self.source.write().take().is_some() {
            log::trace!("disposed entry {}", self.id);
        }
    }

    /// Returns `true` after [`dispose`](Self::dispose).
    pub fn is_disposed(&self) -> bool {
        self.source.read().is_none()
    }

    /// Returns the data file behind a pass-through entry.
    pub(crate) fn mapped_source(&self) -> Option<PathBuf> {
        match self.source.read().as_ref()? {
            EntrySource::Mapped(blob) => Some(blob.path().to_path_buf()),
            _ => None,
        }
    }

    fn stored_len(&self) -> u64 {
        if self.is_data_encrypted {
            self.header.size().encoded()
        } else {
            self.header.size().size()
        }
    }

    /// Returns the stored bytes of this entry.
    fn view(&self) -> Result<DataView> {
        let guard = self.source.read();
        let source = guard.as_ref().ok_or(Error::Disposed { resource: "entry" })?;
        let (offset, len) = (self.header.offset(), self.stored_len());

        match source {
            EntrySource::Mapped(blob) => Ok(DataView::Mapped {
                range: checked_range(offset, len, blob.len())?,
                blob: Arc::clone(blob),
            }),
            EntrySource::Memory(data) => Ok(DataView::Memory {
                range: checked_range(offset, len, data.len() as u64)?,
                data: Arc::clone(data),
            }),
            EntrySource::Reader(reader) => {
                let mut reader = reader.lock();
                reader.seek(SeekFrom::Start(offset))?;
                let mut bytes = prealloc(len);
                let read = (&mut **reader).take(len).read_to_end(&mut bytes)?;
                if (read as u64) < len {
                    return Err(Error::corrupt(format!(
                        "entry {} source holds {read} of {len} bytes at offset {offset}",
                        self.id
                    )));
                }
                Ok(DataView::Owned(bytes))
            }
        }
    }

    /// Returns a stream of the decoded content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after disposal and
    /// [`Error::CorruptArchive`] if the recorded range is outside the source.
    /// Decoding errors surface on read.
    pub fn get_stream(&self) -> Result<Box<dyn Read + Send>> {
        let view = self.view()?;
        if self.is_data_encrypted {
            self.repository
                .decrypt(Cursor::new(view), self.header.size(), self.is_zlib_compressed())
        } else {
            Ok(Box::new(Cursor::new(view)))
        }
    }

    /// Decodes the whole entry into memory.
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut out = prealloc(self.header.size().size());
        self.get_stream()?
            .read_to_end(&mut out)
            .map_err(|e| Error::from_decode(&format!("entry {}", self.id), e))?;
        Ok(out)
    }

    /// Returns the on-disk form of this entry and its stage lengths.
    ///
    /// Stored encrypted bytes are returned as-is with their recorded
    /// [`SizeTriple`]; decoded content is compressed (for zlib entries) and
    /// encrypted first.
    pub fn get_stream_for_archiving(&self) -> Result<(Box<dyn Read + Send>, SizeTriple)> {
        let (view, size) = self.archive_payload(ZlibOptions::default())?;
        Ok((Box::new(Cursor::new(view)), size))
    }

    pub(crate) fn archive_payload(&self, zlib: ZlibOptions) -> Result<(DataView, SizeTriple)> {
        let view = self.view()?;
        if self.is_data_encrypted {
            return Ok((view, self.header.size()));
        }
        let len = view.len() as u64;
        let (encoded, size) = self.repository.encrypt_with_options(
            Cursor::new(view),
            len,
            self.is_zlib_compressed(),
            zlib,
        )?;
        Ok((DataView::Owned(encoded.into_inner()), size))
    }
}
