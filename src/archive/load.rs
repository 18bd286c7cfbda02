//! Reading an archive pair into entries.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use crate::blob::MappedBlob;
use crate::crypto::CryptoRepository;
use crate::entry::Entry;
use crate::format::reader::read_u32;
use crate::format::{ArchiveHeader, CryptoMode, MODE_TAG_SIZE};
use crate::{Error, Result};

/// Everything a successful load produces.
pub(crate) struct LoadedPair {
    pub blob: Arc<MappedBlob>,
    pub header: ArchiveHeader,
    pub entries: Vec<Entry>,
}

/// Reads the mode tag at the start of a header file.
pub(crate) fn read_mode_tag(header_path: &Path) -> Result<u32> {
    let mut file = File::open(header_path)?;
    if file.metadata()?.len() < MODE_TAG_SIZE as u64 {
        return Err(Error::corrupt(format!(
            "header file {} is too small",
            header_path.display()
        )));
    }
    read_u32(&mut file).map_err(|e| Error::from_decode("mode tag", e))
}

/// Reads exactly `len` bytes of an encrypted section.
fn read_section<R: Read>(reader: &mut R, len: u64, what: &str) -> Result<Vec<u8>> {
    let mut section = Vec::new();
    let read = reader.take(len).read_to_end(&mut section)?;
    if (read as u64) < len {
        return Err(Error::corrupt(format!(
            "{what} holds {read} of {len} bytes"
        )));
    }
    Ok(section)
}

/// Parses a header file and binds its entries to the mapped data file.
pub(crate) fn load_pair(
    repository: &Arc<CryptoRepository>,
    header_path: &Path,
    data_path: &Path,
) -> Result<LoadedPair> {
    let blob = Arc::new(MappedBlob::open(&File::open(data_path)?, data_path)?);
    let mut reader = BufReader::new(File::open(header_path)?);

    let tag = read_u32(&mut reader).map_err(|e| Error::from_decode("mode tag", e))?;
    let found = CryptoMode::from_tag(tag).ok_or(Error::UnknownCryptoMode { tag })?;
    if found != repository.mode() {
        return Err(Error::CryptoModeMismatch {
            expected: repository.mode(),
            found,
        });
    }

    let header = repository.archive_header_codec().read(&mut reader)?;
    log::debug!(
        "{found} archive: {} entries, info {}, header {}",
        header.entry_count,
        header.info_size,
        header.header_size
    );

    let info_section = read_section(&mut reader, header.info_size.encoded(), "info section")?;
    let header_section =
        read_section(&mut reader, header.header_size.encoded(), "header section")?;

    let mut infos = BufReader::new(repository.decrypt(&info_section[..], header.info_size, true)?);
    let mut records = repository.decrypt(&header_section[..], header.header_size, true)?;

    let info_codec = repository.entry_info_codec();
    let header_codec = repository.entry_header_codec();
    let capacity = usize::try_from(header.entry_count).unwrap_or(0).min(1 << 16);
    let mut entries = Vec::with_capacity(capacity);
    for _ in 0..header.entry_count {
        let info = info_codec.read(&mut infos)?;
        let record = header_codec.read(&mut records)?;
        log::trace!(
            "entry {} '{}' at {} ({})",
            record.id(),
            info.path(),
            record.offset(),
            record.size()
        );
        entries.push(Entry::mapped(
            Arc::clone(repository),
            info,
            record,
            Arc::clone(&blob),
        ));
    }

    Ok(LoadedPair {
        blob,
        header,
        entries,
    })
}
