//! Writing entries out as an archive pair.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use memmap2::MmapOptions;
use rayon::prelude::*;

use crate::blob::DataView;
use crate::codec::ZlibOptions;
use crate::crypto::CryptoRepository;
use crate::entry::Entry;
use crate::format::reader::write_u32;
use crate::format::{ArchiveHeader, EntryHeader, SizeTriple};
use crate::{Error, Result};

/// Accumulates the info and header sections while assigning offsets.
///
/// Offsets are cumulative, so entries must be pushed in archive order.
pub(crate) struct SectionBuilder<'a> {
    repository: &'a CryptoRepository,
    info: Vec<u8>,
    records: Vec<u8>,
    offset: u64,
    count: u64,
}

impl<'a> SectionBuilder<'a> {
    pub(crate) fn new(repository: &'a CryptoRepository) -> Self {
        Self {
            repository,
            info: Vec::new(),
            records: Vec::new(),
            offset: 0,
            count: 0,
        }
    }

    /// Records one entry at the current offset and returns that offset.
    pub(crate) fn push(&mut self, entry: &Entry, size: SizeTriple) -> Result<u64> {
        let offset = self.offset;
        let record = EntryHeader::new(entry.header().id(), offset, entry.compression(), size);
        self.repository
            .entry_info_codec()
            .write(&mut self.info, entry.info())?;
        self.repository
            .entry_header_codec()
            .write(&mut self.records, &record)?;
        log::trace!("entry {} placed at {offset} ({size})", entry.id());

        self.offset = offset
            .checked_add(size.encoded())
            .ok_or_else(|| Error::InvalidFormat("data file exceeds u64 range".into()))?;
        self.count += 1;
        Ok(offset)
    }

    /// Returns the data file length so far.
    pub(crate) fn data_len(&self) -> u64 {
        self.offset
    }

    /// Encrypts both sections and writes the header file.
    pub(crate) fn write_header_file(self, path: &Path, zlib: ZlibOptions) -> Result<()> {
        let repository = self.repository;
        let info_len = self.info.len() as u64;
        let records_len = self.records.len() as u64;
        let (info, info_size) =
            repository.encrypt_with_options(&self.info[..], info_len, true, zlib)?;
        let (records, header_size) =
            repository.encrypt_with_options(&self.records[..], records_len, true, zlib)?;

        let header = ArchiveHeader {
            info_size,
            header_size,
            entry_count: self.count,
        };

        let mut out = BufWriter::new(File::create(path)?);
        write_u32(&mut out, repository.mode().tag())?;
        repository.archive_header_codec().write(&mut out, &header)?;
        out.write_all(info.get_ref())?;
        out.write_all(records.get_ref())?;
        out.flush()?;

        log::debug!(
            "wrote {} header: {} entries, info {info_size}, header {header_size}",
            repository.mode(),
            self.count
        );
        Ok(())
    }
}

/// Encodes and writes entries one after another.
pub(crate) fn save_sequential(
    repository: &CryptoRepository,
    entries: &[Arc<Entry>],
    zlib: ZlibOptions,
    header_path: &Path,
    data_path: &Path,
) -> Result<()> {
    let mut data = BufWriter::new(File::create(data_path)?);
    let mut sections = SectionBuilder::new(repository);

    for entry in entries {
        let (payload, size) = entry.archive_payload(zlib)?;
        data.write_all(payload.as_ref())?;
        sections.push(entry, size)?;
    }
    data.flush()?;

    log::debug!("wrote {} data bytes", sections.data_len());
    sections.write_header_file(header_path, zlib)
}

/// Writes encoded payloads into disjoint ranges of a mapped data file.
///
/// The payloads are laid out back to back in slice order; `total` must be
/// their combined length.
pub(crate) fn write_disjoint(data_path: &Path, total: u64, payloads: &[DataView]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(data_path)?;
    file.set_len(total)?;
    if total == 0 {
        return Ok(());
    }

    // The file was just created and truncated by this call and is not shared.
    let mut map = unsafe { MmapOptions::new().map_mut(&file)? };

    let mut rest: &mut [u8] = &mut map[..];
    let mut ranges = Vec::with_capacity(payloads.len());
    for payload in payloads {
        if payload.len() > rest.len() {
            return Err(Error::InvalidFormat(
                "entry payloads exceed the planned data length".into(),
            ));
        }
        let (range, tail) = std::mem::take(&mut rest).split_at_mut(payload.len());
        ranges.push((range, payload));
        rest = tail;
    }
    if !rest.is_empty() {
        return Err(Error::InvalidFormat(
            "entry payloads fall short of the planned data length".into(),
        ));
    }

    ranges
        .into_par_iter()
        .for_each(|(range, payload)| range.copy_from_slice(payload.as_ref()));

    map.flush()?;
    Ok(())
}
