//! The archive container: an index of entries plus load and save.
//!
//! # Loading
//!
//! ```rust,no_run
//! use ms2archive::{Archive, CryptoRegistry};
//!
//! # async fn run() -> ms2archive::Result<()> {
//! let archive = Archive::open("Xml.m2h", "Xml.m2d", CryptoRegistry::global()).await?;
//! for entry in archive.entries() {
//!     let bytes = entry.read_to_vec()?;
//!     println!("{} {} ({} bytes)", entry.id(), entry.name(), bytes.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Saving
//!
//! [`Archive::save`] encodes and writes entries one by one.
//! [`Archive::save_concurrently`] encodes entries on parallel blocking tasks,
//! assigns offsets in id order, then copies every payload into its own range
//! of a memory-mapped data file at once. Both produce identical files.
//!
//! Entries loaded from an archive keep referencing its data file, even after
//! they are added to another archive. Neither save path writes over a file
//! that backs one of the entries being saved.

mod load;
mod save;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures::{StreamExt, TryStreamExt, stream};

use crate::blob::MappedBlob;
use crate::crypto::{CryptoRegistry, CryptoRepository};
use crate::entry::Entry;
use crate::format::{CryptoMode, SizeTriple};
use crate::options::ArchiveOptions;
use crate::{Error, Result};

enum ArchiveState {
    Empty,
    Loaded {
        // Keeps the mapping alive for entries that are removed but not
        // disposed by the caller.
        _blob: Arc<MappedBlob>,
        data_path: PathBuf,
        info_size: SizeTriple,
        header_size: SizeTriple,
    },
    Disposed,
}

/// An MS2 archive bound to one crypto mode.
///
/// The entry index is concurrent: entries can be added, removed and looked
/// up through `&self` from many tasks. Loading, resetting and disposing take
/// `&mut self`.
pub struct Archive {
    repository: Arc<CryptoRepository>,
    options: ArchiveOptions,
    entries: DashMap<u64, Arc<Entry>>,
    state: ArchiveState,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.options.name)
            .field("mode", &self.repository.mode())
            .field("entries", &self.entries.len())
            .field("is_disposed", &self.is_disposed())
            .finish()
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl Archive {
    /// Creates an empty archive with default options.
    pub fn new(repository: Arc<CryptoRepository>) -> Self {
        Self::with_options(repository, ArchiveOptions::default())
    }

    /// Creates an empty archive.
    pub fn with_options(repository: Arc<CryptoRepository>, options: ArchiveOptions) -> Self {
        Self {
            repository,
            options,
            entries: DashMap::new(),
            state: ArchiveState::Empty,
        }
    }

    /// Opens an archive pair, picking the provider from the header file tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the header file is shorter than a
    /// tag, [`Error::UnknownCryptoMode`] if no provider in `registry` matches
    /// the tag, and any error of [`load`](Self::load).
    pub async fn open(
        header_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
        registry: &CryptoRegistry,
    ) -> Result<Self> {
        let header_path = header_path.as_ref().to_path_buf();
        let tag_path = header_path.clone();
        let tag = tokio::task::spawn_blocking(move || load::read_mode_tag(&tag_path))
            .await
            .map_err(Error::task_failed)??;

        let repository = registry.for_tag(tag)?;
        let mut archive = Self::new(repository);
        archive.load(header_path, data_path).await?;
        Ok(archive)
    }

    /// Returns the archive name.
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Returns the options.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Returns the crypto mode.
    pub fn mode(&self) -> CryptoMode {
        self.repository.mode()
    }

    /// Returns the crypto provider.
    pub fn repository(&self) -> &Arc<CryptoRepository> {
        &self.repository
    }

    /// Returns `true` after [`dispose`](Self::dispose).
    pub fn is_disposed(&self) -> bool {
        matches!(self.state, ArchiveState::Disposed)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed { resource: "archive" });
        }
        Ok(())
    }

    /// Returns the info and header section sizes of the last load.
    pub fn section_sizes(&self) -> Option<(SizeTriple, SizeTriple)> {
        match &self.state {
            ArchiveState::Loaded {
                info_size,
                header_size,
                ..
            } => Some((*info_size, *header_size)),
            _ => None,
        }
    }

    /// Replaces the contents of this archive with an archive pair.
    ///
    /// On failure the archive is left empty.
    ///
    /// # Errors
    ///
    /// - [`Error::Disposed`] after [`dispose`](Self::dispose)
    /// - [`Error::UnknownCryptoMode`] / [`Error::CryptoModeMismatch`] if the
    ///   header file is not of this archive's mode
    /// - [`Error::CorruptArchive`] for truncated or inconsistent sections
    /// - [`Error::InvalidFormat`] for malformed info lines
    pub async fn load(
        &mut self,
        header_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
    ) -> Result<()> {
        self.ensure_live()?;
        self.reset();

        let header_path = header_path.as_ref().to_path_buf();
        let data_path = data_path.as_ref().to_path_buf();
        let repository = Arc::clone(&self.repository);
        let paths = (header_path.clone(), data_path.clone());

        let loaded = tokio::task::spawn_blocking(move || {
            load::load_pair(&repository, &paths.0, &paths.1)
        })
        .await
        .map_err(Error::task_failed)
        .and_then(|result| result);

        let loaded = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                log::debug!(
                    "{}: loading {} failed: {e}",
                    self.options.name,
                    header_path.display()
                );
                self.reset();
                return Err(e);
            }
        };

        for entry in loaded.entries {
            let id = entry.id();
            if !self.add(entry) {
                log::debug!("{}: skipped duplicate entry id {id}", self.options.name);
            }
        }
        self.state = ArchiveState::Loaded {
            _blob: loaded.blob,
            data_path,
            info_size: loaded.header.info_size,
            header_size: loaded.header.header_size,
        };
        log::debug!(
            "{}: loaded {} entries from {}",
            self.options.name,
            self.entries.len(),
            header_path.display()
        );
        Ok(())
    }

    /// Rejects targets that back the loaded archive or any pass-through entry.
    fn check_save_target(
        &self,
        header_path: &Path,
        data_path: &Path,
        entries: &[Arc<Entry>],
    ) -> Result<()> {
        self.ensure_live()?;
        let loaded = match &self.state {
            ArchiveState::Loaded {
                data_path: loaded, ..
            } => Some(loaded.clone()),
            _ => None,
        };
        let sources = loaded
            .into_iter()
            .chain(entries.iter().filter_map(|entry| entry.mapped_source()));

        for source in sources {
            if let Some(target) = [header_path, data_path]
                .into_iter()
                .find(|target| same_file(&source, target))
            {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "cannot save over {}, which backs entries being saved",
                        target.display()
                    ),
                )));
            }
        }
        Ok(())
    }

    /// Writes all entries, in id order, one after another.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after disposal and an
    /// [`io::ErrorKind::InvalidInput`] I/O error if either target is the data
    /// file behind this archive or behind a loaded entry. Otherwise returns
    /// the first error raised while encoding an entry or writing either file.
    pub async fn save(
        &self,
        header_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
    ) -> Result<()> {
        let header_path = header_path.as_ref().to_path_buf();
        let data_path = data_path.as_ref().to_path_buf();
        let entries = self.entries();
        self.check_save_target(&header_path, &data_path, &entries)?;

        let repository = Arc::clone(&self.repository);
        let zlib = self.options.zlib();
        log::debug!("{}: saving {} entries", self.options.name, entries.len());

        tokio::task::spawn_blocking(move || {
            save::save_sequential(&repository, &entries, zlib, &header_path, &data_path)
        })
        .await
        .map_err(Error::task_failed)?
    }

    /// Writes all entries, encoding them in parallel.
    ///
    /// Up to [`ArchiveOptions::max_concurrency`] entries are encoded at once
    /// on blocking tasks, each buffering its payload in memory. Offsets are
    /// then assigned in id order and every payload is copied into its own
    /// range of the memory-mapped data file.
    ///
    /// # Errors
    ///
    /// Same as [`save`](Self::save). The first failing entry aborts the save.
    pub async fn save_concurrently(
        &self,
        header_path: impl AsRef<Path>,
        data_path: impl AsRef<Path>,
    ) -> Result<()> {
        let header_path = header_path.as_ref().to_path_buf();
        let data_path = data_path.as_ref().to_path_buf();
        let entries = self.entries();
        self.check_save_target(&header_path, &data_path, &entries)?;

        let zlib = self.options.zlib();
        log::debug!(
            "{}: saving {} entries with up to {} tasks",
            self.options.name,
            entries.len(),
            self.options.max_concurrency
        );

        let encoded: Vec<_> = stream::iter(entries.iter().cloned())
            .map(|entry| async move {
                tokio::task::spawn_blocking(move || {
                    let (payload, size) = entry.archive_payload(zlib)?;
                    Ok::<_, Error>((payload.into_owned(), size))
                })
                    .await
                    .map_err(Error::task_failed)?
            })
            .buffered(self.options.max_concurrency.max(1))
            .try_collect()
            .await?;

        let repository = Arc::clone(&self.repository);
        tokio::task::spawn_blocking(move || {
            let mut sections = save::SectionBuilder::new(&repository);
            let mut payloads = Vec::with_capacity(encoded.len());
            for (entry, (payload, size)) in entries.iter().zip(encoded) {
                sections.push(entry, size)?;
                payloads.push(payload);
            }
            save::write_disjoint(&data_path, sections.data_len(), &payloads)?;
            sections.write_header_file(&header_path, zlib)
        })
        .await
        .map_err(Error::task_failed)?
    }

    /// Adds an entry unless its id is already present.
    ///
    /// Returns `false` (and leaves the index unchanged) for a duplicate id or
    /// a disposed archive.
    pub fn add(&self, entry: impl Into<Arc<Entry>>) -> bool {
        if self.is_disposed() {
            return false;
        }
        let entry = entry.into();
        match self.entries.entry(entry.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Swaps in `entry` for the entry with the same id, disposing the old one.
    ///
    /// Returns `false` and does nothing if the id is not present.
    pub fn replace(&self, entry: impl Into<Arc<Entry>>) -> bool {
        let entry = entry.into();
        let old = match self.entries.get_mut(&entry.id()) {
            Some(mut slot) => std::mem::replace(slot.value_mut(), entry),
            None => return false,
        };
        old.dispose();
        true
    }

    /// Removes the entry with `id`, disposing it when `dispose` is set.
    pub fn remove(&self, id: u64, dispose: bool) -> bool {
        match self.entries.remove(&id) {
            Some((_, entry)) => {
                if dispose {
                    entry.dispose();
                }
                true
            }
            None => false,
        }
    }

    /// Removes every entry, disposing them when `dispose` is set.
    pub fn clear(&self, dispose: bool) {
        if dispose {
            for entry in self.entries.iter() {
                entry.value().dispose();
            }
        }
        self.entries.clear();
    }

    /// Returns the entry with `id`.
    pub fn get(&self, id: u64) -> Option<Arc<Entry>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if an entry with `id` is present.
    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns all ids in ascending order.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.entries.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Returns a snapshot of all entries in ascending id order.
    pub fn entries(&self) -> Vec<Arc<Entry>> {
        let mut entries: Vec<Arc<Entry>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        entries.sort_unstable_by_key(|entry| entry.id());
        entries
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Disposes every entry and releases the loaded data file.
    pub fn reset(&mut self) {
        self.clear(true);
        if !self.is_disposed() {
            self.state = ArchiveState::Empty;
        }
    }

    /// Resets the archive and rejects further loads and saves.
    pub fn dispose(&mut self) {
        self.reset();
        self.state = ArchiveState::Disposed;
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        self.reset();
    }
}
