//! Mode providers and the registry that maps tags to them.

use std::collections::BTreeMap;
use std::io::{BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use super::{Aes256CbcDecoder, Aes256CbcEncoder, BLOCK_SIZE, IV_SIZE, KEY_SIZE, KeyBank};
use crate::codec::{ExactReader, ZlibDecoder, ZlibOptions, zlib};
use crate::format::{
    ArchiveHeaderCodec, CryptoMode, EntryHeaderCodec, EntryInfoCodec, SizeTriple,
};
use crate::{Error, Result};

/// The crypto provider of one mode.
///
/// Bundles the mode's header codecs with its key and IV banks and exposes the
/// streaming encrypt/decrypt pipeline. A repository is immutable and meant to
/// be shared behind an [`Arc`] by every archive and entry of its mode.
#[derive(Debug)]
pub struct CryptoRepository {
    mode: CryptoMode,
    keys: KeyBank,
    ivs: KeyBank,
}

impl CryptoRepository {
    /// Creates a provider from explicit banks.
    pub fn new(mode: CryptoMode, keys: KeyBank, ivs: KeyBank) -> Self {
        Self { mode, keys, ivs }
    }

    /// Returns the mode.
    pub fn mode(&self) -> CryptoMode {
        self.mode
    }

    /// Returns the codec for the block after the mode tag.
    pub fn archive_header_codec(&self) -> ArchiveHeaderCodec {
        ArchiveHeaderCodec::new(self.mode.layout())
    }

    /// Returns the codec for per-entry header records.
    pub fn entry_header_codec(&self) -> EntryHeaderCodec {
        EntryHeaderCodec::new(self.mode.layout())
    }

    /// Returns the info line codec, shared by all modes.
    pub fn entry_info_codec(&self) -> EntryInfoCodec {
        EntryInfoCodec
    }

    /// Returns the key bank.
    pub fn key_bank(&self) -> &KeyBank {
        &self.keys
    }

    /// Returns the IV bank.
    pub fn iv_bank(&self) -> &KeyBank {
        &self.ivs
    }

    fn cipher_params(&self, size: u64) -> Result<([u8; KEY_SIZE], [u8; IV_SIZE])> {
        let key = self.keys.get(size)?;
        let iv = self.ivs.get(size)?;
        let key = <[u8; KEY_SIZE]>::try_from(key).map_err(|_| {
            Error::CryptoError(format!(
                "{} key bank holds {}-byte keys, expected {KEY_SIZE}",
                self.mode,
                key.len()
            ))
        })?;
        let iv = <[u8; IV_SIZE]>::try_from(iv).map_err(|_| {
            Error::CryptoError(format!(
                "{} IV bank holds {}-byte IVs, expected {IV_SIZE}",
                self.mode,
                iv.len()
            ))
        })?;
        Ok((key, iv))
    }

    /// Returns a stream that decodes the next `size.encoded()` bytes of
    /// `reader`.
    ///
    /// Nothing is read until the returned stream is. Its output is exactly
    /// `size.size()` bytes; truncated input or a length mismatch surfaces as
    /// an [`std::io::ErrorKind::UnexpectedEof`] or
    /// [`std::io::ErrorKind::InvalidData`] read error.
    ///
    /// # Errors
    ///
    /// Fails up front if the key slot is unavailable, or with
    /// [`Error::CorruptArchive`] if `size` cannot describe a valid payload.
    pub fn decrypt<'a, R: Read + Send + 'a>(
        &self,
        reader: R,
        size: SizeTriple,
        compressed: bool,
    ) -> Result<Box<dyn Read + Send + 'a>> {
        if !compressed && size.compressed() != size.size() {
            return Err(Error::corrupt(format!(
                "uncompressed payload records {size} stage lengths"
            )));
        }
        let (key, iv) = self.cipher_params(size.size())?;
        let decoder =
            Aes256CbcDecoder::with_key_iv(reader, key, iv, size.encoded(), size.compressed())
                .map_err(|e| Error::from_decode("encrypted payload", e))?;

        if compressed {
            Ok(Box::new(ExactReader::new(
                ZlibDecoder::new(BufReader::new(decoder)),
                size.size(),
            )))
        } else {
            Ok(Box::new(decoder))
        }
    }

    /// Encodes exactly `len` bytes of `reader` at the default zlib level.
    ///
    /// Returns the encoded bytes and the stage lengths needed for the header
    /// record.
    pub fn encrypt<R: Read>(
        &self,
        reader: R,
        len: u64,
        compress: bool,
    ) -> Result<(Cursor<Vec<u8>>, SizeTriple)> {
        self.encrypt_with_options(reader, len, compress, ZlibOptions::default())
    }

    /// Encodes exactly `len` bytes of `reader` with explicit zlib options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if `reader` holds fewer than `len`
    /// bytes.
    pub fn encrypt_with_options<R: Read>(
        &self,
        reader: R,
        len: u64,
        compress: bool,
        options: ZlibOptions,
    ) -> Result<(Cursor<Vec<u8>>, SizeTriple)> {
        let mut plain = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
        ExactReader::new(reader, len)
            .read_to_end(&mut plain)
            .map_err(|e| Error::from_decode("plaintext source", e))?;

        let staged = if compress {
            zlib::compress(&plain, options)?
        } else {
            plain
        };

        let (key, iv) = self.cipher_params(len)?;
        let mut encoder = Aes256CbcEncoder::with_key_iv(
            Vec::with_capacity(staged.len() + BLOCK_SIZE),
            key,
            iv,
        );
        encoder.write_all(&staged)?;
        let (encrypted, encoded) = encoder.finish()?;

        let size = SizeTriple::new(encoded, staged.len() as u64, len);
        log::trace!("{} encoded {size} (compress: {compress})", self.mode);
        Ok((Cursor::new(encrypted), size))
    }
}

/// A directory of key files, one key and one IV file per mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Environment variable naming the key directory.
    pub const ENV_VAR: &'static str = "MS2ARCHIVE_KEY_DIR";

    /// Directory used when [`ENV_VAR`](Self::ENV_VAR) is unset.
    pub const DEFAULT_DIR: &'static str = "keys";

    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store from `MS2ARCHIVE_KEY_DIR`, falling back to `./keys`.
    pub fn from_env() -> Self {
        let dir = std::env::var_os(Self::ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_DIR));
        Self::new(dir)
    }

    /// Returns the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the key file of `mode`, e.g. `MS2F_Key`.
    pub fn key_path(&self, mode: CryptoMode) -> PathBuf {
        self.dir.join(format!("{}_Key", mode.name()))
    }

    /// Returns the path of the IV file of `mode`, e.g. `MS2F_IV`.
    pub fn iv_path(&self, mode: CryptoMode) -> PathBuf {
        self.dir.join(format!("{}_IV", mode.name()))
    }

    /// Creates the provider of `mode`. Files are read on first key access.
    pub fn repository(&self, mode: CryptoMode) -> CryptoRepository {
        CryptoRepository::new(
            mode,
            KeyBank::keys(self.key_path(mode)),
            KeyBank::ivs(self.iv_path(mode)),
        )
    }
}

/// The set of mode providers an archive can be opened with.
#[derive(Debug, Default)]
pub struct CryptoRegistry {
    repositories: BTreeMap<CryptoMode, Arc<CryptoRepository>>,
}

impl CryptoRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry, built once from
    /// [`KeyStore::from_env`].
    pub fn global() -> &'static CryptoRegistry {
        static GLOBAL: OnceLock<CryptoRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let store = KeyStore::from_env();
            log::debug!("global key store at {}", store.dir().display());
            Self::from_key_store(&store)
        })
    }

    /// Creates a registry with a provider for every mode.
    pub fn from_key_store(store: &KeyStore) -> Self {
        let mut registry = Self::new();
        for mode in CryptoMode::ALL {
            registry.insert(store.repository(mode));
        }
        registry
    }

    /// Adds a provider, returning the one it replaces.
    pub fn insert(&mut self, repository: CryptoRepository) -> Option<Arc<CryptoRepository>> {
        self.repositories
            .insert(repository.mode(), Arc::new(repository))
    }

    /// Returns the provider of `mode`.
    pub fn get(&self, mode: CryptoMode) -> Option<Arc<CryptoRepository>> {
        self.repositories.get(&mode).cloned()
    }

    /// Returns the registered modes in tag-name order.
    pub fn modes(&self) -> impl Iterator<Item = CryptoMode> + '_ {
        self.repositories.keys().copied()
    }

    /// Returns the provider for a raw header tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCryptoMode`] if the tag names no mode or the
    /// mode has no provider here.
    pub fn for_tag(&self, tag: u32) -> Result<Arc<CryptoRepository>> {
        CryptoMode::from_tag(tag)
            .and_then(|mode| self.get(mode))
            .ok_or(Error::UnknownCryptoMode { tag })
    }
}
