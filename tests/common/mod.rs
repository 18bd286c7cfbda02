//! Shared test utilities for integration tests.
//!
//! Key files are generated from a seeded RNG into a temporary directory, so
//! every test gets the same deterministic key material without touching the
//! real `MS2ARCHIVE_KEY_DIR`.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use ms2archive::crypto::{IV_SIZE, KEY_COUNT, KEY_SIZE};
use ms2archive::{
    Archive, CompressionType, CryptoMode, CryptoRegistry, CryptoRepository, Entry, EntryInfo,
    KeyStore,
};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tempfile::TempDir;

/// A key directory and the registry built from it.
pub struct Fixture {
    pub keys: TempDir,
    pub work: TempDir,
    pub registry: CryptoRegistry,
}

impl Fixture {
    /// Writes key and IV files for every mode and builds a registry.
    pub fn new() -> Self {
        let keys = tempfile::tempdir().unwrap();
        let store = KeyStore::new(keys.path());
        let mut rng = StdRng::seed_from_u64(0x4D53_3246);

        for mode in CryptoMode::ALL {
            let mut key = vec![0u8; KEY_COUNT * KEY_SIZE];
            let mut iv = vec![0u8; KEY_COUNT * IV_SIZE];
            rng.fill_bytes(&mut key);
            rng.fill_bytes(&mut iv);
            std::fs::write(store.key_path(mode), key).unwrap();
            std::fs::write(store.iv_path(mode), iv).unwrap();
        }

        Self {
            registry: CryptoRegistry::from_key_store(&store),
            keys,
            work: tempfile::tempdir().unwrap(),
        }
    }

    /// Returns the provider of `mode`.
    pub fn repository(&self, mode: CryptoMode) -> Arc<CryptoRepository> {
        self.registry.get(mode).unwrap()
    }

    /// Returns header and data paths named `stem` in the work directory.
    pub fn pair(&self, stem: &str) -> (PathBuf, PathBuf) {
        (
            self.work.path().join(format!("{stem}.m2h")),
            self.work.path().join(format!("{stem}.m2d")),
        )
    }
}

/// Creates an entry holding decoded bytes.
pub fn entry(
    repository: &Arc<CryptoRepository>,
    id: u32,
    path: &str,
    compression: CompressionType,
    data: &[u8],
) -> Entry {
    let info = EntryInfo::new(id.to_string(), path).unwrap();
    Entry::from_bytes(Arc::clone(repository), info, compression, data).unwrap()
}

/// The two-entry archive used by most round-trip tests.
pub fn sample_archive(repository: &Arc<CryptoRepository>) -> Archive {
    let archive = Archive::new(Arc::clone(repository));
    assert!(archive.add(entry(
        repository,
        1,
        "Models/a.bin",
        CompressionType::Zlib,
        &b"model data ".repeat(100),
    )));
    assert!(archive.add(entry(
        repository,
        2,
        "Sound/b.wav",
        CompressionType::None,
        b"RIFF....WAVEfmt ",
    )));
    archive
}
