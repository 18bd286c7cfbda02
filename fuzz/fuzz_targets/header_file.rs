//! Fuzz target for header file parsing with arbitrary byte input.
//!
//! Feeds the bytes through the archive header codec of every layout and, when
//! that succeeds, through the section decoder with fixed keys. Looks for
//! panics, hangs, and oversized allocations.
//!
//! Run with: cargo +nightly fuzz run header_file

#![no_main]

use libfuzzer_sys::fuzz_target;
use ms2archive::crypto::{IV_SIZE, KEY_COUNT, KEY_SIZE};
use ms2archive::{CryptoMode, CryptoRepository, KeyBank, KeySource};
use std::io::{Cursor, Read};
use std::sync::OnceLock;

fn repositories() -> &'static Vec<CryptoRepository> {
    static REPOS: OnceLock<Vec<CryptoRepository>> = OnceLock::new();
    REPOS.get_or_init(|| {
        CryptoMode::ALL
            .into_iter()
            .map(|mode| {
                CryptoRepository::new(
                    mode,
                    KeyBank::keys(KeySource::bytes(vec![0x11u8; KEY_COUNT * KEY_SIZE])),
                    KeyBank::ivs(KeySource::bytes(vec![0x22u8; KEY_COUNT * IV_SIZE])),
                )
            })
            .collect()
    })
}

fuzz_target!(|data: &[u8]| {
    for repository in repositories() {
        let mut cursor = Cursor::new(data);
        let Ok(header) = repository.archive_header_codec().read(&mut cursor) else {
            continue;
        };
        let rest = &data[cursor.position() as usize..];
        if let Ok(stream) = repository.decrypt(rest, header.info_size, true) {
            // Bound the work per input.
            let _ = stream.take(1 << 20).read_to_end(&mut Vec::new());
        }
        let _ = repository
            .entry_header_codec()
            .read(&mut Cursor::new(rest));
    }
});
