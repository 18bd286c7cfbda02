//! Fuzz target for info section lines and root folder derivation.
//!
//! Run with: cargo +nightly fuzz run info_line

#![no_main]

use libfuzzer_sys::fuzz_target;
use ms2archive::format::{EntryInfoCodec, derive_root_folder_id};
use ms2archive::EntryInfo;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        if let Ok(info) = EntryInfoCodec.parse_line(line) {
            let mut out = Vec::new();
            let _ = EntryInfoCodec.write(&mut out, &info);
        }
        let _ = derive_root_folder_id(line);
        let _ = EntryInfo::new("1", line);
    }
});
