//! Save/load round-trip tests for both save paths and every mode.

mod common;

use common::{Fixture, entry, sample_archive};
use ms2archive::{Archive, CompressionType, CryptoMode, Entry, EntryInfo};
use std::sync::Arc;

#[tokio::test]
async fn test_two_entry_roundtrip_sequential() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ms2f);
    let (m2h, m2d) = fx.pair("seq");

    sample_archive(&repo).save(&m2h, &m2d).await.unwrap();

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    assert_eq!(loaded.mode(), CryptoMode::Ms2f);
    assert_eq!(loaded.ids(), vec![1, 2]);

    let a = loaded.get(1).unwrap();
    assert_eq!(a.name(), "Models/a.bin");
    assert_eq!(a.info().root_folder_id(), "296352536067");
    assert!(a.is_data_encrypted());
    assert!(a.is_zlib_compressed());
    assert_eq!(a.read_to_vec().unwrap(), b"model data ".repeat(100));

    let b = loaded.get(2).unwrap();
    assert_eq!(b.info().root_folder_id(), "3563696252");
    assert_eq!(b.read_to_vec().unwrap(), b"RIFF....WAVEfmt ");
}

#[tokio::test]
async fn test_uncompressed_entries_both_paths() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ns2f);
    let archive = Archive::new(Arc::clone(&repo));
    archive.add(entry(&repo, 1, "Models/a.bin", CompressionType::None, b"\x01\x02\x03"));
    archive.add(entry(&repo, 2, "Sound/b.wav", CompressionType::None, b"\xFF\xFF"));

    for concurrent in [false, true] {
        let (m2h, m2d) = fx.pair(&format!("plain-{concurrent}"));
        if concurrent {
            archive.save_concurrently(&m2h, &m2d).await.unwrap();
        } else {
            archive.save(&m2h, &m2d).await.unwrap();
        }

        let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
        assert_eq!(loaded.len(), 2);
        let first = loaded.get(1).unwrap();
        assert_eq!(first.name(), "Models/a.bin");
        assert_eq!(first.compression(), CompressionType::None);
        assert_eq!(first.read_to_vec().unwrap(), b"\x01\x02\x03");
        assert_eq!(loaded.get(2).unwrap().read_to_vec().unwrap(), b"\xFF\xFF");
    }
}

#[tokio::test]
async fn test_two_entry_roundtrip_concurrent() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ns2f);
    let (m2h, m2d) = fx.pair("conc");

    sample_archive(&repo)
        .save_concurrently(&m2h, &m2d)
        .await
        .unwrap();

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(
        loaded.get(1).unwrap().read_to_vec().unwrap(),
        b"model data ".repeat(100)
    );
    assert_eq!(
        loaded.get(2).unwrap().read_to_vec().unwrap(),
        b"RIFF....WAVEfmt "
    );
}

#[tokio::test]
async fn test_both_save_paths_produce_identical_files() {
    let fx = Fixture::new();
    for mode in CryptoMode::ALL {
        let repo = fx.repository(mode);
        let archive = sample_archive(&repo);
        let (seq_h, seq_d) = fx.pair(&format!("{mode}-seq"));
        let (conc_h, conc_d) = fx.pair(&format!("{mode}-conc"));

        archive.save(&seq_h, &seq_d).await.unwrap();
        archive.save_concurrently(&conc_h, &conc_d).await.unwrap();

        assert_eq!(std::fs::read(&seq_h).unwrap(), std::fs::read(&conc_h).unwrap());
        assert_eq!(std::fs::read(&seq_d).unwrap(), std::fs::read(&conc_d).unwrap());
        assert_eq!(
            &std::fs::read(&seq_h).unwrap()[..4],
            &mode.tag().to_le_bytes()
        );
    }
}

#[tokio::test]
async fn test_data_file_layout() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Os2f);
    let (m2h, m2d) = fx.pair("layout");
    sample_archive(&repo).save(&m2h, &m2d).await.unwrap();

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    let entries = loaded.entries();
    let first = entries[0].header();
    let second = entries[1].header();

    assert_eq!(first.offset(), 0);
    assert_eq!(second.offset(), first.size().encoded());
    assert_eq!(
        std::fs::metadata(&m2d).unwrap().len(),
        second.offset() + second.size().encoded()
    );
    assert_eq!(first.size().encoded() % 16, 0);
    assert_eq!(second.size().compressed(), second.size().size());
}

#[tokio::test]
async fn test_resave_passes_encrypted_bytes_through() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ps2f);
    let (m2h, m2d) = fx.pair("first");
    let (m2h2, m2d2) = fx.pair("second");

    sample_archive(&repo).save(&m2h, &m2d).await.unwrap();
    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    loaded.save_concurrently(&m2h2, &m2d2).await.unwrap();

    assert_eq!(std::fs::read(&m2d).unwrap(), std::fs::read(&m2d2).unwrap());
    assert_eq!(std::fs::read(&m2h).unwrap(), std::fs::read(&m2h2).unwrap());
}

#[tokio::test]
async fn test_mixed_loaded_and_new_entries() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ns2f);
    let (m2h, m2d) = fx.pair("base");
    let (out_h, out_d) = fx.pair("mixed");

    sample_archive(&repo).save(&m2h, &m2d).await.unwrap();
    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();

    assert!(loaded.add(entry(&repo, 7, "Xml/new.xml", CompressionType::Zlib, b"<new/>")));
    assert!(!loaded.add(entry(&repo, 2, "Sound/dup.wav", CompressionType::None, b"dup")));
    assert!(loaded.replace(entry(&repo, 1, "Models/a.bin", CompressionType::Png, b"replaced")));

    loaded.save_concurrently(&out_h, &out_d).await.unwrap();
    let reloaded = Archive::open(&out_h, &out_d, &fx.registry).await.unwrap();
    assert_eq!(reloaded.ids(), vec![1, 2, 7]);
    assert_eq!(reloaded.get(1).unwrap().read_to_vec().unwrap(), b"replaced");
    assert_eq!(reloaded.get(1).unwrap().compression(), CompressionType::Png);
    assert_eq!(reloaded.get(2).unwrap().read_to_vec().unwrap(), b"RIFF....WAVEfmt ");
    assert_eq!(reloaded.get(7).unwrap().read_to_vec().unwrap(), b"<new/>");
}

#[tokio::test]
async fn test_empty_archive_roundtrip() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ms2f);
    let (m2h, m2d) = fx.pair("empty");

    let archive = Archive::new(Arc::clone(&repo));
    archive.save_concurrently(&m2h, &m2d).await.unwrap();
    assert_eq!(std::fs::metadata(&m2d).unwrap().len(), 0);

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    assert!(loaded.is_empty());
    let (info, header) = loaded.section_sizes().unwrap();
    assert_eq!(info.size(), 0);
    assert_eq!(header.size(), 0);
}

#[tokio::test]
async fn test_many_entries_bounded_concurrency() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ns2f);
    let options = ms2archive::ArchiveOptions::new().max_concurrency(3).level(9).unwrap();
    let archive = Archive::with_options(Arc::clone(&repo), options);

    for id in 0..64u32 {
        let data: Vec<u8> = (0..id * 37).map(|i| (i % 7) as u8).collect();
        let compression = if id % 2 == 0 {
            CompressionType::Zlib
        } else {
            CompressionType::None
        };
        archive.add(entry(&repo, id, &format!("Data/{id}.bin"), compression, &data));
    }

    let (m2h, m2d) = fx.pair("many");
    archive.save_concurrently(&m2h, &m2d).await.unwrap();

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    assert_eq!(loaded.len(), 64);
    for entry in loaded.entries() {
        let id = entry.id() as u32;
        let expected: Vec<u8> = (0..id * 37).map(|i| (i % 7) as u8).collect();
        assert_eq!(entry.read_to_vec().unwrap(), expected, "entry {id}");
    }
}

#[tokio::test]
async fn test_entry_from_reader_in_archive() {
    let fx = Fixture::new();
    let repo = fx.repository(CryptoMode::Ms2f);
    let (m2h, m2d) = fx.pair("reader");

    let bytes = b"----payload----".to_vec();
    let header = ms2archive::EntryHeader::new(
        5,
        4,
        CompressionType::None,
        ms2archive::SizeTriple::uniform(7),
    );
    let info = EntryInfo::new("5", "top.bin").unwrap();
    let from_reader = Entry::from_reader(
        Arc::clone(&repo),
        info,
        header,
        std::io::Cursor::new(bytes),
        false,
    );

    let archive = Archive::new(Arc::clone(&repo));
    assert!(archive.add(from_reader));
    archive.save(&m2h, &m2d).await.unwrap();

    let loaded = Archive::open(&m2h, &m2d, &fx.registry).await.unwrap();
    let entry = loaded.get(5).unwrap();
    assert_eq!(entry.info().root_folder_id(), "");
    assert_eq!(entry.read_to_vec().unwrap(), b"payload");
}
