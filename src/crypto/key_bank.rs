//! Lazily loaded tables of keys and IVs.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::{Error, Result};

/// Where a key bank's bytes come from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// A file read on first access.
    File(PathBuf),
    /// Bytes already in memory, e.g. compiled into a tool.
    Bytes(Arc<[u8]>),
}

impl KeySource {
    /// Creates an in-memory source.
    pub fn bytes(data: impl Into<Arc<[u8]>>) -> Self {
        KeySource::Bytes(data.into())
    }

    /// Returns a human-readable name for log and error messages.
    pub fn describe(&self) -> String {
        match self {
            KeySource::File(path) => path.display().to_string(),
            KeySource::Bytes(data) => format!("<{} in-memory bytes>", data.len()),
        }
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match self {
            KeySource::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            KeySource::Bytes(data) => Ok(Box::new(&data[..])),
        }
    }
}

impl From<PathBuf> for KeySource {
    fn from(path: PathBuf) -> Self {
        KeySource::File(path)
    }
}

#[derive(Debug)]
struct Slots {
    data: Vec<u8>,
    filled: usize,
}

/// A fixed-length table of fixed-size byte arrays, indexed with wraparound.
///
/// The source is read once, on the first [`get`](Self::get), and the table is
/// read-only afterwards, so one bank can be shared across threads. A source
/// shorter than `count * array_size` leaves the trailing slots unset.
#[derive(Debug)]
pub struct KeyBank {
    source: KeySource,
    count: usize,
    array_size: usize,
    slots: OnceLock<std::result::Result<Slots, String>>,
}

impl KeyBank {
    /// Creates a bank of `count` arrays of `array_size` bytes each.
    pub fn new(source: impl Into<KeySource>, count: usize, array_size: usize) -> Self {
        Self {
            source: source.into(),
            count,
            array_size,
            slots: OnceLock::new(),
        }
    }

    /// Creates a bank of [`KEY_COUNT`](super::KEY_COUNT) AES keys.
    pub fn keys(source: impl Into<KeySource>) -> Self {
        Self::new(source, super::KEY_COUNT, super::KEY_SIZE)
    }

    /// Creates a bank of [`KEY_COUNT`](super::KEY_COUNT) IVs.
    pub fn ivs(source: impl Into<KeySource>) -> Self {
        Self::new(source, super::KEY_COUNT, super::IV_SIZE)
    }

    /// Returns the number of slots.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns the size of each array in bytes.
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    /// Returns the backing source.
    pub fn source(&self) -> &KeySource {
        &self.source
    }

    /// Returns `true` once the source has been read.
    pub fn is_materialized(&self) -> bool {
        self.slots.get().is_some()
    }

    /// Returns the array at `index mod count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyBank`] if the source could not be read (on this
    /// and every later call) and [`Error::KeySlotUnavailable`] if the slot was
    /// left unset by a short source.
    pub fn get(&self, index: u64) -> Result<&[u8]> {
        let slots = self
            .slots
            .get_or_init(|| self.materialize().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|reason| Error::KeyBank {
                source_name: self.source.describe(),
                reason: reason.clone(),
            })?;

        let slot = match u64::try_from(self.count).ok().and_then(|c| index.checked_rem(c)) {
            Some(slot) => slot as usize,
            None => {
                return Err(Error::KeySlotUnavailable {
                    slot: 0,
                    count: self.count,
                });
            }
        };
        if slot >= slots.filled {
            return Err(Error::KeySlotUnavailable {
                slot,
                count: self.count,
            });
        }
        let start = slot * self.array_size;
        Ok(&slots.data[start..start + self.array_size])
    }

    fn materialize(&self) -> io::Result<Slots> {
        let mut reader = self.source.open()?;
        let mut data = vec![0u8; self.count * self.array_size];
        let mut filled = 0;

        for chunk in data.chunks_exact_mut(self.array_size.max(1)) {
            if self.array_size == 0 || read_full(&mut reader, chunk)? < chunk.len() {
                break;
            }
            filled += 1;
        }

        if filled < self.count {
            log::warn!(
                "key source {} filled {filled} of {} slots",
                self.source.describe(),
                self.count
            );
        } else {
            log::debug!("loaded {} slots from {}", self.count, self.source.describe());
        }
        data.truncate(filled * self.array_size);
        Ok(Slots { data, filled })
    }
}

/// Reads until `buf` is full or the source ends, returning the bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sequential(count: usize, size: usize) -> Vec<u8> {
        (0..count * size).map(|i| (i / size) as u8).collect()
    }

    #[test]
    fn test_get_wraps() {
        let bank = KeyBank::new(KeySource::bytes(sequential(4, 2)), 4, 2);
        assert_eq!(bank.get(1).unwrap(), &[1, 1]);
        assert_eq!(bank.get(5).unwrap(), &[1, 1]);
        assert_eq!(bank.get(u64::MAX).unwrap(), bank.get(3).unwrap());
    }

    #[test]
    fn test_lazy_materialization() {
        let bank = KeyBank::keys(KeySource::bytes(sequential(128, 32)));
        assert!(!bank.is_materialized());
        assert_eq!(bank.get(127).unwrap(), &[127u8; 32][..]);
        assert!(bank.is_materialized());
    }

    #[test]
    fn test_short_source_leaves_trailing_slots_unset() {
        let mut data = sequential(2, 4);
        data.extend_from_slice(&[9, 9]);
        let bank = KeyBank::new(KeySource::bytes(data), 4, 4);
        assert_eq!(bank.get(1).unwrap(), &[1, 1, 1, 1]);
        assert!(matches!(
            bank.get(2),
            Err(Error::KeySlotUnavailable { slot: 2, count: 4 })
        ));
        assert!(bank.get(4).is_ok());
    }

    #[test]
    fn test_missing_file_fails_every_call() {
        let bank = KeyBank::ivs(PathBuf::from("/nonexistent/ms2archive/NS2F_IV"));
        for _ in 0..2 {
            let err = bank.get(0).unwrap_err();
            assert!(matches!(err, Error::KeyBank { ref source_name, .. } if source_name.contains("NS2F_IV")));
        }
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&sequential(128, 16)).unwrap();
        file.flush().unwrap();
        let bank = KeyBank::ivs(file.path().to_path_buf());
        assert_eq!(bank.get(130).unwrap(), &[2u8; 16][..]);
    }

    #[test]
    fn test_zero_count() {
        let bank = KeyBank::new(KeySource::bytes(Vec::new()), 0, 16);
        assert!(matches!(
            bank.get(3),
            Err(Error::KeySlotUnavailable { count: 0, .. })
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let bank = Arc::new(KeyBank::keys(KeySource::bytes(sequential(128, 32))));
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let bank = Arc::clone(&bank);
                std::thread::spawn(move || bank.get(i * 100).unwrap().to_vec())
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let slot = (i as u64 * 100 % 128) as u8;
            assert_eq!(handle.join().unwrap(), vec![slot; 32]);
        }
    }
}
