//! The three byte counts of one payload.

use std::fmt;

/// Byte counts of one payload at its three pipeline stages.
///
/// - `encoded`: bytes on disk (encrypted, padded)
/// - `compressed`: bytes after decryption, before decompression
/// - `size`: fully decoded bytes
///
/// No ordering between the three is enforced; AES padding makes `encoded`
/// larger than `compressed`, and incompressible data can make `compressed`
/// larger than `size`. Exactly `encoded` bytes are read from the data blob
/// for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SizeTriple {
    encoded: u64,
    compressed: u64,
    size: u64,
}

impl SizeTriple {
    /// Creates a triple from all three stage lengths.
    pub const fn new(encoded: u64, compressed: u64, size: u64) -> Self {
        Self {
            encoded,
            compressed,
            size,
        }
    }

    /// Creates a triple for a payload that is neither compressed nor encrypted.
    pub const fn uniform(size: u64) -> Self {
        Self::new(size, size, size)
    }

    /// Returns the on-disk (encrypted) length.
    pub const fn encoded(&self) -> u64 {
        self.encoded
    }

    /// Returns the length after decryption.
    pub const fn compressed(&self) -> u64 {
        self.compressed
    }

    /// Returns the fully decoded length.
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Display for SizeTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}->{}", self.encoded, self.compressed, self.size)
    }
}
