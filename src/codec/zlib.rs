//! zlib (RFC 1950) codec.

use std::io::{self, BufRead, Read, Write};

use flate2::Compression;
use flate2::bufread::ZlibDecoder as FlateDecoder;
use flate2::write::ZlibEncoder as FlateEncoder;

/// Default zlib level for entries and header sections.
pub const DEFAULT_LEVEL: u32 = 6;

/// zlib decoder.
pub struct ZlibDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for ZlibDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibDecoder").finish_non_exhaustive()
    }
}

impl<R: BufRead> ZlibDecoder<R> {
    /// Creates a decoder over a buffered zlib stream.
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }
}

impl<R: BufRead> Read for ZlibDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // flate2 reports a corrupt stream as InvalidInput.
        self.inner.read(buf).map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput => io::Error::new(io::ErrorKind::InvalidData, e),
            _ => e,
        })
    }
}

/// zlib encoder options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibOptions {
    /// Compression level (0-9, default 6).
    pub level: u32,
}

impl Default for ZlibOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl ZlibOptions {
    /// Creates options with the given level, clamped to 9.
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

/// Compresses a whole buffer into a new zlib stream.
pub fn compress(data: &[u8], options: ZlibOptions) -> io::Result<Vec<u8>> {
    let mut encoder = FlateEncoder::new(
        Vec::with_capacity(data.len() / 2 + 16),
        Compression::new(options.level),
    );
    encoder.write_all(data)?;
    encoder.finish()
}
