//! Length-bounded pass-through reader.

use std::io::{self, Read};

/// A reader that yields exactly `size` bytes of its source.
///
/// Bytes past `size` are never read. A source that ends before `size` bytes
/// fails with [`io::ErrorKind::UnexpectedEof`].
pub struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R> std::fmt::Debug for ExactReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExactReader")
            .field("remaining", &self.remaining)
            .finish_non_exhaustive()
    }
}

impl<R: Read> ExactReader<R> {
    /// Creates a reader over the next `size` bytes of `inner`.
    pub fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
        }
    }

    /// Returns how many bytes are still to be produced.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max_read = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = self.inner.read(&mut buf[..max_read])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended {} bytes early", self.remaining),
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
