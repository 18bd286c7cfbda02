//! AES-256-CBC streams with PKCS#7 padding.

use std::io::{self, Read, Write};

use aes::Aes256;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use super::{BLOCK_SIZE, IV_SIZE, KEY_SIZE};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

// Multiple of BLOCK_SIZE.
const CHUNK_SIZE: usize = 4096;

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Decrypts exactly `encoded` ciphertext bytes of a stream.
///
/// Padding is stripped from the final block and the unpadded length must
/// equal `plain_len`. Nothing past the ciphertext is read from the source.
pub struct Aes256CbcDecoder<R> {
    inner: R,
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
    remaining: u64,
    plain_len: u64,
    produced: u64,
    buffer: Vec<u8>,
    pos: usize,
}

impl<R> std::fmt::Debug for Aes256CbcDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256CbcDecoder")
            .field("remaining", &self.remaining)
            .field("plain_len", &self.plain_len)
            .finish_non_exhaustive()
    }
}

impl<R: Read> Aes256CbcDecoder<R> {
    /// Creates a decoder with explicit key and IV.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::InvalidData`] if `encoded` is zero or not a
    /// multiple of the block size.
    pub fn with_key_iv(
        input: R,
        key: [u8; KEY_SIZE],
        iv: [u8; IV_SIZE],
        encoded: u64,
        plain_len: u64,
    ) -> io::Result<Self> {
        if encoded == 0 || encoded % BLOCK_SIZE as u64 != 0 {
            return Err(invalid_data(format!(
                "encoded length {encoded} is not a positive multiple of {BLOCK_SIZE}"
            )));
        }
        Ok(Self {
            inner: input,
            key,
            iv,
            remaining: encoded,
            plain_len,
            produced: 0,
            buffer: Vec::new(),
            pos: 0,
        })
    }

    fn decrypt_chunk(&mut self) -> io::Result<()> {
        let len = self.remaining.min(CHUNK_SIZE as u64) as usize;
        let mut chunk = vec![0u8; len];
        self.inner.read_exact(&mut chunk)?;
        self.remaining -= len as u64;

        let mut next_iv = [0u8; IV_SIZE];
        next_iv.copy_from_slice(&chunk[len - BLOCK_SIZE..]);

        Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut chunk)
            .map_err(|e| invalid_data(e.to_string()))?;
        self.iv = next_iv;

        if self.remaining == 0 {
            let unpadded = strip_padding(&chunk)?;
            chunk.truncate(unpadded);
        }

        self.produced += chunk.len() as u64;
        if self.produced > self.plain_len
            || (self.remaining == 0 && self.produced != self.plain_len)
        {
            return Err(invalid_data(format!(
                "decrypted length does not match the recorded {} bytes",
                self.plain_len
            )));
        }

        self.buffer = chunk;
        self.pos = 0;
        Ok(())
    }
}

fn strip_padding(block: &[u8]) -> io::Result<usize> {
    let pad = block.last().copied().unwrap_or(0) as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > block.len() {
        return Err(invalid_data("bad padding"));
    }
    let body = block.len() - pad;
    if block[body..].iter().any(|&b| b as usize != pad) {
        return Err(invalid_data("bad padding"));
    }
    Ok(body)
}

impl<R: Read> Read for Aes256CbcDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.buffer.len() {
            if self.remaining == 0 {
                return Ok(0);
            }
            self.decrypt_chunk()?;
        }

        let available = &self.buffer[self.pos..];
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.pos += to_copy;
        Ok(to_copy)
    }
}

/// AES-256-CBC encoder for writing encrypted streams.
///
/// Call [`finish`](Self::finish) to pad and flush the last block.
pub struct Aes256CbcEncoder<W> {
    inner: W,
    buffer: Vec<u8>,
    key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
    written: u64,
}

impl<W> std::fmt::Debug for Aes256CbcEncoder<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256CbcEncoder")
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> Aes256CbcEncoder<W> {
    /// Creates an encoder with explicit key and IV.
    pub fn with_key_iv(output: W, key: [u8; KEY_SIZE], iv: [u8; IV_SIZE]) -> Self {
        Self {
            inner: output,
            buffer: Vec::new(),
            key,
            iv,
            written: 0,
        }
    }

    fn encrypt_blocks(&mut self, len: usize) -> io::Result<()> {
        if len == 0 {
            return Ok(());
        }
        let mut blocks: Vec<u8> = self.buffer.drain(..len).collect();
        let encrypted = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut blocks, len)
            .map_err(|e| invalid_data(e.to_string()))?;
        self.iv.copy_from_slice(&encrypted[len - BLOCK_SIZE..]);
        self.inner.write_all(encrypted)?;
        self.written += len as u64;
        Ok(())
    }

    /// Pads the buffered tail, encrypts it and returns the output with the
    /// total ciphertext length.
    pub fn finish(mut self) -> io::Result<(W, u64)> {
        let whole = self.buffer.len() / BLOCK_SIZE * BLOCK_SIZE;
        self.encrypt_blocks(whole)?;

        let pad_len = BLOCK_SIZE - self.buffer.len();
        self.buffer
            .extend(std::iter::repeat_n(pad_len as u8, pad_len));
        self.encrypt_blocks(BLOCK_SIZE)?;

        self.inner.flush()?;
        Ok((self.inner, self.written))
    }
}

impl<W: Write> Write for Aes256CbcEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= CHUNK_SIZE {
            let whole = self.buffer.len() / BLOCK_SIZE * BLOCK_SIZE;
            self.encrypt_blocks(whole)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let whole = self.buffer.len() / BLOCK_SIZE * BLOCK_SIZE;
        self.encrypt_blocks(whole)?;
        self.inner.flush()
    }
}
