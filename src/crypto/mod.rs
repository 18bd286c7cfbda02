//! Per-mode encryption for MS2 archives.
//!
//! Every payload (entry data, the info section, the header section) goes
//! through the same pipeline:
//!
//! - optional zlib compression
//! - AES-256-CBC with PKCS#7 padding
//!
//! Each [`CryptoMode`](crate::CryptoMode) owns one [`KeyBank`] of 128 keys and
//! one of 128 IVs. The slot used for a payload is its decoded length modulo
//! the bank size, so encryption and decryption agree on it without storing
//! anything extra.
//!
//! # Key material
//!
//! Keys are not shipped with this crate. A [`KeyStore`] points at a directory
//! holding `<TAG>_Key` and `<TAG>_IV` files for each mode (for example
//! `MS2F_Key`, `MS2F_IV`); [`CryptoRegistry::global`] uses the directory named
//! by `MS2ARCHIVE_KEY_DIR`.

mod aes;
mod key_bank;
mod repository;

pub use aes::{Aes256CbcDecoder, Aes256CbcEncoder};
pub use key_bank::{KeyBank, KeySource};
pub use repository::{CryptoRegistry, CryptoRepository, KeyStore};

/// Number of slots in every key and IV bank.
pub const KEY_COUNT: usize = 128;

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

/// CBC IV length in bytes.
pub const IV_SIZE: usize = 16;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;
