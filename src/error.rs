//! Error types for MS2 archive operations.
//!
//! This module provides the [`Error`] enum which represents all possible
//! failure modes when loading, decoding, or saving MS2 archives, along with a
//! convenient [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Errors are
//! grouped into a few families:
//!
//! | Family | Variants | Typical Cause |
//! |--------|----------|---------------|
//! | Format | [`InvalidFormat`], [`UnknownCryptoMode`], [`CryptoModeMismatch`] | Not an archive of the expected mode |
//! | Corruption | [`CorruptArchive`] | Truncated or damaged header/data files |
//! | Lifecycle | [`Disposed`] | Operation on a torn-down archive or entry |
//! | Construction | [`InvalidPath`], [`InvalidCompressionLevel`] | Bad caller input |
//! | Keys | [`KeyBank`], [`KeySlotUnavailable`] | Key material missing or short |
//!
//! ```rust,no_run
//! use ms2archive::{Archive, CryptoRegistry, Error};
//!
//! # async fn run() -> ms2archive::Result<()> {
//! match Archive::open("Xml.m2h", "Xml.m2d", CryptoRegistry::global()).await {
//!     Ok(archive) => println!("{} entries", archive.len()),
//!     Err(Error::UnknownCryptoMode { tag }) => eprintln!("unknown mode tag {tag:#010x}"),
//!     Err(e) if e.is_corruption() => eprintln!("damaged archive: {e}"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`InvalidFormat`]: Error::InvalidFormat
//! [`UnknownCryptoMode`]: Error::UnknownCryptoMode
//! [`CryptoModeMismatch`]: Error::CryptoModeMismatch
//! [`CorruptArchive`]: Error::CorruptArchive
//! [`Disposed`]: Error::Disposed
//! [`InvalidPath`]: Error::InvalidPath
//! [`InvalidCompressionLevel`]: Error::InvalidCompressionLevel
//! [`KeyBank`]: Error::KeyBank
//! [`KeySlotUnavailable`]: Error::KeySlotUnavailable

use std::io;

use crate::format::CryptoMode;

/// The main error type for MS2 archive operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred during file operations.
    ///
    /// This wraps [`std::io::Error`] and is returned when opening, reading,
    /// mapping, or writing the header and data files fails.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive is structurally not what was expected.
    ///
    /// Raised for malformed info lines, wrong field counts, and values that
    /// cannot be represented in the target header layout.
    #[error("Invalid MS2 format: {0}")]
    InvalidFormat(String),

    /// The header file starts with a mode tag that no provider recognizes.
    #[error("Unknown crypto mode tag {tag:#010x}")]
    UnknownCryptoMode {
        /// The raw little-endian tag read from the header file.
        tag: u32,
    },

    /// The header file belongs to a different crypto mode than the archive.
    #[error("Crypto mode mismatch: archive expects {expected}, file is {found}")]
    CryptoModeMismatch {
        /// The mode the archive was configured with.
        expected: CryptoMode,
        /// The mode named by the file's tag.
        found: CryptoMode,
    },

    /// The archive is truncated or its recorded sizes are inconsistent.
    ///
    /// # Recovery
    ///
    /// None. A partially written archive pair (for example after a failed
    /// save) also reports this error when loaded.
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// An operation was attempted on an archive or entry after disposal.
    #[error("{resource} has been disposed")]
    Disposed {
        /// The kind of resource, `"archive"` or `"entry"`.
        resource: &'static str,
    },

    /// An entry path contains characters that cannot form a root folder id.
    ///
    /// Only `[0-9A-Za-z_]` are allowed in the first path segment.
    #[error("Invalid character {invalid:?} in root folder of path '{path}'")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// The first character that was rejected.
        invalid: char,
    },

    /// An entry header names a compression tag this crate does not know.
    #[error("Unsupported compression type: {tag:#010x}")]
    UnsupportedCompression {
        /// The raw compression tag.
        tag: u32,
    },

    /// The key material behind a key bank could not be loaded.
    #[error("Key bank '{source_name}' unavailable: {reason}")]
    KeyBank {
        /// Human-readable name of the backing source.
        source_name: String,
        /// Why materialization failed.
        reason: String,
    },

    /// A key bank slot was never filled because its source was too short.
    #[error("Key slot {slot} of {count} is not populated")]
    KeySlotUnavailable {
        /// The wrapped slot index.
        slot: usize,
        /// Number of slots in the bank.
        count: usize,
    },

    /// Cipher setup failed (wrong key or IV length in a bank).
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// An invalid compression level was provided.
    ///
    /// Compression levels must be in the range 0-9.
    ///
    /// ```rust
    /// use ms2archive::{ArchiveOptions, Error};
    ///
    /// let result = ArchiveOptions::new().level(15);
    /// assert!(matches!(result, Err(Error::InvalidCompressionLevel { level: 15 })));
    /// ```
    #[error("invalid compression level {level}: must be 0-9")]
    InvalidCompressionLevel {
        /// The invalid level that was provided.
        level: u32,
    },
}

impl Error {
    /// Returns `true` if the file is not an archive of the expected format.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_)
                | Error::UnknownCryptoMode { .. }
                | Error::CryptoModeMismatch { .. }
                | Error::UnsupportedCompression { .. }
        )
    }

    /// Returns `true` if this is a data corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CorruptArchive(_))
    }

    /// Returns `true` if the error comes from using a disposed resource.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed { .. })
    }

    /// Creates a CorruptArchive error.
    pub fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptArchive(reason.into())
    }

    /// Classifies an I/O error raised while decoding an archive section.
    ///
    /// Decoding streams report truncation as `UnexpectedEof` and malformed
    /// cipher or zlib data as `InvalidData`; both mean the archive is corrupt.
    /// Anything else stays an I/O error.
    pub(crate) fn from_decode(context: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
                Error::CorruptArchive(format!("{context}: {err}"))
            }
            _ => Error::Io(err),
        }
    }

    /// Wraps a failed blocking task.
    pub(crate) fn task_failed(err: tokio::task::JoinError) -> Self {
        Error::Io(io::Error::other(err))
    }
}

/// A specialized Result type for MS2 archive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_unknown_mode_display() {
        let err = Error::UnknownCryptoMode { tag: 0x1234_5678 };
        assert_eq!(err.to_string(), "Unknown crypto mode tag 0x12345678");
        assert!(err.is_format_error());
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_mode_mismatch_display() {
        let err = Error::CryptoModeMismatch {
            expected: CryptoMode::Ms2f,
            found: CryptoMode::Ns2f,
        };
        let msg = err.to_string();
        assert!(msg.contains("MS2F"));
        assert!(msg.contains("NS2F"));
        assert!(err.is_format_error());
    }

    #[test]
    fn test_decode_classification() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(Error::from_decode("info section", eof).is_corruption());

        let bad = io::Error::new(io::ErrorKind::InvalidData, "bad padding");
        let err = Error::from_decode("header section", bad);
        assert!(err.is_corruption());
        assert!(err.to_string().contains("header section"));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            Error::from_decode("data", denied),
            Error::Io(_)
        ));
    }

    #[test]
    fn test_disposed() {
        let err = Error::Disposed { resource: "entry" };
        assert_eq!(err.to_string(), "entry has been disposed");
        assert!(err.is_disposed());
    }

    #[test]
    fn test_invalid_path() {
        let err = Error::InvalidPath {
            path: "Mo-dels/a.bin".into(),
            invalid: '-',
        };
        assert!(err.to_string().contains("'-'"));
        assert!(err.to_string().contains("Mo-dels/a.bin"));
    }
}
