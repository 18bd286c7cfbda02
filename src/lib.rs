//! # ms2archive
//!
//! A Rust library for reading and writing MS2 archive pairs.
//!
//! An MS2 archive is two files: a small header file (`.m2h`) holding the
//! encrypted entry index, and a data file (`.m2d`) holding the encrypted,
//! optionally zlib-compressed payload of every entry back to back. Four
//! historical format modes exist (`MS2F`, `NS2F`, `OS2F`, `PS2F`), each with
//! its own header layout and its own AES key tables.
//!
//! ## Quick Start
//!
//! ### Reading an Archive
//!
//! ```rust,no_run
//! use ms2archive::{Archive, CryptoRegistry, Result};
//!
//! # async fn run() -> Result<()> {
//! // The mode is detected from the header file.
//! let archive = Archive::open("Xml.m2h", "Xml.m2d", CryptoRegistry::global()).await?;
//!
//! for entry in archive.entries() {
//!     println!("{:>6} {}", entry.id(), entry.name());
//! }
//!
//! if let Some(entry) = archive.get(1) {
//!     let content = entry.read_to_vec()?;
//!     println!("{} bytes", content.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use ms2archive::{Archive, CompressionType, CryptoMode, CryptoRegistry, Entry, EntryInfo, Result};
//!
//! # async fn run() -> Result<()> {
//! let repository = CryptoRegistry::global().get(CryptoMode::Ns2f).expect("registered");
//! let archive = Archive::new(repository.clone());
//!
//! let info = EntryInfo::new("1", "Xml/item.xml")?;
//! archive.add(Entry::from_bytes(repository, info, CompressionType::Zlib, &b"<item/>"[..])?);
//!
//! archive.save_concurrently("Out.m2h", "Out.m2d").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Material
//!
//! Key and IV tables are not part of this crate. [`CryptoRegistry::global`]
//! reads them on first use from the directory named by the
//! `MS2ARCHIVE_KEY_DIR` environment variable (default `./keys`), which holds
//! `<MODE>_Key` and `<MODE>_IV` files such as `NS2F_Key`. Use
//! [`CryptoRegistry::from_key_store`] or [`KeySource::Bytes`] to supply them
//! another way.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never
//! installs a logger itself.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod archive;
mod blob;
pub mod codec;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod format;
pub mod options;

pub use archive::Archive;
pub use crypto::{CryptoRegistry, CryptoRepository, KeyBank, KeySource, KeyStore};
pub use entry::Entry;
pub use error::{Error, Result};
pub use format::{CompressionType, CryptoMode, EntryHeader, EntryInfo, SizeTriple};
pub use options::ArchiveOptions;
