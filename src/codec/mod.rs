//! Compression stage of the payload pipeline.
//!
//! Entries tagged [`CompressionType::Zlib`](crate::CompressionType::Zlib) and
//! both header-file sections pass through zlib before encryption. Everything
//! else is stored as-is and only bounded to its declared length.

mod copy;
pub mod zlib;

pub use copy::ExactReader;
pub use zlib::{ZlibDecoder, ZlibOptions};
