//! Archive configuration.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::codec::ZlibOptions;
use crate::codec::zlib::DEFAULT_LEVEL;

static NEXT_ARCHIVE: AtomicU64 = AtomicU64::new(1);

fn generated_name() -> String {
    format!("archive-{}", NEXT_ARCHIVE.fetch_add(1, Ordering::Relaxed))
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

/// Options for an [`Archive`](crate::Archive).
///
/// # Example
///
/// ```rust
/// use ms2archive::ArchiveOptions;
///
/// let options = ArchiveOptions::new()
///     .name("Xml")
///     .level(9)?
///     .max_concurrency(8);
/// assert_eq!(options.level, 9);
/// # Ok::<(), ms2archive::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Name used in log messages.
    pub name: String,
    /// zlib level (0-9) for entries and header sections written by this
    /// archive.
    pub level: u32,
    /// Upper bound on per-entry encoding tasks in flight during
    /// [`save_concurrently`](crate::Archive::save_concurrently).
    pub max_concurrency: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            name: generated_name(),
            level: DEFAULT_LEVEL,
            max_concurrency: default_concurrency(),
        }
    }
}

impl ArchiveOptions {
    /// Creates options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the archive name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the compression level (strict validation).
    ///
    /// Use [`level_clamped`](Self::level_clamped) to clamp instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`](crate::Error::InvalidCompressionLevel)
    /// if level is greater than 9.
    pub fn level(mut self, level: u32) -> crate::Result<Self> {
        if level > 9 {
            return Err(crate::Error::InvalidCompressionLevel { level });
        }
        self.level = level;
        Ok(self)
    }

    /// Sets the compression level, clamping values above 9.
    pub fn level_clamped(mut self, level: u32) -> Self {
        self.level = level.min(9);
        self
    }

    /// Sets the concurrent save task bound. Zero is treated as one.
    pub fn max_concurrency(mut self, tasks: usize) -> Self {
        self.max_concurrency = tasks.max(1);
        self
    }

    pub(crate) fn zlib(&self) -> ZlibOptions {
        ZlibOptions::with_level(self.level)
    }
}
