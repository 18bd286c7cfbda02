//! Entry identity: id, path, and root folder code.
//!
//! The info section of a header file is plain text, one entry per line:
//!
//! ```text
//! 1,Models/a.bin\r\n
//! 2,3563696252,Sound/b.wav\r\n
//! ```
//!
//! Fields are `id[,rootFolderId],path`. The root folder field is written only
//! when it is non-empty.

use std::hash::{Hash, Hasher};
use std::io::{BufRead, Write};

use crate::{Error, Result};

const FIELD_SEPARATOR: char = ',';
const LINE_ENDING: &str = "\r\n";

/// Logical identity of one archive entry.
///
/// Two infos are equal when their `id` and `path` match; the root folder
/// code does not take part in equality.
#[derive(Debug, Clone, Eq)]
pub struct EntryInfo {
    id: String,
    path: String,
    root_folder_id: String,
}

impl EntryInfo {
    /// Creates an info and derives its root folder code from the path.
    ///
    /// Backslashes in `path` are normalized to `/`. The code is derived from
    /// the first directory of the path and is empty for top-level files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if the first path segment contains a
    /// character outside `[0-9A-Za-z_]`.
    pub fn new(id: impl Into<String>, path: impl AsRef<str>) -> Result<Self> {
        let path = normalize_path(path.as_ref());
        let root_folder_id = match root_segment(&path) {
            Some(root) => derive_root_folder_id(root).map_err(|e| match e {
                Error::InvalidPath { invalid, .. } => Error::InvalidPath {
                    path: path.clone(),
                    invalid,
                },
                other => other,
            })?,
            None => String::new(),
        };
        Ok(Self {
            id: id.into(),
            path,
            root_folder_id,
        })
    }

    /// Creates an info with an explicit root folder code, as read from disk.
    pub fn with_root_folder_id(
        id: impl Into<String>,
        root_folder_id: impl Into<String>,
        path: impl AsRef<str>,
    ) -> Self {
        Self {
            id: id.into(),
            path: normalize_path(path.as_ref()),
            root_folder_id: root_folder_id.into(),
        }
    }

    /// Returns the textual id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the `/`-separated path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the root folder code, empty when absent.
    pub fn root_folder_id(&self) -> &str {
        &self.root_folder_id
    }
}

impl PartialEq for EntryInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.path == other.path
    }
}

impl Hash for EntryInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.path.hash(state);
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Returns the root directory of a path, or `None` for top-level files.
fn root_segment(path: &str) -> Option<&str> {
    let (root, _) = path.trim_start_matches('/').split_once('/')?;
    (!root.trim().is_empty()).then_some(root)
}

/// Derives the root folder code of a root directory name.
///
/// Each character is replaced by the decimal value of its distance from
/// `'0'` (`'1'` -> `1`, `'A'` -> `17`, `'a'` -> `49`); underscores pass
/// through.
///
/// ```rust
/// use ms2archive::format::derive_root_folder_id;
///
/// assert_eq!(derive_root_folder_id("A1").unwrap(), "171");
/// assert_eq!(derive_root_folder_id("abc_1").unwrap(), "495051_1");
/// assert!(derive_root_folder_id("a-b").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] for characters outside `[0-9A-Za-z_]`.
pub fn derive_root_folder_id(root: &str) -> Result<String> {
    let mut code = String::with_capacity(root.len() * 2);
    for c in root.chars() {
        match c {
            '_' => code.push(c),
            '0'..='9' | 'A'..='Z' | 'a'..='z' => {
                code.push_str(&(c as u32 - '0' as u32).to_string());
            }
            _ => {
                return Err(Error::InvalidPath {
                    path: root.to_string(),
                    invalid: c,
                });
            }
        }
    }
    Ok(code)
}

/// Reads and writes info section lines.
///
/// The codec is the same for every crypto mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryInfoCodec;

impl EntryInfoCodec {
    /// Reads the next line and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CorruptArchive`] if the section ends early and
    /// [`Error::InvalidFormat`] for a malformed line.
    pub fn read<R: BufRead>(&self, reader: &mut R) -> Result<EntryInfo> {
        let mut line = String::new();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| Error::from_decode("info section", e))?;
        if n == 0 {
            return Err(Error::corrupt("info section ended before the last entry"));
        }
        self.parse_line(line.trim_end_matches(['\r', '\n']))
    }

    /// Parses one line without its terminator.
    ///
    /// Empty fields are skipped, so `7,,a/b` has two fields.
    pub fn parse_line(&self, line: &str) -> Result<EntryInfo> {
        let fields: Vec<&str> = line
            .split(FIELD_SEPARATOR)
            .filter(|field| !field.is_empty())
            .collect();
        match fields.as_slice() {
            [id, path] => Ok(EntryInfo::with_root_folder_id(*id, "", *path)),
            [id, root, path] => Ok(EntryInfo::with_root_folder_id(*id, *root, *path)),
            _ => Err(Error::InvalidFormat(format!(
                "info line has {} fields, expected 2 or 3: {line:?}",
                fields.len()
            ))),
        }
    }

    /// Writes one `\r\n`-terminated line.
    pub fn write<W: Write>(&self, writer: &mut W, info: &EntryInfo) -> Result<()> {
        if info.root_folder_id().trim().is_empty() {
            write!(
                writer,
                "{}{FIELD_SEPARATOR}{}{LINE_ENDING}",
                info.id(),
                info.path()
            )?;
        } else {
            write!(
                writer,
                "{}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{}{LINE_ENDING}",
                info.id(),
                info.root_folder_id(),
                info.path()
            )?;
        }
        Ok(())
    }
}
