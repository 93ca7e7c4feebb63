// src/filesystem/mod.rs

//! Storage accessor for the removable medium
//!
//! This module provides:
//! - The [`Storage`] trait: a hierarchical namespace of named byte blobs and
//!   directories (open, create, size, move, delete, enumerate)
//! - [`HostStorage`], which maps the namespace onto a host directory
//! - Helpers layered on any `Storage`: filtered, deterministically ordered
//!   listings, block-wise copies with progress, and tree walks
//!   ([`dir_info`], [`copy_dir`], [`delete_dir`])
//!
//! Every failure is reported as [`Error::Storage`] carrying the
//! [`StorageOp`] and path that failed.

mod host;
pub mod path;
mod walk;

pub use host::HostStorage;
pub use walk::{DirInfo, copy_dir, delete_dir, dir_info};

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::io::{Read, Seek, Write};
use strum_macros::{AsRefStr, Display};

/// Copy buffer size for [`copy_file`]
pub const COPY_BLOCK_SIZE: usize = 512 * 1024;

/// Storage operation named in errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum StorageOp {
    #[strum(serialize = "open")]
    Open,
    #[strum(serialize = "read")]
    Read,
    #[strum(serialize = "write")]
    Write,
    #[strum(serialize = "flush")]
    Flush,
    #[strum(serialize = "seek")]
    Seek,
    #[strum(serialize = "get size of")]
    Size,
    #[strum(serialize = "set size of")]
    SetSize,
    #[strum(serialize = "move")]
    Move,
    #[strum(serialize = "copy")]
    Copy,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "create directory")]
    CreateDir,
    #[strum(serialize = "enumerate")]
    Enumerate,
}

/// Readable, seekable file handle
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Writable file handle
pub trait WriteSeek: Write + Seek + Send {}

impl<T: Write + Seek + Send> WriteSeek for T {}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
        }
    }
}

/// Directories first, then lexicographic by name
pub fn entry_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name))
}

/// Suffix filter for directory listings
///
/// Parsed from `;`-terminated suffix lists such as `".cia;"` or
/// `".txt;.png;"`. An empty filter lists everything. A non-empty filter only
/// applies to files: directories are always listed, and files whose name
/// starts with `.` (resource-fork artefacts other systems leave behind) are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    suffixes: Vec<String>,
}

impl NameFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn parse(spec: &str) -> Self {
        Self {
            suffixes: spec
                .split(';')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Single-extension filter (`".cia"`)
    pub fn extension(ext: &str) -> Self {
        Self::parse(ext)
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn accepts(&self, entry: &DirEntry) -> bool {
        if self.is_empty() || entry.is_dir {
            return true;
        }
        !entry.name.starts_with('.') && self.suffixes.iter().any(|s| entry.name.ends_with(s))
    }
}

/// Hierarchical byte-blob namespace
///
/// Paths are storage paths (see [`path`]). Implementations report failures
/// as [`Error::Storage`].
pub trait Storage {
    /// Open an existing file for reading
    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek>>;

    /// Create (or truncate) a file for writing
    fn create(&self, path: &str) -> Result<Box<dyn WriteSeek>>;

    fn size(&self, path: &str) -> Result<u64>;

    fn set_size(&self, path: &str, size: u64) -> Result<()>;

    fn file_exists(&self, path: &str) -> bool;

    fn dir_exists(&self, path: &str) -> bool;

    /// Move or rename a file or directory
    fn rename(&self, src: &str, dst: &str) -> Result<()>;

    fn delete_file(&self, path: &str) -> Result<()>;

    /// Delete a directory and everything under it
    fn delete_dir_recursive(&self, path: &str) -> Result<()>;

    /// Create one directory; succeeds if it already exists
    fn create_dir(&self, path: &str) -> Result<()>;

    /// Raw, unordered directory contents
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>>;
}

/// Filtered directory listing in directories-first, lexicographic order
pub fn list_dir(storage: &dyn Storage, dir: &str, filter: &NameFilter) -> Result<Vec<DirEntry>> {
    let mut entries: Vec<DirEntry> = storage
        .read_dir(dir)?
        .into_iter()
        .filter(|e| filter.accepts(e))
        .collect();
    entries.sort_by(entry_order);
    Ok(entries)
}

/// Create every directory along `path`
pub fn make_path(storage: &dyn Storage, dir: &str) -> Result<()> {
    let mut current = String::from("/");
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        current = path::join(&current, part);
        storage.create_dir(&current)?;
    }
    Ok(())
}

/// Copy one file block by block
///
/// `on_progress(src, percent)` is invoked after every block. Returns the
/// number of bytes copied.
pub fn copy_file(
    storage: &dyn Storage,
    src: &str,
    dst: &str,
    on_progress: &mut dyn FnMut(&str, u32),
) -> Result<u64> {
    let total = storage.size(src)?;
    let mut input = storage.open_read(src)?;
    let mut output = storage.create(dst)?;
    storage.set_size(dst, total)?;
    // set_size may move the cursor on some hosts
    output
        .seek(std::io::SeekFrom::Start(0))
        .map_err(|e| Error::storage(StorageOp::Seek, dst, e))?;

    let mut buffer = vec![0u8; COPY_BLOCK_SIZE];
    let mut copied = 0u64;

    loop {
        let n = input
            .read(&mut buffer)
            .map_err(|e| Error::storage(StorageOp::Read, src, e))?;
        if n == 0 {
            break;
        }
        output
            .write_all(&buffer[..n])
            .map_err(|e| Error::storage(StorageOp::Write, dst, e))?;
        copied += n as u64;
        on_progress(src, crate::progress::percent_of(copied, total));
    }

    output
        .flush()
        .map_err(|e| Error::storage(StorageOp::Flush, dst, e))?;
    Ok(copied)
}
