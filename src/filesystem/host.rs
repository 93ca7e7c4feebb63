// src/filesystem/host.rs

//! [`Storage`] backed by a directory on the host filesystem

use super::path::resolve;
use super::{DirEntry, ReadSeek, Storage, StorageOp, WriteSeek};
use crate::error::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Storage namespace rooted at a host directory (the medium's mount point)
#[derive(Debug, Clone)]
pub struct HostStorage {
    root: PathBuf,
}

impl HostStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> Result<PathBuf> {
        resolve(&self.root, path)
    }
}

impl Storage for HostStorage {
    fn open_read(&self, path: &str) -> Result<Box<dyn ReadSeek>> {
        let host = self.host_path(path)?;
        let file = File::open(&host).map_err(|e| Error::storage(StorageOp::Open, path, e))?;
        Ok(Box::new(file))
    }

    fn create(&self, path: &str) -> Result<Box<dyn WriteSeek>> {
        let host = self.host_path(path)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&host)
            .map_err(|e| Error::storage(StorageOp::Open, path, e))?;
        Ok(Box::new(file))
    }

    fn size(&self, path: &str) -> Result<u64> {
        let host = self.host_path(path)?;
        fs::metadata(&host)
            .map(|m| m.len())
            .map_err(|e| Error::storage(StorageOp::Size, path, e))
    }

    fn set_size(&self, path: &str, size: u64) -> Result<()> {
        let host = self.host_path(path)?;
        OpenOptions::new()
            .write(true)
            .open(&host)
            .and_then(|f| f.set_len(size))
            .map_err(|e| Error::storage(StorageOp::SetSize, path, e))
    }

    fn file_exists(&self, path: &str) -> bool {
        self.host_path(path).is_ok_and(|p| p.is_file())
    }

    fn dir_exists(&self, path: &str) -> bool {
        self.host_path(path).is_ok_and(|p| p.is_dir())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.host_path(src)?;
        let to = self.host_path(dst)?;
        fs::rename(&from, &to).map_err(|e| Error::storage(StorageOp::Move, src, e))
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        let host = self.host_path(path)?;
        fs::remove_file(&host).map_err(|e| Error::storage(StorageOp::Delete, path, e))
    }

    fn delete_dir_recursive(&self, path: &str) -> Result<()> {
        let host = self.host_path(path)?;
        if host == self.root {
            return Err(Error::InvalidPath(
                "refusing to delete the storage root itself".to_string(),
            ));
        }
        fs::remove_dir_all(&host).map_err(|e| Error::storage(StorageOp::Delete, path, e))
    }

    fn create_dir(&self, path: &str) -> Result<()> {
        let host = self.host_path(path)?;
        if host.is_dir() {
            return Ok(());
        }
        debug!("Creating directory {}", host.display());
        fs::create_dir(&host).map_err(|e| Error::storage(StorageOp::CreateDir, path, e))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let host = self.host_path(path)?;
        let enumerate_err = |e| Error::storage(StorageOp::Enumerate, path, e);

        let mut entries = Vec::new();
        for entry in fs::read_dir(&host).map_err(enumerate_err)? {
            let entry = entry.map_err(enumerate_err)?;
            let metadata = entry.metadata().map_err(enumerate_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(if metadata.is_dir() {
                DirEntry::dir(name)
            } else {
                DirEntry::file(name, metadata.len())
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::{NameFilter, copy_file, list_dir, make_path};
    use std::io::{Read, Write};

    fn scratch() -> (tempfile::TempDir, HostStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = HostStorage::new(dir.path());
        (dir, storage)
    }

    #[test]
    fn test_write_read_size() {
        let (_dir, storage) = scratch();
        storage.create_dir("/updates").unwrap();

        let mut out = storage.create("/updates/a.cia").unwrap();
        out.write_all(b"package bytes").unwrap();
        drop(out);

        assert!(storage.file_exists("/updates/a.cia"));
        assert!(storage.dir_exists("/updates"));
        assert_eq!(storage.size("/updates/a.cia").unwrap(), 13);

        let mut content = String::new();
        storage
            .open_read("/updates/a.cia")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "package bytes");
    }

    #[test]
    fn test_open_missing_reports_operation() {
        let (_dir, storage) = scratch();
        let err = match storage.open_read("/updates/missing.cia") {
            Err(e) => e,
            Ok(_) => panic!("expected open failure"),
        };
        match err {
            Error::Storage { op, path, .. } => {
                assert_eq!(op, StorageOp::Open);
                assert_eq!(path, "/updates/missing.cia");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, storage) = scratch();
        assert!(matches!(
            storage.open_read("/../etc/passwd"),
            Err(Error::PathTraversal(_))
        ));
    }

    #[test]
    fn test_list_dir_filter_and_order() {
        let (dir, storage) = scratch();
        let updates = dir.path().join("updates");
        fs::create_dir_all(updates.join("nested")).unwrap();
        fs::write(updates.join("b.cia"), b"b").unwrap();
        fs::write(updates.join("a.cia"), b"a").unwrap();
        fs::write(updates.join("._a.cia"), b"junk").unwrap();
        fs::write(updates.join("readme.txt"), b"x").unwrap();

        let entries = list_dir(&storage, "/updates", &NameFilter::extension(".cia")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["nested", "a.cia", "b.cia"]);
    }

    #[test]
    fn test_rename_and_delete() {
        let (dir, storage) = scratch();
        fs::write(dir.path().join("a.bin"), b"a").unwrap();

        storage.rename("/a.bin", "/b.bin").unwrap();
        assert!(!storage.file_exists("/a.bin"));
        assert!(storage.file_exists("/b.bin"));

        storage.delete_file("/b.bin").unwrap();
        assert!(!storage.file_exists("/b.bin"));
        assert!(storage.delete_file("/b.bin").is_err());
    }

    #[test]
    fn test_make_path_and_copy() {
        let (dir, storage) = scratch();
        make_path(&storage, "/a/b/c").unwrap();
        assert!(storage.dir_exists("/a/b/c"));
        // idempotent
        make_path(&storage, "/a/b/c").unwrap();

        let data = vec![7u8; COPY_BLOCK_SIZE_TEST];
        fs::write(dir.path().join("src.bin"), &data).unwrap();

        let mut percents = Vec::new();
        let copied = copy_file(&storage, "/src.bin", "/a/b/c/dst.bin", &mut |_, p| {
            percents.push(p)
        })
        .unwrap();

        assert_eq!(copied, data.len() as u64);
        assert_eq!(fs::read(dir.path().join("a/b/c/dst.bin")).unwrap(), data);
        assert_eq!(percents.last(), Some(&100));
    }

    const COPY_BLOCK_SIZE_TEST: usize = crate::filesystem::COPY_BLOCK_SIZE + 17;

    #[test]
    fn test_refuses_to_delete_root() {
        let (_dir, storage) = scratch();
        assert!(storage.delete_dir_recursive("/").is_err());
    }
}
