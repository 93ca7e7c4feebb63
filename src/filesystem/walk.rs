// src/filesystem/walk.rs

//! Directory tree walks over any [`Storage`]
//!
//! The walk keeps an explicit stack of (path, entries, cursor) frames, so tree
//! depth is bounded only by memory. Entries are visited in [`list_dir`]
//! order, directories before the files beside them.

use super::path::{self, join};
use super::{NameFilter, Storage, copy_file, list_dir, make_path};
use crate::error::Result;
use crate::progress::percent_of;

/// Totals for a directory tree (the root itself is not counted)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirInfo {
    pub dir_count: u64,
    pub file_count: u64,
    pub size: u64,
}

/// One step of a tree walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// Entered a directory (its contents follow)
    Dir(String),
    File { path: String, size: u64 },
}

struct Frame {
    path: String,
    entries: Vec<super::DirEntry>,
    cursor: usize,
}

/// Pre-order walk of everything below `root`
pub struct TreeWalk<'a> {
    storage: &'a dyn Storage,
    stack: Vec<Frame>,
}

impl<'a> TreeWalk<'a> {
    pub fn new(storage: &'a dyn Storage, root: &str) -> Result<Self> {
        let entries = list_dir(storage, root, &NameFilter::all())?;
        Ok(Self {
            storage,
            stack: vec![Frame {
                path: root.to_string(),
                entries,
                cursor: 0,
            }],
        })
    }
}

impl Iterator for TreeWalk<'_> {
    type Item = Result<WalkEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.get(frame.cursor).cloned() else {
                self.stack.pop();
                continue;
            };
            frame.cursor += 1;
            let entry_path = join(&frame.path, &entry.name);

            if !entry.is_dir {
                return Some(Ok(WalkEvent::File {
                    path: entry_path,
                    size: entry.size,
                }));
            }

            match list_dir(self.storage, &entry_path, &NameFilter::all()) {
                Ok(entries) => {
                    self.stack.push(Frame {
                        path: entry_path.clone(),
                        entries,
                        cursor: 0,
                    });
                    return Some(Ok(WalkEvent::Dir(entry_path)));
                }
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Count directories, files and bytes below `root`
pub fn dir_info(storage: &dyn Storage, root: &str) -> Result<DirInfo> {
    let mut info = DirInfo::default();
    for event in TreeWalk::new(storage, root)? {
        match event? {
            WalkEvent::Dir(_) => info.dir_count += 1,
            WalkEvent::File { size, .. } => {
                info.file_count += 1;
                info.size += size;
            }
        }
    }
    Ok(info)
}

/// Copy the tree at `src` to `dst`, creating `dst` as needed
///
/// `on_progress(path, total_percent, file_percent)` is called when each
/// directory is created and after every copied block.
pub fn copy_dir(
    storage: &dyn Storage,
    src: &str,
    dst: &str,
    on_progress: &mut dyn FnMut(&str, u32, u32),
) -> Result<()> {
    let info = dir_info(storage, src)?;
    let total = info.dir_count + info.file_count;
    let mut done = 0u64;

    make_path(storage, dst)?;

    for event in TreeWalk::new(storage, src)? {
        match event? {
            WalkEvent::Dir(dir) => {
                on_progress(&dir, percent_of(done, total), 0);
                storage.create_dir(&rebase(&dir, src, dst))?;
                done += 1;
            }
            WalkEvent::File { path: file, .. } => {
                let overall = percent_of(done, total);
                copy_file(storage, &file, &rebase(&file, src, dst), &mut |name, pct| {
                    on_progress(name, overall, pct)
                })?;
                done += 1;
            }
        }
    }

    on_progress(src, percent_of(done, total), 0);
    Ok(())
}

/// Delete a directory tree; deleting `/` empties the root instead
pub fn delete_dir(storage: &dyn Storage, dir: &str) -> Result<()> {
    if path::sanitize(dir)?.as_os_str().is_empty() {
        for entry in list_dir(storage, "/", &NameFilter::all())? {
            let child = join("/", &entry.name);
            if entry.is_dir {
                storage.delete_dir_recursive(&child)?;
            } else {
                storage.delete_file(&child)?;
            }
        }
        return Ok(());
    }
    storage.delete_dir_recursive(dir)
}

/// Re-root `p` (which lies under `from`) beneath `to`
fn rebase(p: &str, from: &str, to: &str) -> String {
    let from = from.trim_end_matches('/');
    let rest = p
        .strip_prefix(from)
        .unwrap_or(p)
        .trim_start_matches('/');
    join(to, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::HostStorage;
    use std::fs;

    fn tree() -> (tempfile::TempDir, HostStorage) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/a/deep/deeper")).unwrap();
        fs::create_dir_all(root.join("src/b")).unwrap();
        fs::write(root.join("src/top.bin"), vec![1u8; 10]).unwrap();
        fs::write(root.join("src/a/one.bin"), vec![2u8; 20]).unwrap();
        fs::write(root.join("src/a/deep/deeper/two.bin"), vec![3u8; 30]).unwrap();
        fs::write(root.join("src/b/three.bin"), vec![4u8; 40]).unwrap();
        let storage = HostStorage::new(root);
        (dir, storage)
    }

    #[test]
    fn test_walk_order() {
        let (_dir, storage) = tree();
        let events: Vec<_> = TreeWalk::new(&storage, "/src")
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        let paths: Vec<String> = events
            .iter()
            .map(|e| match e {
                WalkEvent::Dir(p) => format!("d {}", p),
                WalkEvent::File { path, .. } => format!("f {}", path),
            })
            .collect();
        assert_eq!(
            paths,
            vec![
                "d /src/a",
                "d /src/a/deep",
                "d /src/a/deep/deeper",
                "f /src/a/deep/deeper/two.bin",
                "f /src/a/one.bin",
                "d /src/b",
                "f /src/b/three.bin",
                "f /src/top.bin",
            ]
        );
    }

    #[test]
    fn test_dir_info() {
        let (_dir, storage) = tree();
        let info = dir_info(&storage, "/src").unwrap();
        assert_eq!(
            info,
            DirInfo {
                dir_count: 4,
                file_count: 4,
                size: 100
            }
        );
    }

    #[test]
    fn test_walk_beyond_fixed_depth() {
        let dir = tempfile::tempdir().unwrap();
        let mut deep = dir.path().join("root");
        for i in 0..200 {
            deep = deep.join(format!("d{}", i));
        }
        fs::create_dir_all(&deep).unwrap();
        fs::write(deep.join("leaf.bin"), b"x").unwrap();

        let storage = HostStorage::new(dir.path());
        let info = dir_info(&storage, "/root").unwrap();
        assert_eq!(info.dir_count, 200);
        assert_eq!(info.file_count, 1);
    }

    #[test]
    fn test_copy_dir() {
        let (dir, storage) = tree();
        let mut last_total = 0;
        copy_dir(&storage, "/src", "/backup/copy", &mut |_, total, _| {
            last_total = total
        })
        .unwrap();

        assert_eq!(last_total, 100);
        let root = dir.path();
        assert_eq!(
            fs::read(root.join("backup/copy/a/deep/deeper/two.bin")).unwrap(),
            vec![3u8; 30]
        );
        assert_eq!(fs::read(root.join("backup/copy/top.bin")).unwrap(), vec![1u8; 10]);
        assert_eq!(
            dir_info(&storage, "/backup/copy").unwrap(),
            dir_info(&storage, "/src").unwrap()
        );
    }

    #[test]
    fn test_delete_dir_and_root() {
        let (dir, storage) = tree();
        delete_dir(&storage, "/src/a").unwrap();
        assert!(!dir.path().join("src/a").exists());
        assert!(dir.path().join("src/b").exists());

        fs::write(dir.path().join("loose.bin"), b"x").unwrap();
        delete_dir(&storage, "/").unwrap();
        assert!(dir.path().exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/src/a/b", "/src", "/dst"), "/dst/a/b");
        assert_eq!(rebase("/src/a", "/src/", "/"), "/a");
    }
}
