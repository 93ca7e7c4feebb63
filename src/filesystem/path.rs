// src/filesystem/path.rs

//! Paths in the storage namespace
//!
//! Storage paths are `/`-separated strings rooted at the removable medium
//! (`/updates/firm.cia`). They are mapped onto the host filesystem under a
//! mount point, and must never escape it.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Append one entry name to a storage directory path
///
/// ```
/// use sysupdater::filesystem::path::join;
///
/// assert_eq!(join("/", "updates"), "/updates");
/// assert_eq!(join("/updates", "firm.cia"), "/updates/firm.cia");
/// ```
pub fn join(dir: &str, name: &str) -> String {
    if dir.len() > 1 {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    } else {
        format!("/{}", name)
    }
}

/// Drop the last component; the parent of a top-level entry is `/`
///
/// ```
/// use sysupdater::filesystem::path::parent;
///
/// assert_eq!(parent("/updates/firm.cia"), "/updates");
/// assert_eq!(parent("/updates"), "/");
/// ```
pub fn parent(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Last component of a storage path
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Convert a storage path into a relative host path, rejecting traversal
///
/// The storage root (`/`, empty) maps to an empty relative path.
pub fn sanitize(path: &str) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in Path::new(path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path.to_string())),
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::InvalidPath(format!(
                    "storage path carries a host prefix: {}",
                    path
                )));
            }
        }
    }

    Ok(normalized)
}

/// Resolve a storage path under a host mount point
pub fn resolve(root: &Path, path: &str) -> Result<PathBuf> {
    let relative = sanitize(path)?;
    let joined = root.join(&relative);

    // Symlinks inside the medium may still point outside of it
    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "{} escapes storage root {}",
            path,
            root.display()
        )));
    }

    Ok(joined)
}
