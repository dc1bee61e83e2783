//! Working directory primitives
//!
//! Paths are relative, `/`-separated strings. The metadata directory is
//! never listed as part of the working tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::object::Commit;
use crate::storage::ObjectStore;

pub trait WorkingTree {
    fn exists(&self, path: &str) -> bool;
    fn read(&self, path: &str) -> Result<Vec<u8>>;
    fn write(&mut self, path: &str, content: &[u8]) -> Result<()>;
    /// Remove a file; removing an absent file is not an error
    fn delete(&mut self, path: &str) -> Result<()>;
    /// Every file in the tree, sorted
    fn files(&self) -> Result<Vec<String>>;
}

/// Working tree backed by a directory on disk
pub struct DiskWorkTree {
    root: PathBuf,
    /// Top-level directory name excluded from listings
    metadata_dir: String,
}

impl DiskWorkTree {
    pub fn new(root: &Path, metadata_dir: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            metadata_dir: metadata_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if prefix.is_empty() && name == self.metadata_dir {
                continue;
            }
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&entry.path(), &rel, out)?;
            } else if file_type.is_file() {
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl WorkingTree for DiskWorkTree {
    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.full_path(path))?)
    }

    fn write(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, content)?;
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        match fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn files(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        self.walk(&self.root, "", &mut out)?;
        out.sort();
        Ok(out)
    }
}

/// In-memory working tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryWorkTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryWorkTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// File content as text, if present
    pub fn text(&self, path: &str) -> Option<String> {
        self.files
            .get(path)
            .map(|c| String::from_utf8_lossy(c).into_owned())
    }
}

impl WorkingTree for MemoryWorkTree {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.to_string()).into()
        })
    }

    fn write(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        self.files.remove(path);
        Ok(())
    }

    fn files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}

/// Normalize a user-supplied path to the relative, `/`-separated form used
/// as a snapshot key. Absolute paths and `..` components are rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidOperands(format!(
                    "path escapes the working tree: {}",
                    path
                )));
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() || path.starts_with('/') {
        return Err(Error::InvalidOperands(format!("invalid path '{}'", path)));
    }
    Ok(parts.join("/"))
}

/// Fail if a file untracked by `from` sits at any path `to` would write
pub fn check_untracked<W: WorkingTree + ?Sized>(
    tree: &W,
    from: &Commit,
    to: &Commit,
) -> Result<()> {
    for path in to.files.keys() {
        if !from.tracks(path) && tree.exists(path) {
            return Err(Error::UntrackedInWay(path.clone()));
        }
    }
    Ok(())
}

/// Move the tree from the `from` snapshot to the `to` snapshot.
///
/// All paths are checked before anything is written, so a refused switch
/// leaves the tree untouched. Files tracked only by `from` are deleted.
pub fn switch_snapshot<S, W>(store: &S, tree: &mut W, from: &Commit, to: &Commit) -> Result<()>
where
    S: ObjectStore + ?Sized,
    W: WorkingTree + ?Sized,
{
    check_untracked(tree, from, to)?;
    for (path, blob_id) in &to.files {
        let blob = store.get_blob(blob_id)?;
        tree.write(path, &blob.content)?;
    }
    for path in from.files.keys() {
        if !to.tracks(path) {
            tree.delete(path)?;
        }
    }
    Ok(())
}
