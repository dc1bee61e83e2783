//! Branches: named, mutable pointers into the immutable commit graph
//!
//! A branch caches the transitive closure of its head over parent edges so
//! that ancestry questions (split-point search, push preconditions) are set
//! lookups instead of graph walks. Branches hold ids only, never commit
//! objects, so the commit DAG is reached through the object store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::object::ObjectId;

/// Separator between remote name and branch name in tracking branches
pub const REMOTE_SEPARATOR: char = '/';

/// A named pointer to a commit plus its cached ancestor set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub head: ObjectId,
    /// Every commit reachable from `head`, including `head` itself
    pub ancestors: BTreeSet<ObjectId>,
}

impl Branch {
    pub fn new(name: impl Into<String>, head: ObjectId, ancestors: BTreeSet<ObjectId>) -> Self {
        Self {
            name: name.into(),
            head,
            ancestors,
        }
    }

    /// Branch whose only commit is `root`
    pub fn rooted(name: impl Into<String>, root: ObjectId) -> Self {
        Self::new(name, root, BTreeSet::from([root]))
    }

    /// New branch sharing this branch's head and history
    pub fn fork(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.head, self.ancestors.clone())
    }

    /// Move the head to a child of the current head. History is append-only,
    /// so the closure only gains the new id.
    pub fn advance(&mut self, id: ObjectId) {
        self.head = id;
        self.ancestors.insert(id);
    }

    /// Add another line of history to the closure (second parent of a merge)
    pub fn absorb(&mut self, ancestors: &BTreeSet<ObjectId>) {
        self.ancestors.extend(ancestors.iter().copied());
    }

    /// Replace head and closure after a non-append move (reset, fast-forward)
    pub fn reset_to(&mut self, head: ObjectId, ancestors: BTreeSet<ObjectId>) {
        self.head = head;
        self.ancestors = ancestors;
    }

    /// Check if `id` is reachable from the head
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.ancestors.contains(id)
    }

    /// Remote-tracking branches are named `<remote>/<branch>`
    pub fn is_remote_tracking(&self) -> bool {
        self.name.contains(REMOTE_SEPARATOR)
    }
}

/// Name of the local branch tracking `branch` on `remote`
pub fn tracking_name(remote: &str, branch: &str) -> String {
    format!("{}{}{}", remote, REMOTE_SEPARATOR, branch)
}

/// Validate a branch name before it becomes a file path
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name.contains("..")
        || name.contains('\\')
        || name.starts_with(REMOTE_SEPARATOR)
        || name.ends_with(REMOTE_SEPARATOR)
        || name.contains("//")
        || name.chars().any(|c| c.is_control() || c.is_whitespace());
    if invalid {
        return Err(Error::InvalidBranchName(name.to_string()));
    }
    Ok(())
}

/// Branch files plus the HEAD pointer of one repository
///
/// Layout on disk:
/// ```text
/// {root}/
///   HEAD                      name of the current branch
///   branches/{name}.json      one file per branch; `/` nests directories
/// ```
pub struct BranchStore {
    root: PathBuf,
}

impl BranchStore {
    const HEAD_FILE: &'static str = "HEAD";
    const BRANCH_DIR: &'static str = "branches";
    const EXTENSION: &'static str = "json";

    /// Attach to the metadata directory `root` without creating anything
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Create the branch directory
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.branch_dir())?;
        Ok(())
    }

    fn branch_dir(&self) -> PathBuf {
        self.root.join(Self::BRANCH_DIR)
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.branch_dir().join(format!("{}.{}", name, Self::EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.branch_path(name).is_file()
    }

    /// Load a branch by name
    pub fn load(&self, name: &str) -> Result<Branch> {
        if !self.exists(name) {
            return Err(Error::BranchNotFound(name.to_string()));
        }
        let data = fs::read_to_string(self.branch_path(name))?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Write a branch, replacing any previous state
    pub fn save(&self, branch: &Branch) -> Result<()> {
        validate_name(&branch.name)?;
        let path = self.branch_path(&branch.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(branch)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Write a branch that must not exist yet
    pub fn create(&self, branch: &Branch) -> Result<()> {
        validate_name(&branch.name)?;
        if self.exists(&branch.name) {
            return Err(Error::BranchExists(branch.name.clone()));
        }
        self.save(branch)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(Error::BranchNotFound(name.to_string()));
        }
        fs::remove_file(self.branch_path(name))?;
        Ok(())
    }

    /// All branch names, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let dir = self.branch_dir();
        if dir.is_dir() {
            collect_names(&dir, "", &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    /// Name of the current branch
    pub fn current_name(&self) -> Result<String> {
        let data = fs::read_to_string(self.root.join(Self::HEAD_FILE))?;
        Ok(data.trim().to_string())
    }

    /// The current branch
    pub fn current(&self) -> Result<Branch> {
        self.load(&self.current_name()?)
    }

    pub fn set_current(&self, name: &str) -> Result<()> {
        fs::write(self.root.join(Self::HEAD_FILE), name)?;
        Ok(())
    }
}

fn collect_names(dir: &Path, prefix: &str, names: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let path = entry.path();
        if path.is_dir() {
            let nested = format!("{}{}{}", prefix, file_name, REMOTE_SEPARATOR);
            collect_names(&path, &nested, names)?;
        } else if let Some(stem) = file_name.strip_suffix(".json") {
            names.push(format!("{}{}", prefix, stem));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn id(n: u8) -> ObjectId {
        ObjectId::new([n; 32])
    }

    #[test]
    fn test_advance_extends_closure() {
        let mut branch = Branch::rooted("master", id(0));
        branch.advance(id(1));
        assert_eq!(branch.head, id(1));
        assert!(branch.contains(&id(0)));
        assert!(branch.contains(&id(1)));
        assert!(!branch.is_remote_tracking());
    }

    #[test]
    fn test_fork_shares_history() {
        let mut master = Branch::rooted("master", id(0));
        master.advance(id(1));
        let feature = master.fork("feature");
        assert_eq!(feature.head, master.head);
        assert_eq!(feature.ancestors, master.ancestors);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("master").is_ok());
        assert!(validate_name("origin/master").is_ok());
        for bad in ["", "../x", "/x", "x/", "a//b", "a b"] {
            let err = validate_name(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidOperands, "{bad:?}");
        }
    }

    #[test]
    fn test_store_roundtrip_and_listing() {
        let tmp = TempDir::new().unwrap();
        let store = BranchStore::new(tmp.path());
        store.init().unwrap();

        let master = Branch::rooted("master", id(0));
        store.create(&master).unwrap();
        store
            .create(&Branch::rooted(tracking_name("origin", "master"), id(0)))
            .unwrap();
        store.set_current("master").unwrap();

        assert_eq!(store.load("master").unwrap(), master);
        assert_eq!(store.current().unwrap(), master);
        assert_eq!(
            store.list().unwrap(),
            vec!["master".to_string(), "origin/master".to_string()]
        );
        assert!(store.load("origin/master").unwrap().is_remote_tracking());
    }

    #[test]
    fn test_store_duplicate_and_missing() {
        let tmp = TempDir::new().unwrap();
        let store = BranchStore::new(tmp.path());
        store.init().unwrap();
        store.create(&Branch::rooted("dev", id(0))).unwrap();

        let dup = store.create(&Branch::rooted("dev", id(1))).unwrap_err();
        assert_eq!(dup.kind(), ErrorKind::AlreadyExists);

        store.delete("dev").unwrap();
        assert_eq!(store.load("dev").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.delete("dev").unwrap_err().kind(), ErrorKind::NotFound);
    }
}
