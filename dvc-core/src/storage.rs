//! Storage abstraction layer for DVC
//!
//! Objects are stored under the SHA-256 of their serialized bytes. A store
//! only grows: there is no delete operation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::object::{Blob, Commit, HEX_LEN, Object, ObjectId, ObjectKind};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: ObjectKind, id: ObjectId },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted {kind} {id}: {reason}")]
    Corrupted {
        kind: ObjectKind,
        id: ObjectId,
        reason: String,
    },
}

impl From<bincode::Error> for StorageError {
    fn from(e: bincode::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Generic object store interface
///
/// `put` is idempotent: storing identical content twice returns the same id
/// and keeps a single copy. Two stores holding an object under the same id
/// hold byte-identical content.
pub trait ObjectStore {
    /// Store serialized object bytes, returning their id
    fn put_raw(&self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId>;

    /// Load serialized object bytes
    fn get_raw(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>>;

    /// Check if object exists
    fn contains(&self, kind: ObjectKind, id: &ObjectId) -> Result<bool>;

    /// List all object ids of one kind, sorted
    fn ids(&self, kind: ObjectKind) -> Result<Vec<ObjectId>>;

    /// Store an object
    fn put(&self, object: &Object) -> Result<ObjectId> {
        let data = object.to_bytes()?;
        self.put_raw(object.kind(), &data)
    }

    /// Load serialized bytes, verifying that they hash to `id`
    fn get_verified(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>> {
        let data = self.get_raw(kind, id)?;
        if ObjectId::from_data(&data) != *id {
            return Err(StorageError::Corrupted {
                kind,
                id: *id,
                reason: "content hash mismatch".to_string(),
            });
        }
        Ok(data)
    }

    /// Load an object
    fn get(&self, kind: ObjectKind, id: &ObjectId) -> Result<Object> {
        let data = self.get_verified(kind, id)?;
        Object::from_bytes(kind, &data).map_err(|e| corrupted(kind, id, e))
    }

    fn put_blob(&self, blob: &Blob) -> Result<ObjectId> {
        self.put_raw(ObjectKind::Blob, &blob.to_bytes()?)
    }

    fn put_commit(&self, commit: &Commit) -> Result<ObjectId> {
        self.put_raw(ObjectKind::Commit, &commit.to_bytes()?)
    }

    fn get_blob(&self, id: &ObjectId) -> Result<Blob> {
        let data = self.get_verified(ObjectKind::Blob, id)?;
        Blob::from_bytes(&data).map_err(|e| corrupted(ObjectKind::Blob, id, e))
    }

    fn get_commit(&self, id: &ObjectId) -> Result<Commit> {
        let data = self.get_verified(ObjectKind::Commit, id)?;
        Commit::from_bytes(&data).map_err(|e| corrupted(ObjectKind::Commit, id, e))
    }

    fn has_commit(&self, id: &ObjectId) -> Result<bool> {
        self.contains(ObjectKind::Commit, id)
    }

    fn has_blob(&self, id: &ObjectId) -> Result<bool> {
        self.contains(ObjectKind::Blob, id)
    }
}

fn corrupted(kind: ObjectKind, id: &ObjectId, e: bincode::Error) -> StorageError {
    StorageError::Corrupted {
        kind,
        id: *id,
        reason: e.to_string(),
    }
}

/// Filesystem object store
///
/// Layout on disk:
/// ```text
/// {root}/
///   commits/{hash}    commit objects (bincode)
///   blobs/{hash}      blob objects (bincode)
/// ```
pub struct DiskObjectStore {
    root: PathBuf,
}

impl DiskObjectStore {
    /// Open or create a store rooted at `root`
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(ObjectKind::Commit.dir_name()))?;
        fs::create_dir_all(root.join(ObjectKind::Blob.dir_name()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, kind: ObjectKind, id: &ObjectId) -> PathBuf {
        self.root.join(kind.dir_name()).join(id.to_hex())
    }
}

impl ObjectStore for DiskObjectStore {
    fn put_raw(&self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        let path = self.object_path(kind, &id);
        if path.exists() {
            return Ok(id); // Already stored (content-addressed = idempotent)
        }
        // Write atomically via temp file
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &path)?;
        Ok(id)
    }

    fn get_raw(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>> {
        let path = self.object_path(kind, id);
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { kind, id: *id })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, kind: ObjectKind, id: &ObjectId) -> Result<bool> {
        Ok(self.object_path(kind, id).is_file())
    }

    fn ids(&self, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.root.join(kind.dir_name()))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            // Skip leftovers of interrupted writes
            if name.len() != HEX_LEN {
                continue;
            }
            if let Ok(id) = ObjectId::from_hex(&name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory object store
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RefCell<HashMap<(ObjectKind, ObjectId), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of all kinds
    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_raw(&self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        self.objects
            .borrow_mut()
            .entry((kind, id))
            .or_insert_with(|| data.to_vec());
        Ok(id)
    }

    fn get_raw(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>> {
        self.objects
            .borrow()
            .get(&(kind, *id))
            .cloned()
            .ok_or(StorageError::NotFound { kind, id: *id })
    }

    fn contains(&self, kind: ObjectKind, id: &ObjectId) -> Result<bool> {
        Ok(self.objects.borrow().contains_key(&(kind, *id)))
    }

    fn ids(&self, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .borrow()
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_disk_put_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = DiskObjectStore::open(tmp.path()).unwrap();
        let blob = Blob::new("a.txt", b"hello".to_vec());

        let id1 = store.put_blob(&blob).unwrap();
        let id2 = store.put_blob(&blob).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id1, blob.id());
        assert_eq!(store.ids(ObjectKind::Blob).unwrap(), vec![id1]);
        assert_eq!(store.get_blob(&id1).unwrap(), blob);
    }

    #[test]
    fn test_disk_get_missing() {
        let tmp = TempDir::new().unwrap();
        let store = DiskObjectStore::open(tmp.path()).unwrap();
        let id = ObjectId::new([9u8; 32]);
        assert!(matches!(
            store.get_commit(&id),
            Err(StorageError::NotFound { kind: ObjectKind::Commit, .. })
        ));
        assert!(!store.has_commit(&id).unwrap());
    }

    #[test]
    fn test_disk_detects_corruption() {
        let tmp = TempDir::new().unwrap();
        let store = DiskObjectStore::open(tmp.path()).unwrap();
        let id = store.put_commit(&Commit::initial()).unwrap();
        fs::write(tmp.path().join("commits").join(id.to_hex()), b"garbage").unwrap();
        assert!(matches!(
            store.get_commit(&id),
            Err(StorageError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_kinds_are_separate() {
        let store = MemoryObjectStore::new();
        let commit = Commit::new("c".into(), 5, None, None, BTreeMap::new());
        let id = store.put_commit(&commit).unwrap();
        assert!(store.has_commit(&id).unwrap());
        assert!(!store.has_blob(&id).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_skip_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = DiskObjectStore::open(tmp.path()).unwrap();
        let id = store.put_commit(&Commit::initial()).unwrap();
        fs::write(tmp.path().join("commits").join("deadbeef.tmp"), b"x").unwrap();
        assert_eq!(store.ids(ObjectKind::Commit).unwrap(), vec![id]);
    }
}
