//! Core object model for DVC
//!
//! Implements content-addressable storage with Blob and Commit objects.
//! Every object is identified by the SHA-256 of its bincode serialization,
//! so identical content always yields an identical id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Message of the distinguished root commit.
pub const INITIAL_COMMIT_MESSAGE: &str = "initial commit";

/// Timestamp of the root commit. Fixed so that independently initialized
/// repositories share the same root hash.
pub const EPOCH_TIMESTAMP: i64 = 0;

/// Length of a full hex-encoded object id.
pub const HEX_LEN: usize = 64;

/// Unique identifier for any stored object
///
/// Binary formats carry the raw 32 bytes; human-readable formats (the JSON
/// state files) carry lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Abbreviated form used in log output
    pub fn short(&self) -> String {
        self.to_hex()[..7].to_string()
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let hex_str = String::deserialize(deserializer)?;
            Self::from_hex(&hex_str).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Contents of one tracked file at one point in history.
///
/// The path is part of the hashed record, so the same bytes under two
/// different paths are two distinct blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Path relative to the working tree root
    pub path: String,
    /// Raw content data
    pub content: Vec<u8>,
}

impl Blob {
    /// Create a new blob
    pub fn new(path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            content,
        }
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&bincode::serialize(self).unwrap_or_default())
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Content interpreted as text, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Commit object: a full snapshot of every tracked path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit message
    pub message: String,
    /// Commit timestamp (Unix seconds, UTC)
    pub timestamp: i64,
    /// First parent; `None` only for the root commit
    pub parent: Option<ObjectId>,
    /// Second parent, present on merge commits
    pub second_parent: Option<ObjectId>,
    /// Path -> blob id. Sorted for deterministic hashing.
    pub files: BTreeMap<String, ObjectId>,
}

impl Commit {
    /// Create a new commit
    pub fn new(
        message: String,
        timestamp: i64,
        parent: Option<ObjectId>,
        second_parent: Option<ObjectId>,
        files: BTreeMap<String, ObjectId>,
    ) -> Self {
        Self {
            message,
            timestamp,
            parent,
            second_parent,
            files,
        }
    }

    /// The root commit every repository starts from
    pub fn initial() -> Self {
        Self::new(
            INITIAL_COMMIT_MESSAGE.to_string(),
            EPOCH_TIMESTAMP,
            None,
            None,
            BTreeMap::new(),
        )
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        ObjectId::from_data(&bincode::serialize(self).unwrap_or_default())
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary format
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Check if this is the root commit (no parents)
    pub fn is_initial(&self) -> bool {
        self.parent.is_none()
    }

    /// Check if this commit joins two lines of history
    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// Parents in traversal order: first parent, then second parent
    pub fn parents(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.parent.iter().chain(self.second_parent.iter()).copied()
    }

    /// Blob tracked at `path`, if any
    pub fn blob_for(&self, path: &str) -> Option<&ObjectId> {
        self.files.get(path)
    }

    /// Check if `path` is tracked by this snapshot
    pub fn tracks(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// Object type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Commit,
}

impl ObjectKind {
    /// Directory name used by on-disk stores
    pub fn dir_name(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blobs",
            ObjectKind::Commit => "commits",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Blob => write!(f, "blob"),
            ObjectKind::Commit => write!(f, "commit"),
        }
    }
}

/// Generic object that can be any type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Commit(Commit),
}

impl Object {
    /// Get the object ID
    pub fn id(&self) -> ObjectId {
        match self {
            Object::Blob(blob) => blob.id(),
            Object::Commit(commit) => commit.id(),
        }
    }

    /// Get the object kind
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Serialize to binary format
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        match self {
            Object::Blob(blob) => blob.to_bytes(),
            Object::Commit(commit) => commit.to_bytes(),
        }
    }

    /// Deserialize an object of a known kind
    pub fn from_bytes(kind: ObjectKind, data: &[u8]) -> Result<Self, bincode::Error> {
        match kind {
            ObjectKind::Blob => Blob::from_bytes(data).map(Object::Blob),
            ObjectKind::Commit => Commit::from_bytes(data).map(Object::Commit),
        }
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Object::Blob(blob)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Object::Commit(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_object_id_roundtrip() {
        let bytes = [42u8; 32];
        let id = ObjectId::new(bytes);
        let hex = id.to_hex();
        assert_eq!(hex.len(), HEX_LEN);
        let id2 = ObjectId::from_hex(&hex).unwrap();
        assert_eq!(id, id2);
        assert_eq!(id.short(), &hex[..7]);
    }

    #[test]
    fn test_object_id_json_is_hex() {
        let id = ObjectId::new([7u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_object_id_rejects_short_hex() {
        assert!(ObjectId::from_hex("abcd").is_err());
    }

    #[test]
    fn test_blob_id_depends_on_path() {
        let a = Blob::new("a.txt", b"same".to_vec());
        let b = Blob::new("b.txt", b"same".to_vec());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), Blob::new("a.txt", b"same".to_vec()).id());
    }

    #[test]
    fn test_initial_commit_is_deterministic() {
        let first = Commit::initial();
        let second = Commit::initial();
        assert_eq!(first.id(), second.id());
        assert!(first.is_initial());
        assert_eq!(first.timestamp, EPOCH_TIMESTAMP);
        assert_eq!(first.message, INITIAL_COMMIT_MESSAGE);
    }

    #[test]
    fn test_commit_parents_order() {
        let p1 = ObjectId::new([1u8; 32]);
        let p2 = ObjectId::new([2u8; 32]);
        let commit = Commit::new("m".into(), 10, Some(p1), Some(p2), BTreeMap::new());
        assert!(commit.is_merge());
        assert_eq!(commit.parents().collect::<Vec<_>>(), vec![p1, p2]);
    }

    #[test]
    fn test_commit_serialization() {
        let mut files = BTreeMap::new();
        files.insert("f.txt".to_string(), ObjectId::new([3u8; 32]));
        let commit = Commit::new(
            "Test message".to_string(),
            1234567890,
            Some(ObjectId::new([2u8; 32])),
            None,
            files,
        );
        let bytes = commit.to_bytes().unwrap();
        let commit2 = Commit::from_bytes(&bytes).unwrap();
        assert_eq!(commit, commit2);
        assert_eq!(commit.id(), commit2.id());
    }

    proptest! {
        #[test]
        fn prop_blob_hash_matches_serialization(
            path in "[a-z]{1,8}\\.txt",
            content in proptest::collection::vec(any::<u8>(), 0..64),
            other in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let a = Blob::new(path.clone(), content.clone());
            let b = Blob::new(path, other.clone());
            prop_assert_eq!(a.id() == b.id(), content == other);
        }
    }
}
