//! Staging area: pending additions and removals consumed by the next commit

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::object::ObjectId;

/// Contract the commit and merge logic drive
///
/// The two path sets are kept disjoint: staging a path for one side drops it
/// from the other.
pub trait StagingArea {
    fn stage_add(&mut self, path: &str, blob: ObjectId);
    fn stage_remove(&mut self, path: &str);
    /// Drop any pending change to `path`; returns whether one existed
    fn unstage(&mut self, path: &str) -> bool;
    fn pending_adds(&self) -> &BTreeMap<String, ObjectId>;
    fn pending_removes(&self) -> &BTreeSet<String>;
    fn clear(&mut self);

    fn is_empty(&self) -> bool {
        self.pending_adds().is_empty() && self.pending_removes().is_empty()
    }
}

/// In-memory staging state, persisted as `index.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default)]
    adds: BTreeMap<String, ObjectId>,
    #[serde(default)]
    removes: BTreeSet<String>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the index file, or an empty index if none exists
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save atomically via temp file
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp_path: PathBuf = path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl StagingArea for Index {
    fn stage_add(&mut self, path: &str, blob: ObjectId) {
        self.removes.remove(path);
        self.adds.insert(path.to_string(), blob);
    }

    fn stage_remove(&mut self, path: &str) {
        self.adds.remove(path);
        self.removes.insert(path.to_string());
    }

    fn unstage(&mut self, path: &str) -> bool {
        let added = self.adds.remove(path).is_some();
        let removed = self.removes.remove(path);
        added || removed
    }

    fn pending_adds(&self) -> &BTreeMap<String, ObjectId> {
        &self.adds
    }

    fn pending_removes(&self) -> &BTreeSet<String> {
        &self.removes
    }

    fn clear(&mut self) {
        self.adds.clear();
        self.removes.clear();
    }
}
