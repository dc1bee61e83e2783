//! Sync log: one JSON record per push or fetch
//!
//! Entries live in `{root}/sync-log/` as `{sequence}.json` and list in
//! sequence order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::object::ObjectId;
use crate::remote::TransferStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Push,
    Fetch,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Push => write!(f, "push"),
            Direction::Fetch => write!(f, "fetch"),
        }
    }
}

/// Sync log entry: records one completed or failed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Position in the log, starting at 1.
    #[serde(default)]
    pub sequence: u64,
    pub direction: Direction,
    pub remote: String,
    pub branch: String,
    /// Destination head before the transfer.
    pub old_head: Option<ObjectId>,
    /// Destination head after the transfer.
    pub new_head: Option<ObjectId>,
    pub commits: u64,
    pub blobs: u64,
    pub bytes: u64,
    pub duration_ms: u64,
    /// Unix seconds.
    pub timestamp: i64,
    pub success: bool,
    /// Error message if the transfer failed.
    pub error: Option<String>,
}

impl SyncLogEntry {
    /// Entry for a transfer that finished
    pub fn succeeded(
        direction: Direction,
        remote: &str,
        branch: &str,
        old_head: Option<ObjectId>,
        new_head: ObjectId,
        stats: &TransferStats,
    ) -> Self {
        Self {
            sequence: 0,
            direction,
            remote: remote.to_string(),
            branch: branch.to_string(),
            old_head,
            new_head: Some(new_head),
            commits: stats.commits,
            blobs: stats.blobs,
            bytes: stats.bytes,
            duration_ms: stats.duration_ms,
            timestamp: chrono::Utc::now().timestamp(),
            success: true,
            error: None,
        }
    }

    /// Entry for a transfer that was refused or broke off
    pub fn failed(direction: Direction, remote: &str, branch: &str, error: &str) -> Self {
        Self {
            sequence: 0,
            direction,
            remote: remote.to_string(),
            branch: branch.to_string(),
            old_head: None,
            new_head: None,
            commits: 0,
            blobs: 0,
            bytes: 0,
            duration_ms: 0,
            timestamp: chrono::Utc::now().timestamp(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Manages the sync log of one repository.
pub struct SyncLog {
    log_dir: PathBuf,
}

impl SyncLog {
    pub fn new(root: &Path) -> Self {
        Self {
            log_dir: root.join("sync-log"),
        }
    }

    /// Append an entry, assigning the next sequence number.
    pub fn append(&self, entry: &SyncLogEntry) -> Result<u64> {
        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("Failed to create sync log at {:?}", self.log_dir))?;
        let sequence = self.all()?.last().map(|e| e.sequence).unwrap_or(0) + 1;
        let mut entry = entry.clone();
        entry.sequence = sequence;

        let path = self.log_dir.join(format!("{:08}.json", sequence));
        let data = serde_json::to_string_pretty(&entry)?;
        fs::write(&path, data).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(sequence)
    }

    /// All entries in sequence order. Unreadable files are skipped.
    pub fn all(&self) -> Result<Vec<SyncLogEntry>> {
        if !self.log_dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.log_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Ok(data) = fs::read_to_string(&path)
                && let Ok(log_entry) = serde_json::from_str::<SyncLogEntry>(&data)
            {
                entries.push(log_entry);
            }
        }
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    pub fn latest(&self) -> Result<Option<SyncLogEntry>> {
        Ok(self.all()?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_list_in_order() {
        let tmp = TempDir::new().unwrap();
        let log = SyncLog::new(tmp.path());
        assert!(log.all().unwrap().is_empty());

        let stats = TransferStats {
            commits: 2,
            blobs: 1,
            ..Default::default()
        };
        let head = ObjectId::new([4u8; 32]);
        let first =
            SyncLogEntry::succeeded(Direction::Push, "origin", "master", None, head, &stats);
        let second = SyncLogEntry::failed(
            Direction::Push,
            "origin",
            "master",
            "Please pull down remote changes before pushing.",
        );
        assert_eq!(log.append(&first).unwrap(), 1);
        assert_eq!(log.append(&second).unwrap(), 2);

        let all = log.all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].success);
        assert_eq!(all[0].new_head, Some(head));
        assert_eq!(all[0].commits, 2);
        assert!(!all[1].success);
        assert_eq!(log.latest().unwrap().unwrap().sequence, 2);
    }

    #[test]
    fn test_skips_garbage_files() {
        let tmp = TempDir::new().unwrap();
        let log = SyncLog::new(tmp.path());
        fs::create_dir_all(tmp.path().join("sync-log")).unwrap();
        fs::write(tmp.path().join("sync-log/junk.json"), "not json").unwrap();
        assert!(log.all().unwrap().is_empty());

        let entry = SyncLogEntry::failed(Direction::Fetch, "origin", "dev", "gone");
        log.append(&entry).unwrap();
        fs::write(tmp.path().join("sync-log/notes.txt"), "{}").unwrap();
        let all = log.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].branch, "dev");
    }
}
