//! Remote synchronization over a shared filesystem
//!
//! Push and fetch copy every commit reachable from a head that the
//! destination lacks, together with the blobs those commits reference.
//! Discovery walks new to old and stops at commits the destination already
//! holds; writes then go old to new, blobs before the commit that names
//! them. A destination therefore only ever holds a commit once its whole
//! history is present, which is what lets the walk stop early. Branch
//! pointers move only after every object is written.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::branch::{Branch, tracking_name};
use crate::error::{Error, Result};
use crate::graph;
use crate::object::{Commit, ObjectId, ObjectKind};
use crate::storage::ObjectStore;

/// Named reference to another repository on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    /// Remote working tree or metadata directory, as given by the user
    pub path: PathBuf,
}

impl Remote {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Locate the remote's metadata directory. Relative paths are taken
    /// from `base`. Accepts either a working tree containing `metadata_dir`
    /// or the metadata directory itself.
    pub fn locate(&self, base: &Path, metadata_dir: &str) -> Result<PathBuf> {
        let path = if self.path.is_absolute() {
            self.path.clone()
        } else {
            base.join(&self.path)
        };
        let nested = path.join(metadata_dir);
        if nested.join(ObjectKind::Commit.dir_name()).is_dir() {
            return Ok(nested);
        }
        if path.join(ObjectKind::Commit.dir_name()).is_dir() {
            return Ok(path);
        }
        Err(Error::RemoteDirNotFound(path))
    }
}

/// Configured remotes of one repository
///
/// Layout on disk:
/// ```text
/// {root}/remotes/{name}/remote.json
/// ```
pub struct RemoteStore {
    dir: PathBuf,
}

impl RemoteStore {
    const REMOTE_DIR: &'static str = "remotes";
    const REMOTE_FILE: &'static str = "remote.json";

    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(Self::REMOTE_DIR),
        }
    }

    fn remote_path(&self, name: &str) -> PathBuf {
        self.dir.join(name).join(Self::REMOTE_FILE)
    }

    pub fn exists(&self, name: &str) -> bool {
        valid_name(name) && self.remote_path(name).is_file()
    }

    pub fn add(&self, remote: &Remote) -> Result<()> {
        if !valid_name(&remote.name) {
            return Err(Error::InvalidOperands(format!(
                "invalid remote name '{}'",
                remote.name
            )));
        }
        if self.exists(&remote.name) {
            return Err(Error::RemoteExists(remote.name.clone()));
        }
        let path = self.remote_path(&remote.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(remote)?)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Remote> {
        if !self.exists(name) {
            return Err(Error::RemoteNotFound(name.to_string()));
        }
        let data = fs::read_to_string(self.remote_path(name))?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(Error::RemoteNotFound(name.to_string()));
        }
        fs::remove_dir_all(self.dir.join(name))?;
        Ok(())
    }

    /// Names of all configured remotes, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if self.exists(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(|c| c.is_control() || c.is_whitespace())
}

/// Statistics from a transfer operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    /// Commits written to the destination.
    pub commits: u64,
    /// Blobs written to the destination.
    pub blobs: u64,
    /// Objects skipped because the destination already had them.
    pub skipped: u64,
    /// Bytes written.
    pub bytes: u64,
    /// Time spent in milliseconds.
    pub duration_ms: u64,
}

impl TransferStats {
    /// Objects written of any kind
    pub fn objects(&self) -> u64 {
        self.commits + self.blobs
    }

    pub fn is_empty(&self) -> bool {
        self.objects() == 0
    }

    /// Format a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Transferred {} commits, {} blobs ({} skipped), {} in {}ms",
            self.commits,
            self.blobs,
            self.skipped,
            format_size(self.bytes),
            self.duration_ms,
        )
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Copy every object reachable from `head` that `dest` lacks.
pub fn copy_history<S, D>(source: &S, dest: &D, head: &ObjectId) -> Result<TransferStats>
where
    S: ObjectStore + ?Sized,
    D: ObjectStore + ?Sized,
{
    let start = Instant::now();
    let mut stats = TransferStats::default();

    // New to old: find the commits the destination is missing
    let mut missing = HashMap::new();
    let mut visited = HashSet::new();
    let mut fringe = VecDeque::from([*head]);
    while let Some(id) = fringe.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        if dest.has_commit(&id)? {
            stats.skipped += 1;
            continue;
        }
        let commit = source.get_commit(&id)?;
        fringe.extend(commit.parents());
        missing.insert(id, commit);
    }

    // Old to new: blobs first, then the commit naming them
    let mut copied_blobs = HashSet::new();
    for id in parents_first(&missing, head) {
        let commit = &missing[&id];
        for blob_id in commit.files.values() {
            if !copied_blobs.insert(*blob_id) {
                continue;
            }
            if dest.has_blob(blob_id)? {
                stats.skipped += 1;
            } else {
                stats.bytes += copy_object(source, dest, ObjectKind::Blob, blob_id)?;
                stats.blobs += 1;
            }
        }
        stats.bytes += copy_object(source, dest, ObjectKind::Commit, &id)?;
        stats.commits += 1;
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    tracing::debug!("Copied history of {}: {}", head.short(), stats.summary());
    Ok(stats)
}

/// Order `commits` so every commit follows its parents (depth-first
/// post-order from `head`). Parents outside `commits` are ignored.
fn parents_first(commits: &HashMap<ObjectId, Commit>, head: &ObjectId) -> Vec<ObjectId> {
    let mut order = Vec::with_capacity(commits.len());
    let mut entered = HashSet::new();
    let mut stack = vec![(*head, false)];
    while let Some((id, finished)) = stack.pop() {
        if finished {
            order.push(id);
            continue;
        }
        let Some(commit) = commits.get(&id) else {
            continue;
        };
        if !entered.insert(id) {
            continue;
        }
        stack.push((id, true));
        stack.extend(
            commit
                .parents()
                .filter(|p| !entered.contains(p))
                .map(|p| (p, false)),
        );
    }
    order
}

fn copy_object<S, D>(source: &S, dest: &D, kind: ObjectKind, id: &ObjectId) -> Result<u64>
where
    S: ObjectStore + ?Sized,
    D: ObjectStore + ?Sized,
{
    let data = source.get_verified(kind, id)?;
    dest.put_raw(kind, &data)?;
    Ok(data.len() as u64)
}

/// Result of a push or fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Branch state to persist at the destination
    pub branch: Branch,
    /// Destination head before the transfer, if the branch existed
    pub old_head: Option<ObjectId>,
    pub stats: TransferStats,
}

/// Push `local` to the branch `target_name` on `remote_name`.
///
/// `target` is the remote branch's current state, `None` when it does not
/// exist yet. A push is accepted only when the remote head is part of the
/// local history; a rejected push writes nothing. The caller persists the
/// returned branch into the remote repository.
pub fn push<L, R>(
    local_store: &L,
    remote_store: &R,
    remote_name: &str,
    local: &Branch,
    target: Option<&Branch>,
    target_name: &str,
) -> Result<SyncOutcome>
where
    L: ObjectStore + ?Sized,
    R: ObjectStore + ?Sized,
{
    if let Some(target) = target {
        if !local.contains(&target.head) {
            return Err(Error::NonFastForward {
                remote: remote_name.to_string(),
                branch: target_name.to_string(),
            });
        }
    }

    let stats = copy_history(local_store, remote_store, &local.head)?;
    let branch = Branch::new(target_name, local.head, local.ancestors.clone());
    tracing::info!(
        "Pushed {} to {}/{} at {}: {}",
        local.name,
        remote_name,
        target_name,
        local.head.short(),
        stats.summary()
    );
    Ok(SyncOutcome {
        branch,
        old_head: target.map(|t| t.head),
        stats,
    })
}

/// Fetch `source` from `remote_name` into the local store.
///
/// The returned tracking branch is named `<remote>/<branch>` and its
/// ancestor set is rebuilt from the local store. `existing` is the current
/// tracking branch, if any.
pub fn fetch<L, R>(
    local_store: &L,
    remote_store: &R,
    remote_name: &str,
    source: &Branch,
    existing: Option<&Branch>,
) -> Result<SyncOutcome>
where
    L: ObjectStore + ?Sized,
    R: ObjectStore + ?Sized,
{
    let stats = copy_history(remote_store, local_store, &source.head)?;
    let ancestors = graph::ancestors_of(local_store, &source.head)?;
    let name = tracking_name(remote_name, &source.name);
    let branch = Branch::new(name, source.head, ancestors);
    tracing::info!(
        "Fetched {}/{} at {}: {}",
        remote_name,
        source.name,
        source.head.short(),
        stats.summary()
    );
    Ok(SyncOutcome {
        branch,
        old_head: existing.map(|b| b.head),
        stats,
    })
}
