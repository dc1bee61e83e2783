//! Repository facade: one working tree plus its `.dvc` metadata directory
//!
//! Layout on disk:
//! ```text
//! {work_dir}/.dvc/
//!   commits/{hash}              commit objects (bincode)
//!   blobs/{hash}                blob objects (bincode)
//!   branches/{name}.json        branch head and ancestor set
//!   HEAD                        name of the current branch
//!   index.json                  staging area
//!   remotes/{name}/remote.json  configured remotes
//!   config.json                 RepoConfig
//!   metadata.json               repository uuid and creation time
//!   sync-log/{seq}.json         push/fetch records
//! ```
//!
//! Every operation loads the state it needs, mutates it and writes it back;
//! nothing is cached between calls.

use std::fs;
use std::path::{Path, PathBuf};

use crate::branch::{Branch, BranchStore, REMOTE_SEPARATOR, tracking_name, validate_name};
use crate::config::{METADATA_DIR, RepoConfig, RepositoryMetadata};
use crate::error::{Error, Result};
use crate::graph;
use crate::merge::{MergeContext, MergeOutcome};
use crate::object::{Blob, Commit, ObjectId};
use crate::remote::{self, Remote, RemoteStore, SyncOutcome};
use crate::staging::{Index, StagingArea};
use crate::storage::{DiskObjectStore, ObjectStore};
use crate::sync_log::{Direction, SyncLog, SyncLogEntry};
use crate::worktree::{self, DiskWorkTree, WorkingTree, normalize_path};

const INDEX_FILE: &str = "index.json";

/// How a tracked or staged file differs from the working tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    Modified,
    Deleted,
}

impl std::fmt::Display for FileChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileChange::Modified => write!(f, "modified"),
            FileChange::Deleted => write!(f, "deleted"),
        }
    }
}

/// Snapshot of branch, staging and working tree state; every list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub current_branch: String,
    pub branches: Vec<String>,
    pub staged: Vec<String>,
    pub removed: Vec<String>,
    pub not_staged: Vec<(String, FileChange)>,
    pub untracked: Vec<String>,
}

/// Result of `pull`: the fetch, then the merge of the tracking branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullOutcome {
    pub fetch: SyncOutcome,
    pub merge: MergeOutcome,
}

pub struct Repository {
    work_dir: PathBuf,
    meta_dir: PathBuf,
    objects: DiskObjectStore,
    branches: BranchStore,
    remotes: RemoteStore,
    tree: DiskWorkTree,
    config: RepoConfig,
}

impl Repository {
    /// Create a repository in `work_dir` with the default configuration
    pub fn init(work_dir: &Path) -> Result<Self> {
        Self::init_with_config(work_dir, RepoConfig::default())
    }

    /// Create the metadata directory, the root commit and the default branch
    pub fn init_with_config(work_dir: &Path, config: RepoConfig) -> Result<Self> {
        let meta_dir = work_dir.join(METADATA_DIR);
        if meta_dir.exists() {
            return Err(Error::AlreadyInitialized(work_dir.to_path_buf()));
        }
        validate_name(&config.default_branch)?;
        fs::create_dir_all(&meta_dir)?;

        let objects = DiskObjectStore::open(&meta_dir)?;
        let branches = BranchStore::new(&meta_dir);
        branches.init()?;
        config.save(&meta_dir)?;
        RepositoryMetadata::new().save(&meta_dir)?;
        Index::new().save(&meta_dir.join(INDEX_FILE))?;

        let root = objects.put_commit(&Commit::initial())?;
        branches.create(&Branch::rooted(config.default_branch.as_str(), root))?;
        branches.set_current(&config.default_branch)?;

        tracing::info!(
            "Initialized repository at {:?} on {} ({})",
            work_dir,
            config.default_branch,
            root.short()
        );
        Ok(Self::assemble(work_dir, meta_dir, objects, branches, config))
    }

    /// Open the repository whose working tree is `work_dir`
    pub fn open(work_dir: &Path) -> Result<Self> {
        let meta_dir = work_dir.join(METADATA_DIR);
        if !meta_dir.join("HEAD").is_file() {
            return Err(Error::NotInitialized(work_dir.to_path_buf()));
        }
        let objects = DiskObjectStore::open(&meta_dir)?;
        let branches = BranchStore::new(&meta_dir);
        let config = RepoConfig::load(&meta_dir)?;
        Ok(Self::assemble(work_dir, meta_dir, objects, branches, config))
    }

    fn assemble(
        work_dir: &Path,
        meta_dir: PathBuf,
        objects: DiskObjectStore,
        branches: BranchStore,
        config: RepoConfig,
    ) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            remotes: RemoteStore::new(&meta_dir),
            tree: DiskWorkTree::new(work_dir, METADATA_DIR),
            meta_dir,
            objects,
            branches,
            config,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn objects(&self) -> &DiskObjectStore {
        &self.objects
    }

    pub fn metadata(&self) -> Result<Option<RepositoryMetadata>> {
        Ok(RepositoryMetadata::load(&self.meta_dir)?)
    }

    pub fn current_branch(&self) -> Result<Branch> {
        self.branches.current()
    }

    pub fn branch_named(&self, name: &str) -> Result<Branch> {
        self.branches.load(name)
    }

    pub fn head_commit(&self) -> Result<(ObjectId, Commit)> {
        let branch = self.current_branch()?;
        let commit = self.objects.get_commit(&branch.head)?;
        Ok((branch.head, commit))
    }

    pub fn index(&self) -> Result<Index> {
        Index::load(&self.meta_dir.join(INDEX_FILE))
    }

    fn save_index(&self, index: &Index) -> Result<()> {
        index.save(&self.meta_dir.join(INDEX_FILE))
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Stage the working copy of `path`.
    ///
    /// A pending removal is cancelled. When the head already tracks identical
    /// content, any pending addition is dropped instead.
    pub fn add(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        if !self.tree.exists(&path) {
            return Err(Error::FileNotFound(path));
        }
        let blob = Blob::new(path.as_str(), self.tree.read(&path)?);
        let (_, head) = self.head_commit()?;
        let mut index = self.index()?;

        if head.blob_for(&path) == Some(&blob.id()) {
            index.unstage(&path);
            tracing::debug!("{} matches head, unstaged", path);
        } else {
            let id = self.objects.put_blob(&blob)?;
            index.stage_add(&path, id);
            tracing::debug!("Staged {} as {}", path, id.short());
        }
        self.save_index(&index)
    }

    /// Commit the staging area on the current branch
    pub fn commit(&mut self, message: &str) -> Result<ObjectId> {
        if message.trim().is_empty() {
            return Err(Error::EmptyMessage);
        }
        let mut branch = self.current_branch()?;
        let mut index = self.index()?;
        let id = graph::commit_to_branch(
            &self.objects,
            &mut branch,
            &mut index,
            message,
            None,
            Self::now(),
        )?;
        self.branches.save(&branch)?;
        self.save_index(&index)?;
        tracing::info!("[{} {}] {}", branch.name, id.short(), message);
        Ok(id)
    }

    /// Unstage `path`; if the head tracks it, stage its removal and delete
    /// the working copy.
    pub fn rm(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let (_, head) = self.head_commit()?;
        let mut index = self.index()?;

        let was_staged = index.unstage(&path);
        let tracked = head.tracks(&path);
        if !was_staged && !tracked {
            return Err(Error::NothingToRemove(path));
        }
        if tracked {
            index.stage_remove(&path);
            self.tree.delete(&path)?;
        }
        self.save_index(&index)
    }

    /// First-parent history of the current branch, newest first
    pub fn log(&self) -> Result<Vec<(ObjectId, Commit)>> {
        let branch = self.current_branch()?;
        graph::log(&self.objects, branch.head).collect()
    }

    /// Every commit in the store
    pub fn global_log(&self) -> Result<Vec<(ObjectId, Commit)>> {
        graph::all_commits(&self.objects)
    }

    pub fn find(&self, message: &str) -> Result<Vec<ObjectId>> {
        graph::find_by_message(&self.objects, message)
    }

    pub fn resolve_commit(&self, prefix: &str) -> Result<ObjectId> {
        graph::resolve_commit(&self.objects, prefix)
    }

    pub fn status(&self) -> Result<Status> {
        let current = self.branches.current_name()?;
        let (_, head) = self.head_commit()?;
        let index = self.index()?;
        let adds = index.pending_adds();
        let removes = index.pending_removes();

        let mut not_staged = std::collections::BTreeMap::new();
        for (path, tracked) in &head.files {
            if !self.tree.exists(path) {
                if !removes.contains(path) && !adds.contains_key(path) {
                    not_staged.insert(path.clone(), FileChange::Deleted);
                }
            } else if !adds.contains_key(path) && self.working_id(path)? != *tracked {
                not_staged.insert(path.clone(), FileChange::Modified);
            }
        }
        for (path, staged) in adds {
            if !self.tree.exists(path) {
                not_staged.insert(path.clone(), FileChange::Deleted);
            } else if self.working_id(path)? != *staged {
                not_staged.insert(path.clone(), FileChange::Modified);
            }
        }

        let untracked = self
            .tree
            .files()?
            .into_iter()
            .filter(|path| !head.tracks(path) && !adds.contains_key(path))
            .collect();

        Ok(Status {
            branches: self.branches.list()?,
            current_branch: current,
            staged: adds.keys().cloned().collect(),
            removed: removes.iter().cloned().collect(),
            not_staged: not_staged.into_iter().collect(),
            untracked,
        })
    }

    /// Blob id the working copy of `path` would get if staged
    fn working_id(&self, path: &str) -> Result<ObjectId> {
        Ok(Blob::new(path, self.tree.read(path)?).id())
    }

    /// Create a branch at the current head
    pub fn branch(&mut self, name: &str) -> Result<()> {
        // `<remote>/<branch>` names belong to fetch
        if name.contains(REMOTE_SEPARATOR) {
            return Err(Error::InvalidBranchName(name.to_string()));
        }
        let current = self.current_branch()?;
        self.branches.create(&current.fork(name))?;
        tracing::info!("Created branch {} at {}", name, current.head.short());
        Ok(())
    }

    pub fn rm_branch(&mut self, name: &str) -> Result<()> {
        if self.branches.current_name()? == name {
            return Err(Error::RemoveCurrentBranch(name.to_string()));
        }
        self.branches.delete(name)
    }

    /// Switch to `name`, replacing the tracked files with its snapshot
    pub fn checkout_branch(&mut self, name: &str) -> Result<()> {
        let target = self.branches.load(name)?;
        if self.branches.current_name()? == name {
            return Err(Error::AlreadyOnBranch(name.to_string()));
        }
        let (_, head) = self.head_commit()?;
        let to = self.objects.get_commit(&target.head)?;
        worktree::switch_snapshot(&self.objects, &mut self.tree, &head, &to)?;

        self.save_index(&Index::new())?;
        self.branches.set_current(name)?;
        tracing::info!("Switched to branch {}", name);
        Ok(())
    }

    /// Restore `path` from the head commit
    pub fn checkout_file(&mut self, path: &str) -> Result<()> {
        let (id, _) = self.head_commit()?;
        self.restore_file(&id, path)
    }

    /// Restore `path` from the commit identified by `commit_prefix`
    pub fn checkout_file_at(&mut self, commit_prefix: &str, path: &str) -> Result<()> {
        let id = self.resolve_commit(commit_prefix)?;
        self.restore_file(&id, path)
    }

    fn restore_file(&mut self, commit_id: &ObjectId, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        let commit = self.objects.get_commit(commit_id)?;
        let blob_id = commit.blob_for(&path).ok_or_else(|| Error::FileNotInCommit {
            commit: commit_id.to_hex(),
            path: path.clone(),
        })?;
        let blob = self.objects.get_blob(blob_id)?;
        self.tree.write(&path, &blob.content)?;
        tracing::debug!("Restored {} from {}", path, commit_id.short());
        Ok(())
    }

    /// Check out an arbitrary commit and move the current branch to it
    pub fn reset(&mut self, commit_prefix: &str) -> Result<ObjectId> {
        let id = self.resolve_commit(commit_prefix)?;
        let mut branch = self.current_branch()?;
        let head = self.objects.get_commit(&branch.head)?;
        let target = self.objects.get_commit(&id)?;
        worktree::switch_snapshot(&self.objects, &mut self.tree, &head, &target)?;

        branch.reset_to(id, graph::ancestors_of(&self.objects, &id)?);
        self.branches.save(&branch)?;
        self.save_index(&Index::new())?;
        tracing::info!("Reset {} to {}", branch.name, id.short());
        Ok(id)
    }

    /// Merge the branch `name` into the current branch
    pub fn merge(&mut self, name: &str) -> Result<MergeOutcome> {
        let mut index = self.index()?;
        if !index.is_empty() {
            return Err(Error::UncommittedChanges);
        }
        let given = self.branches.load(name)?;
        let mut current = self.current_branch()?;

        let outcome = MergeContext {
            store: &self.objects,
            tree: &mut self.tree,
            staging: &mut index,
        }
        .merge(&mut current, &given, Self::now())?;

        self.branches.save(&current)?;
        self.save_index(&index)?;
        Ok(outcome)
    }

    pub fn add_remote(&mut self, name: &str, path: &Path) -> Result<()> {
        self.remotes.add(&Remote::new(name, path))?;
        tracing::info!("Added remote {} -> {:?}", name, path);
        Ok(())
    }

    pub fn rm_remote(&mut self, name: &str) -> Result<()> {
        self.remotes.remove(name)
    }

    pub fn remotes(&self) -> Result<Vec<Remote>> {
        self.remotes
            .list()?
            .iter()
            .map(|name| self.remotes.load(name))
            .collect()
    }

    /// Metadata directory of a configured remote
    fn remote_dir(&self, remote_name: &str) -> Result<PathBuf> {
        self.remotes
            .load(remote_name)?
            .locate(&self.work_dir, METADATA_DIR)
    }

    /// Push the current branch to `branch` on `remote_name`
    pub fn push(&mut self, remote_name: &str, branch: &str) -> Result<SyncOutcome> {
        let result = self.push_inner(remote_name, branch);
        self.record(Direction::Push, remote_name, branch, &result)?;
        result
    }

    fn push_inner(&self, remote_name: &str, branch: &str) -> Result<SyncOutcome> {
        validate_name(branch)?;
        let dir = self.remote_dir(remote_name)?;
        let remote_objects = DiskObjectStore::open(&dir)?;
        let remote_branches = BranchStore::new(&dir);
        let target = if remote_branches.exists(branch) {
            Some(remote_branches.load(branch)?)
        } else {
            None
        };
        let local = self.current_branch()?;

        let outcome = remote::push(
            &self.objects,
            &remote_objects,
            remote_name,
            &local,
            target.as_ref(),
            branch,
        )?;
        remote_branches.save(&outcome.branch)?;
        Ok(outcome)
    }

    /// Fetch `branch` from `remote_name` into the tracking branch
    /// `<remote_name>/<branch>`
    pub fn fetch(&mut self, remote_name: &str, branch: &str) -> Result<SyncOutcome> {
        let result = self.fetch_inner(remote_name, branch);
        self.record(Direction::Fetch, remote_name, branch, &result)?;
        result
    }

    fn fetch_inner(&self, remote_name: &str, branch: &str) -> Result<SyncOutcome> {
        validate_name(branch)?;
        let dir = self.remote_dir(remote_name)?;
        let remote_objects = DiskObjectStore::open(&dir)?;
        let remote_branches = BranchStore::new(&dir);
        if !remote_branches.exists(branch) {
            return Err(Error::RemoteBranchNotFound {
                remote: remote_name.to_string(),
                branch: branch.to_string(),
            });
        }
        let source = remote_branches.load(branch)?;
        let tracking = tracking_name(remote_name, branch);
        let existing = if self.branches.exists(&tracking) {
            Some(self.branches.load(&tracking)?)
        } else {
            None
        };

        let outcome = remote::fetch(
            &self.objects,
            &remote_objects,
            remote_name,
            &source,
            existing.as_ref(),
        )?;
        self.branches.save(&outcome.branch)?;
        Ok(outcome)
    }

    /// Fetch, then merge the tracking branch into the current branch
    pub fn pull(&mut self, remote_name: &str, branch: &str) -> Result<PullOutcome> {
        let fetch = self.fetch(remote_name, branch)?;
        let merge = self.merge(&fetch.branch.name)?;
        Ok(PullOutcome { fetch, merge })
    }

    fn record(
        &self,
        direction: Direction,
        remote_name: &str,
        branch: &str,
        result: &Result<SyncOutcome>,
    ) -> Result<()> {
        if !self.config.sync_log {
            return Ok(());
        }
        let entry = match result {
            Ok(outcome) => SyncLogEntry::succeeded(
                direction,
                remote_name,
                branch,
                outcome.old_head,
                outcome.branch.head,
                &outcome.stats,
            ),
            Err(e) => SyncLogEntry::failed(direction, remote_name, branch, &e.to_string()),
        };
        if let Err(e) = SyncLog::new(&self.meta_dir).append(&entry) {
            tracing::warn!("Failed to record {} in sync log: {:#}", direction, e);
        }
        Ok(())
    }

    pub fn sync_log(&self) -> Result<Vec<SyncLogEntry>> {
        Ok(SyncLog::new(&self.meta_dir).all()?)
    }
}
