//! DVC Core Library
//!
//! Core functionality for DVC including:
//! - Object model (Blob, Commit) with SHA-256 content addressing
//! - Object store abstraction (filesystem and in-memory)
//! - Commit graph, branches and the staging area
//! - Three-way merge engine
//! - Push/fetch/pull between repositories on a shared filesystem
//! - Sync log, repository configuration and typed request dispatch

pub mod object;
pub mod storage;
pub mod error;
pub mod branch;
pub mod staging;
pub mod worktree;
pub mod graph;
pub mod merge;
pub mod remote;
pub mod sync_log;
pub mod config;
pub mod repository;
pub mod request;

pub use branch::{Branch, BranchStore};
pub use config::{METADATA_DIR, RepoConfig, RepositoryMetadata};
pub use error::{Error, ErrorKind, Result};
pub use merge::MergeOutcome;
pub use object::{Blob, Commit, Object, ObjectId, ObjectKind};
pub use remote::{Remote, SyncOutcome, TransferStats};
pub use repository::{FileChange, PullOutcome, Repository, Status};
pub use request::{Request, Response, dispatch};
pub use staging::{Index, StagingArea};
pub use storage::{DiskObjectStore, MemoryObjectStore, ObjectStore, StorageError};
pub use sync_log::{Direction, SyncLog, SyncLogEntry};
pub use worktree::{DiskWorkTree, MemoryWorkTree, WorkingTree};
