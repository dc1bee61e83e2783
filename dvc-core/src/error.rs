//! User-facing error taxonomy
//!
//! Every failure path has its own variant carrying the message shown to the
//! user; `Error::kind` folds them onto the closed set of error kinds. None of
//! these are retried: each terminates the current operation.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Closed classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing object, commit, branch, remote or file
    NotFound,
    /// Commit with nothing staged against a non-root parent
    EmptyCommit,
    /// An untracked working file occupies a path that would be overwritten
    UntrackedInWay,
    /// Push target is not an ancestor of the local head
    NonFastForward,
    /// Malformed or meaningless invocation
    InvalidOperands,
    /// Duplicate branch, remote or repository
    AlreadyExists,
    /// Self-merge or merge of an ancestor
    NoOpMerge,
    /// Merge attempted with pending staged changes
    UncommittedChanges,
    /// I/O or decoding failure below the user-facing layer
    Storage,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not in an initialized dvc directory: {0}")]
    NotInitialized(PathBuf),

    #[error("A dvc repository already exists in {0}.")]
    AlreadyInitialized(PathBuf),

    #[error("No commit with that id exists.")]
    CommitNotFound(String),

    #[error("Commit id '{prefix}' is ambiguous ({matches} matches).")]
    AmbiguousCommitId { prefix: String, matches: usize },

    #[error("Found no commit with that message.")]
    NoCommitWithMessage(String),

    #[error("File does not exist.")]
    FileNotFound(String),

    #[error("File does not exist in that commit.")]
    FileNotInCommit { commit: String, path: String },

    #[error("No changes added to the commit.")]
    EmptyCommit,

    #[error("Please enter a commit message.")]
    EmptyMessage,

    #[error("No reason to remove the file.")]
    NothingToRemove(String),

    #[error("A branch with that name already exists.")]
    BranchExists(String),

    #[error("A branch with that name does not exist.")]
    BranchNotFound(String),

    #[error("Invalid branch name '{0}'.")]
    InvalidBranchName(String),

    #[error("Cannot remove the current branch.")]
    RemoveCurrentBranch(String),

    #[error("No need to checkout the current branch.")]
    AlreadyOnBranch(String),

    #[error("There is an untracked file in the way; delete it, or add and commit it first.")]
    UntrackedInWay(String),

    #[error("You have uncommitted changes.")]
    UncommittedChanges,

    #[error("Cannot merge a branch with itself.")]
    SelfMerge(String),

    #[error("Given branch is an ancestor of the current branch.")]
    AlreadyAncestor(String),

    #[error("A remote with that name already exists.")]
    RemoteExists(String),

    #[error("A remote with that name does not exist.")]
    RemoteNotFound(String),

    #[error("Remote directory not found.")]
    RemoteDirNotFound(PathBuf),

    #[error("That remote does not have that branch.")]
    RemoteBranchNotFound { remote: String, branch: String },

    #[error("Please pull down remote changes before pushing.")]
    NonFastForward { remote: String, branch: String },

    #[error("Incorrect operands: {0}")]
    InvalidOperands(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotInitialized(_)
            | Error::CommitNotFound(_)
            | Error::NoCommitWithMessage(_)
            | Error::FileNotFound(_)
            | Error::FileNotInCommit { .. }
            | Error::BranchNotFound(_)
            | Error::RemoteNotFound(_)
            | Error::RemoteDirNotFound(_)
            | Error::RemoteBranchNotFound { .. } => ErrorKind::NotFound,
            Error::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            Error::EmptyCommit => ErrorKind::EmptyCommit,
            Error::UntrackedInWay(_) => ErrorKind::UntrackedInWay,
            Error::NonFastForward { .. } => ErrorKind::NonFastForward,
            Error::EmptyMessage
            | Error::AmbiguousCommitId { .. }
            | Error::NothingToRemove(_)
            | Error::InvalidBranchName(_)
            | Error::RemoveCurrentBranch(_)
            | Error::AlreadyOnBranch(_)
            | Error::InvalidOperands(_) => ErrorKind::InvalidOperands,
            Error::AlreadyInitialized(_) | Error::BranchExists(_) | Error::RemoteExists(_) => {
                ErrorKind::AlreadyExists
            }
            Error::SelfMerge(_) | Error::AlreadyAncestor(_) => ErrorKind::NoOpMerge,
            Error::UncommittedChanges => ErrorKind::UncommittedChanges,
            Error::Storage(_) | Error::Io(_) | Error::Serialization(_) | Error::Other(_) => {
                ErrorKind::Storage
            }
        }
    }

    /// Check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectId, ObjectKind};

    #[test]
    fn test_error_classification() {
        assert_eq!(Error::EmptyCommit.kind(), ErrorKind::EmptyCommit);
        assert_eq!(
            Error::BranchExists("dev".into()).kind(),
            ErrorKind::AlreadyExists
        );
        assert_eq!(Error::SelfMerge("dev".into()).kind(), ErrorKind::NoOpMerge);
        assert_eq!(
            Error::AlreadyAncestor("dev".into()).kind(),
            ErrorKind::NoOpMerge
        );
        assert!(Error::BranchNotFound("x".into()).is_not_found());
        assert!(!Error::UncommittedChanges.is_not_found());
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let err: Error = StorageError::NotFound {
            kind: ObjectKind::Commit,
            id: ObjectId::new([0u8; 32]),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let io: Error = StorageError::Io(std::io::Error::other("disk")).into();
        assert_eq!(io.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_messages_are_user_facing() {
        assert_eq!(
            Error::NonFastForward {
                remote: "origin".into(),
                branch: "master".into()
            }
            .to_string(),
            "Please pull down remote changes before pushing."
        );
    }
}
