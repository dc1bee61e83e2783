//! Commit graph operations
//!
//! The graph is the immutable DAG of commits addressed by id. Everything
//! here is a pure function of the object store contents, apart from
//! `commit_to_branch`, which also consumes the staging area and moves a
//! branch pointer.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use crate::branch::Branch;
use crate::error::{Error, Result};
use crate::object::{Commit, HEX_LEN, ObjectId, ObjectKind};
use crate::staging::StagingArea;
use crate::storage::ObjectStore;

/// Build and persist a commit from a parent snapshot plus staged changes.
///
/// Without a second parent, a commit that changes nothing relative to an
/// existing parent is rejected. Merge commits are always recorded.
pub fn create_commit<S: ObjectStore + ?Sized>(
    store: &S,
    message: &str,
    adds: &BTreeMap<String, ObjectId>,
    removes: &BTreeSet<String>,
    parent: Option<ObjectId>,
    second_parent: Option<ObjectId>,
    timestamp: i64,
) -> Result<ObjectId> {
    let mut files = match parent {
        Some(ref p) => store.get_commit(p)?.files,
        None => BTreeMap::new(),
    };
    if parent.is_some() && second_parent.is_none() && adds.is_empty() && removes.is_empty() {
        return Err(Error::EmptyCommit);
    }
    for (path, blob) in adds {
        files.insert(path.clone(), *blob);
    }
    for path in removes {
        files.remove(path);
    }
    let commit = Commit::new(message.to_string(), timestamp, parent, second_parent, files);
    let id = store.put_commit(&commit)?;
    tracing::debug!(
        "Stored commit {} ({} files, merge: {})",
        id.short(),
        commit.files.len(),
        commit.is_merge()
    );
    Ok(id)
}

/// Commit the staged changes on top of `branch`, clear the staging area and
/// advance the branch to the new commit.
pub fn commit_to_branch<S: ObjectStore + ?Sized, A: StagingArea + ?Sized>(
    store: &S,
    branch: &mut Branch,
    staging: &mut A,
    message: &str,
    second_parent: Option<ObjectId>,
    timestamp: i64,
) -> Result<ObjectId> {
    let id = create_commit(
        store,
        message,
        staging.pending_adds(),
        staging.pending_removes(),
        Some(branch.head),
        second_parent,
        timestamp,
    )?;
    staging.clear();
    branch.advance(id);
    Ok(id)
}

/// Every commit reachable from `head` over both parent edges, `head` included
pub fn ancestors_of<S: ObjectStore + ?Sized>(
    store: &S,
    head: &ObjectId,
) -> Result<BTreeSet<ObjectId>> {
    let mut seen = BTreeSet::new();
    let mut fringe = VecDeque::from([*head]);
    while let Some(id) = fringe.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        let commit = store.get_commit(&id)?;
        fringe.extend(commit.parents());
    }
    Ok(seen)
}

/// Split point of a merge: breadth-first from `current`, first parent before
/// second parent, returning the first commit contained in `given_ancestors`.
///
/// This is the common ancestor reached earliest from the current side, which
/// is not necessarily the unique lowest common ancestor when the histories
/// contain several merge bases.
pub fn split_point<S: ObjectStore + ?Sized>(
    store: &S,
    current: &ObjectId,
    given_ancestors: &BTreeSet<ObjectId>,
) -> Result<Option<ObjectId>> {
    let mut visited = HashSet::new();
    let mut fringe = VecDeque::from([*current]);
    while let Some(id) = fringe.pop_front() {
        if !visited.insert(id) {
            continue;
        }
        if given_ancestors.contains(&id) {
            return Ok(Some(id));
        }
        fringe.extend(store.get_commit(&id)?.parents());
    }
    Ok(None)
}

/// First-parent history, newest first, ending at the root commit
pub struct Log<'a, S: ?Sized> {
    store: &'a S,
    next: Option<ObjectId>,
}

impl<'a, S: ObjectStore + ?Sized> Log<'a, S> {
    pub fn new(store: &'a S, head: ObjectId) -> Self {
        Self {
            store,
            next: Some(head),
        }
    }
}

impl<S: ObjectStore + ?Sized> Iterator for Log<'_, S> {
    type Item = Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.store.get_commit(&id) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok((id, commit)))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// First-parent history starting at `head`
pub fn log<S: ObjectStore + ?Sized>(store: &S, head: ObjectId) -> Log<'_, S> {
    Log::new(store, head)
}

/// Every commit in the store, ordered by id
pub fn all_commits<S: ObjectStore + ?Sized>(store: &S) -> Result<Vec<(ObjectId, Commit)>> {
    store
        .ids(ObjectKind::Commit)?
        .into_iter()
        .map(|id| Ok((id, store.get_commit(&id)?)))
        .collect()
}

/// Ids of all commits whose message is exactly `message`
pub fn find_by_message<S: ObjectStore + ?Sized>(store: &S, message: &str) -> Result<Vec<ObjectId>> {
    let found: Vec<ObjectId> = all_commits(store)?
        .into_iter()
        .filter(|(_, commit)| commit.message == message)
        .map(|(id, _)| id)
        .collect();
    if found.is_empty() {
        return Err(Error::NoCommitWithMessage(message.to_string()));
    }
    Ok(found)
}

/// Resolve a full id or an unambiguous hex prefix to a stored commit
pub fn resolve_commit<S: ObjectStore + ?Sized>(store: &S, prefix: &str) -> Result<ObjectId> {
    let prefix = prefix.trim().to_ascii_lowercase();
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::CommitNotFound(prefix));
    }
    if prefix.len() == HEX_LEN {
        return match ObjectId::from_hex(&prefix) {
            Ok(id) if store.has_commit(&id)? => Ok(id),
            _ => Err(Error::CommitNotFound(prefix)),
        };
    }

    let matches: Vec<ObjectId> = store
        .ids(ObjectKind::Commit)?
        .into_iter()
        .filter(|id| id.to_hex().starts_with(&prefix))
        .collect();
    match matches.as_slice() {
        [] => Err(Error::CommitNotFound(prefix)),
        [id] => Ok(*id),
        _ => Err(Error::AmbiguousCommitId {
            matches: matches.len(),
            prefix,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::object::Blob;
    use crate::staging::Index;
    use crate::storage::MemoryObjectStore;

    fn stage(store: &MemoryObjectStore, index: &mut Index, path: &str, content: &str) {
        let id = store
            .put_blob(&Blob::new(path, content.as_bytes().to_vec()))
            .unwrap();
        index.stage_add(path, id);
    }

    fn root(store: &MemoryObjectStore) -> Branch {
        let root = store.put_commit(&Commit::initial()).unwrap();
        Branch::rooted("master", root)
    }

    #[test]
    fn test_commit_copies_parent_snapshot() {
        let store = MemoryObjectStore::new();
        let mut branch = root(&store);
        let mut index = Index::new();

        stage(&store, &mut index, "a.txt", "a");
        stage(&store, &mut index, "b.txt", "b");
        let c1 = commit_to_branch(&store, &mut branch, &mut index, "c1", None, 100).unwrap();
        assert!(index.is_empty());

        index.stage_remove("a.txt");
        let c2 = commit_to_branch(&store, &mut branch, &mut index, "c2", None, 200).unwrap();

        let first = store.get_commit(&c1).unwrap();
        let second = store.get_commit(&c2).unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(second.files.keys().collect::<Vec<_>>(), vec!["b.txt"]);
        assert_eq!(second.parent, Some(c1));
        assert_eq!(branch.head, c2);
        assert!(branch.contains(&c1) && branch.contains(&c2));
    }

    #[test]
    fn test_empty_commit_rejected() {
        let store = MemoryObjectStore::new();
        let mut branch = root(&store);
        let mut index = Index::new();
        let err =
            commit_to_branch(&store, &mut branch, &mut index, "nothing", None, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCommit);
        assert_eq!(branch.ancestors.len(), 1);
    }

    #[test]
    fn test_root_commit_allowed_without_changes() {
        let store = MemoryObjectStore::new();
        let id = create_commit(
            &store,
            "initial commit",
            &BTreeMap::new(),
            &BTreeSet::new(),
            None,
            None,
            0,
        )
        .unwrap();
        assert_eq!(id, Commit::initial().id());
    }

    #[test]
    fn test_log_follows_first_parent() {
        let store = MemoryObjectStore::new();
        let mut master = root(&store);
        let mut index = Index::new();
        stage(&store, &mut index, "a.txt", "1");
        let c1 = commit_to_branch(&store, &mut master, &mut index, "c1", None, 1).unwrap();

        let mut side = master.fork("side");
        stage(&store, &mut index, "s.txt", "s");
        let s1 = commit_to_branch(&store, &mut side, &mut index, "s1", None, 2).unwrap();

        let merge =
            commit_to_branch(&store, &mut master, &mut index, "merge", Some(s1), 3).unwrap();

        let messages: Vec<String> = log(&store, merge)
            .map(|r| r.unwrap().1.message)
            .collect();
        assert_eq!(messages, vec!["merge", "c1", "initial commit"]);

        let closure = ancestors_of(&store, &merge).unwrap();
        assert!(closure.contains(&s1) && closure.contains(&c1));
        assert_eq!(closure.len(), 4);
    }

    #[test]
    fn test_split_point_prefers_current_side() {
        let store = MemoryObjectStore::new();
        let mut master = root(&store);
        let mut index = Index::new();
        stage(&store, &mut index, "f.txt", "a");
        let base = commit_to_branch(&store, &mut master, &mut index, "base", None, 1).unwrap();

        let mut feature = master.fork("feature");
        stage(&store, &mut index, "f.txt", "b");
        commit_to_branch(&store, &mut feature, &mut index, "feat", None, 2).unwrap();
        stage(&store, &mut index, "f.txt", "c");
        commit_to_branch(&store, &mut master, &mut index, "main", None, 3).unwrap();

        let split = split_point(&store, &master.head, &feature.ancestors).unwrap();
        assert_eq!(split, Some(base));
    }

    #[test]
    fn test_resolve_commit_prefixes() {
        let store = MemoryObjectStore::new();
        let root = store.put_commit(&Commit::initial()).unwrap();
        let hex = root.to_hex();

        assert_eq!(resolve_commit(&store, &hex).unwrap(), root);
        assert_eq!(resolve_commit(&store, &hex[..6]).unwrap(), root);
        assert_eq!(
            resolve_commit(&store, &hex[..6].to_uppercase()).unwrap(),
            root
        );
        assert!(resolve_commit(&store, "zz").unwrap_err().is_not_found());
        assert!(resolve_commit(&store, "").unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_by_message() {
        let store = MemoryObjectStore::new();
        let root = store.put_commit(&Commit::initial()).unwrap();
        assert_eq!(find_by_message(&store, "initial commit").unwrap(), vec![root]);
        assert_eq!(
            find_by_message(&store, "nope").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
