//! Three-way merge engine
//!
//! A merge finds the split point of the current and given branches, then
//! classifies every path that appears in any of the three snapshots:
//!
//! | base    | cur            | given              | resolution |
//! |---------|----------------|--------------------|------------|
//! | absent  | absent         | present            | take given |
//! | absent  | present        | present, differs   | conflict   |
//! | present | absent         | differs from base  | conflict   |
//! | present | equals base    | differs from base  | take given |
//! | present | differs        | differs, not cur   | conflict   |
//! | present | equals base    | absent             | remove     |
//! | present | differs        | absent             | conflict   |
//!
//! Every other combination keeps the current side. Conflicts never abort a
//! merge: the conflicted file is written with markers, staged, and the merge
//! commit is still created.

use std::collections::BTreeSet;

use crate::branch::Branch;
use crate::error::{Error, Result};
use crate::graph;
use crate::object::{Blob, Commit, ObjectId};
use crate::staging::StagingArea;
use crate::storage::ObjectStore;
use crate::worktree::{self, WorkingTree};

const CONFLICT_START: &str = "<<<<<<< HEAD\n";
const CONFLICT_SEPARATOR: &str = "=======\n";
const CONFLICT_END: &str = ">>>>>>>\n";

/// What a merge does to one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the current version in place
    Keep,
    /// Write and stage the given branch's blob
    TakeGiven(ObjectId),
    /// Delete and stage for removal
    Remove,
    /// Write conflict markers and stage the result
    Conflict,
}

/// Classify one path from the blob ids at the split point, the current head
/// and the given head. Blob ids include the path, so for a fixed path id
/// equality is content equality.
pub fn classify(
    base: Option<&ObjectId>,
    cur: Option<&ObjectId>,
    given: Option<&ObjectId>,
) -> Resolution {
    match (base, cur, given) {
        (None, None, Some(g)) => Resolution::TakeGiven(*g),
        (None, Some(c), Some(g)) if c != g => Resolution::Conflict,
        (Some(b), None, Some(g)) if g != b => Resolution::Conflict,
        (Some(b), Some(c), Some(g)) if c == b && g != b => Resolution::TakeGiven(*g),
        (Some(b), Some(c), Some(g)) if c != b && g != b && g != c => Resolution::Conflict,
        (Some(b), Some(c), None) if c == b => Resolution::Remove,
        (Some(_), Some(_), None) => Resolution::Conflict,
        _ => Resolution::Keep,
    }
}

/// Conflict placeholder combining both sides; an absent side is empty.
/// A non-empty side lacking a final newline gets one so markers stay on
/// their own lines.
pub fn conflict_text(cur: &[u8], given: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(cur.len() + given.len() + 32);
    out.extend_from_slice(CONFLICT_START.as_bytes());
    push_side(&mut out, cur);
    out.extend_from_slice(CONFLICT_SEPARATOR.as_bytes());
    push_side(&mut out, given);
    out.extend_from_slice(CONFLICT_END.as_bytes());
    out
}

fn push_side(out: &mut Vec<u8>, side: &[u8]) {
    out.extend_from_slice(side);
    if !side.is_empty() && !side.ends_with(b"\n") {
        out.push(b'\n');
    }
}

/// Message recorded on merge commits
pub fn merge_message(given: &str, current: &str) -> String {
    format!("Merged {} into {}.", given, current)
}

/// Result of a successful merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The current branch was behind and now points at `head`
    FastForwarded { head: ObjectId },
    /// A merge commit was created; `conflicts` lists conflicted paths
    Merged {
        commit: ObjectId,
        conflicts: Vec<String>,
    },
}

impl MergeOutcome {
    pub fn has_conflicts(&self) -> bool {
        matches!(self, MergeOutcome::Merged { conflicts, .. } if !conflicts.is_empty())
    }
}

/// Everything a merge reads and writes
pub struct MergeContext<'a, S: ?Sized, W: ?Sized, A: ?Sized> {
    pub store: &'a S,
    pub tree: &'a mut W,
    pub staging: &'a mut A,
}

impl<S, W, A> MergeContext<'_, S, W, A>
where
    S: ObjectStore + ?Sized,
    W: WorkingTree + ?Sized,
    A: StagingArea + ?Sized,
{
    /// Merge `given` into `current`, moving `current` on success.
    ///
    /// `timestamp` is used for the merge commit. On any error the branch, the
    /// working tree and the staging area are unchanged.
    pub fn merge(
        &mut self,
        current: &mut Branch,
        given: &Branch,
        timestamp: i64,
    ) -> Result<MergeOutcome> {
        if !self.staging.is_empty() {
            return Err(Error::UncommittedChanges);
        }
        if current.name == given.name {
            return Err(Error::SelfMerge(given.name.clone()));
        }

        let split = graph::split_point(self.store, &current.head, &given.ancestors)?;
        let cur_commit = self.store.get_commit(&current.head)?;
        let given_commit = self.store.get_commit(&given.head)?;

        // Equal heads land here too and succeed without a new commit
        if split == Some(current.head) {
            worktree::switch_snapshot(self.store, &mut *self.tree, &cur_commit, &given_commit)?;
            current.reset_to(given.head, given.ancestors.clone());
            tracing::info!(
                "Fast-forwarded {} to {} ({})",
                current.name,
                given.head.short(),
                given.name
            );
            return Ok(MergeOutcome::FastForwarded { head: given.head });
        }
        if split == Some(given.head) {
            return Err(Error::AlreadyAncestor(given.name.clone()));
        }

        let base = match split {
            Some(id) => self.store.get_commit(&id)?,
            None => Commit::new(String::new(), 0, None, None, Default::default()),
        };
        let resolutions = plan(&base, &cur_commit, &given_commit);

        // Refuse before touching anything
        for (path, resolution) in &resolutions {
            let writes = matches!(resolution, Resolution::TakeGiven(_) | Resolution::Conflict);
            if writes && !cur_commit.tracks(path) && self.tree.exists(path) {
                return Err(Error::UntrackedInWay(path.clone()));
            }
        }

        let mut conflicts = Vec::new();
        for (path, resolution) in resolutions {
            match resolution {
                Resolution::Keep => {}
                Resolution::TakeGiven(blob_id) => {
                    let blob = self.store.get_blob(&blob_id)?;
                    self.tree.write(&path, &blob.content)?;
                    self.staging.stage_add(&path, blob_id);
                }
                Resolution::Remove => {
                    self.tree.delete(&path)?;
                    self.staging.stage_remove(&path);
                }
                Resolution::Conflict => {
                    let ours = self.side_content(cur_commit.blob_for(&path))?;
                    let theirs = self.side_content(given_commit.blob_for(&path))?;
                    let merged = Blob::new(path.clone(), conflict_text(&ours, &theirs));
                    let blob_id = self.store.put_blob(&merged)?;
                    self.tree.write(&path, &merged.content)?;
                    self.staging.stage_add(&path, blob_id);
                    tracing::warn!("Merge conflict in {}", path);
                    conflicts.push(path);
                }
            }
        }

        let message = merge_message(&given.name, &current.name);
        let commit = graph::commit_to_branch(
            self.store,
            current,
            &mut *self.staging,
            &message,
            Some(given.head),
            timestamp,
        )?;
        current.absorb(&given.ancestors);
        tracing::info!(
            "Merged {} into {} as {} ({} conflicts)",
            given.name,
            current.name,
            commit.short(),
            conflicts.len()
        );
        Ok(MergeOutcome::Merged { commit, conflicts })
    }

    fn side_content(&self, blob: Option<&ObjectId>) -> Result<Vec<u8>> {
        match blob {
            Some(id) => Ok(self.store.get_blob(id)?.content),
            None => Ok(Vec::new()),
        }
    }
}

/// Resolution for every path in any of the three snapshots, sorted by path
fn plan(base: &Commit, cur: &Commit, given: &Commit) -> Vec<(String, Resolution)> {
    let paths: BTreeSet<&String> = base
        .files
        .keys()
        .chain(cur.files.keys())
        .chain(given.files.keys())
        .collect();
    paths
        .into_iter()
        .map(|path| {
            let resolution =
                classify(base.blob_for(path), cur.blob_for(path), given.blob_for(path));
            (path.clone(), resolution)
        })
        .collect()
}
