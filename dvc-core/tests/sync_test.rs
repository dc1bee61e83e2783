//! Push, fetch and pull between two repositories on the local filesystem

use dvc_core::{Direction, ErrorKind, MergeOutcome, ObjectId, ObjectKind, ObjectStore, Repository};
use std::fs;
use tempfile::TempDir;

fn commit_file(repo: &mut Repository, path: &str, content: &str, message: &str) -> ObjectId {
    fs::write(repo.work_dir().join(path), content).unwrap();
    repo.add(path).unwrap();
    repo.commit(message).unwrap()
}

fn read(repo: &Repository, path: &str) -> String {
    fs::read_to_string(repo.work_dir().join(path)).unwrap()
}

/// Two fresh repositories; `local` has `origin` pointing at `remote`.
/// `_dirs` must stay bound for the repositories to outlive the setup.
struct Pair {
    local: Repository,
    remote: Repository,
    _dirs: (TempDir, TempDir),
}

fn pair() -> Pair {
    let local_dir = TempDir::new().unwrap();
    let remote_dir = TempDir::new().unwrap();
    let mut local = Repository::init(local_dir.path()).unwrap();
    let remote = Repository::init(remote_dir.path()).unwrap();
    local.add_remote("origin", remote_dir.path()).unwrap();
    Pair {
        local,
        remote,
        _dirs: (local_dir, remote_dir),
    }
}

fn commit_count(repo: &Repository) -> usize {
    repo.objects().ids(ObjectKind::Commit).unwrap().len()
}

#[test]
fn test_push_copies_history() {
    let Pair { mut local, remote, _dirs } = pair();
    commit_file(&mut local, "f.txt", "one", "c1");
    let c2 = commit_file(&mut local, "f.txt", "two", "c2");

    let outcome = local.push("origin", "master").unwrap();
    assert_eq!(outcome.old_head, Some(remote.head_commit().unwrap().0));
    assert_eq!(outcome.stats.commits, 2);
    assert_eq!(outcome.stats.blobs, 2);

    let master = remote.branch_named("master").unwrap();
    assert_eq!(master.head, c2);
    assert_eq!(master.ancestors, local.current_branch().unwrap().ancestors);
    assert_eq!(commit_count(&remote), 3);

    // Nothing left to copy the second time
    let again = local.push("origin", "master").unwrap();
    assert!(again.stats.is_empty());

    let log = local.sync_log().unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|e| e.success && e.direction == Direction::Push));
    assert_eq!(log[0].new_head, Some(c2));
}

#[test]
fn test_push_creates_missing_branch() {
    let Pair { mut local, remote, _dirs } = pair();
    local.branch("feature").unwrap();
    local.checkout_branch("feature").unwrap();
    let head = commit_file(&mut local, "f.txt", "x", "feature work");

    let outcome = local.push("origin", "feature").unwrap();
    assert_eq!(outcome.old_head, None);
    assert_eq!(remote.branch_named("feature").unwrap().head, head);
    assert_eq!(remote.current_branch().unwrap().name, "master");
}

#[test]
fn test_diverged_push_is_rejected() {
    let Pair { mut local, mut remote, _dirs } = pair();
    commit_file(&mut local, "f.txt", "local", "local work");
    let remote_head = commit_file(&mut remote, "g.txt", "remote", "remote work");
    let before = commit_count(&remote);

    let err = local.push("origin", "master").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonFastForward);
    assert_eq!(err.to_string(), "Please pull down remote changes before pushing.");
    assert_eq!(remote.branch_named("master").unwrap().head, remote_head);
    assert_eq!(commit_count(&remote), before);

    let log = local.sync_log().unwrap();
    assert!(!log[0].success);
    assert!(log[0].error.is_some());
}

#[test]
fn test_fetch_creates_tracking_branch() {
    let Pair { mut local, mut remote, _dirs } = pair();
    commit_file(&mut remote, "f.txt", "one", "r1");
    let r2 = commit_file(&mut remote, "f.txt", "two", "r2");
    let local_head = local.current_branch().unwrap().head;

    let outcome = local.fetch("origin", "master").unwrap();
    assert_eq!(outcome.branch.name, "origin/master");
    assert_eq!(outcome.old_head, None);
    assert_eq!(outcome.stats.commits, 2);

    let tracking = local.branch_named("origin/master").unwrap();
    assert_eq!(tracking.head, r2);
    assert_eq!(tracking.ancestors.len(), 3);
    assert_eq!(local.current_branch().unwrap().head, local_head);
    assert!(!local.work_dir().join("f.txt").exists());

    let second = local.fetch("origin", "master").unwrap();
    assert!(second.stats.is_empty());
    assert_eq!(second.old_head, Some(r2));

    let err = local.fetch("origin", "nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_pull_fast_forwards() {
    let Pair { mut local, mut remote, _dirs } = pair();
    let r1 = commit_file(&mut remote, "f.txt", "remote", "r1");

    let outcome = local.pull("origin", "master").unwrap();
    assert_eq!(outcome.merge, MergeOutcome::FastForwarded { head: r1 });
    assert_eq!(local.current_branch().unwrap().head, r1);
    assert_eq!(read(&local, "f.txt"), "remote");
}

#[test]
fn test_pull_right_after_push_is_a_fast_forward() {
    let Pair { mut local, remote, _dirs } = pair();
    let c1 = commit_file(&mut local, "f.txt", "one", "c1");
    local.push("origin", "master").unwrap();
    let commits = commit_count(&local);

    let outcome = local.pull("origin", "master").unwrap();
    assert_eq!(outcome.merge, MergeOutcome::FastForwarded { head: c1 });
    assert_eq!(local.current_branch().unwrap().head, c1);
    assert_eq!(remote.branch_named("master").unwrap().head, c1);
    assert_eq!(commit_count(&local), commits);
    assert_eq!(read(&local, "f.txt"), "one");
}

#[test]
fn test_pull_merges_diverged_history() {
    let Pair { mut local, mut remote, _dirs } = pair();
    let l1 = commit_file(&mut local, "local.txt", "l", "l1");
    let r1 = commit_file(&mut remote, "remote.txt", "r", "r1");

    let outcome = local.pull("origin", "master").unwrap();
    let MergeOutcome::Merged { commit, conflicts } = outcome.merge else {
        panic!("expected a merge commit");
    };
    assert!(conflicts.is_empty());
    assert_eq!(read(&local, "local.txt"), "l");
    assert_eq!(read(&local, "remote.txt"), "r");

    let (_, merge) = local.head_commit().unwrap();
    assert_eq!(merge.parent, Some(l1));
    assert_eq!(merge.second_parent, Some(r1));
    assert_eq!(merge.message, "Merged origin/master into master.");

    // The merged history can now be pushed back
    let pushed = local.push("origin", "master").unwrap();
    assert_eq!(pushed.branch.head, commit);
    assert_eq!(pushed.stats.commits, 2);
    assert!(remote.branch_named("master").unwrap().contains(&l1));
}

#[test]
fn test_round_trip_between_two_clones() {
    let Pair { mut local, mut remote, _dirs } = pair();
    let c1 = commit_file(&mut local, "f.txt", "v1", "c1");
    local.push("origin", "master").unwrap();

    // The remote's working tree is untouched by a push
    assert!(!remote.work_dir().join("f.txt").exists());
    remote.reset(&c1.to_hex()).unwrap();
    assert_eq!(read(&remote, "f.txt"), "v1");

    let c2 = commit_file(&mut remote, "f.txt", "v2", "c2");
    local.pull("origin", "master").unwrap();
    assert_eq!(local.current_branch().unwrap().head, c2);
    assert_eq!(read(&local, "f.txt"), "v2");
    assert_eq!(
        local.objects().get_commit(&c2).unwrap(),
        remote.objects().get_commit(&c2).unwrap()
    );
}
