//! Snapshotting the working directory into a new commit and advancing
//! the current branch to point at it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::info;

use crate::object::{Commit, Object};
use crate::refs::{self, RefValue};
use crate::store::ObjectStore;
use crate::write_tree::write_tree;

/// Builds a tree from `working_dir`, links it to the current HEAD as a
/// parent (if any), and writes a new commit object. Advances HEAD's
/// branch to the new commit if HEAD is symbolic; if HEAD is a direct
/// hash ("detached"), HEAD itself is updated to point at the new commit.
pub fn commit_working_dir(
    store: &ObjectStore,
    repo_dir: &Path,
    working_dir: &Path,
    repo_dir_name: &str,
    author: &str,
    message: &str,
) -> Result<String> {
    let tree_hash = write_tree(store, working_dir, repo_dir_name)?;

    let parent = refs::resolve(repo_dir, "HEAD").ok();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64;

    let commit = Commit {
        tree: tree_hash,
        parent,
        author: author.to_string(),
        message: message.to_string(),
        timestamp,
    };
    let commit_hash = store.save(&Object::Commit(commit))?;

    advance_head(repo_dir, &commit_hash)?;

    info!(hash = %commit_hash, "committed working directory");
    Ok(commit_hash)
}

/// Writes `commit_hash` to wherever HEAD currently resolves one hop:
/// if HEAD is symbolic, to the branch it names; otherwise to HEAD
/// itself (the detached-HEAD case).
fn advance_head(repo_dir: &Path, commit_hash: &str) -> Result<()> {
    let head_path = refs::path_for(repo_dir, "HEAD");
    match refs::read_ref_file(&head_path) {
        Ok(Some(RefValue::Sym(target))) => {
            refs::write_ref_file(&refs::path_for(repo_dir, &target), &RefValue::Hash(commit_hash.to_string()))
        }
        _ => refs::write_ref_file(&head_path, &RefValue::Hash(commit_hash.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::branch_ref;
    use std::fs;

    fn init_repo() -> (tempfile::TempDir, ObjectStore) {
        let dir = tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join(".caf");
        fs::create_dir_all(repo_dir.join("objects")).unwrap();
        refs::write_ref_file(&refs::path_for(&repo_dir, &branch_ref("main")), &RefValue::Hash("0".repeat(40))).unwrap();
        // overwrite with no commit yet: branch ref absent means no parent
        fs::remove_file(refs::path_for(&repo_dir, &branch_ref("main"))).unwrap();
        refs::write_ref_file(&refs::path_for(&repo_dir, "HEAD"), &RefValue::Sym(branch_ref("main"))).unwrap();
        let store = ObjectStore::new(repo_dir.join("objects"));
        (dir, store)
    }

    #[test]
    fn first_commit_has_no_parent() {
        let (dir, store) = init_repo();
        fs::write(dir.path().join("a.txt"), b"content").unwrap();
        let hash = commit_working_dir(&store, &dir.path().join(".caf"), dir.path(), ".caf", "Author", "first").unwrap();
        let commit = store.load_commit(&hash).unwrap();
        assert!(commit.parent.is_none());
    }

    #[test]
    fn second_commit_points_at_first_and_branch_advances() {
        let (dir, store) = init_repo();
        fs::write(dir.path().join("a.txt"), b"v1").unwrap();
        let first = commit_working_dir(&store, &dir.path().join(".caf"), dir.path(), ".caf", "Author", "one").unwrap();

        fs::write(dir.path().join("a.txt"), b"v2").unwrap();
        let second = commit_working_dir(&store, &dir.path().join(".caf"), dir.path(), ".caf", "Author", "two").unwrap();

        let commit = store.load_commit(&second).unwrap();
        assert_eq!(commit.parent, Some(first));

        let branch_tip = refs::resolve(&dir.path().join(".caf"), "HEAD").unwrap();
        assert_eq!(branch_tip, second);
    }
}
