use std::fs;
use std::path::Path;

use filetime::FileTime;
use tempfile::TempDir;

use caf::diff::ChangeKind;
use caf::refs::{self, branch_ref, RefValue};
use caf::repository::{Repository, DEFAULT_BRANCH, DEFAULT_REPO_DIR};

fn setup() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path(), DEFAULT_REPO_DIR, DEFAULT_BRANCH).unwrap();
    (dir, repo)
}

fn open(root: &Path) -> Repository {
    Repository::open(root, DEFAULT_REPO_DIR).unwrap()
}

fn write_file(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn checkout(repo: &Repository, branch: &str) {
    refs::write_ref_file(&repo.head_file(), &RefValue::Sym(branch_ref(branch))).unwrap();
}

fn set_branch(repo: &Repository, branch: &str, hash: &str) {
    repo.update_ref(&branch_ref(branch), hash).unwrap();
}

//
//
// Init
//
//

#[test]
fn test_init_creates_repo_layout() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    Repository::init(root, DEFAULT_REPO_DIR, DEFAULT_BRANCH).unwrap();
    assert!(root.join(".caf").is_dir());
    assert!(root.join(".caf/objects").is_dir());
    assert!(root.join(".caf/HEAD").is_file());
    let branch_file = root.join(".caf/refs/heads").join(DEFAULT_BRANCH);
    assert!(branch_file.is_file());
    assert_eq!(fs::read_to_string(branch_file).unwrap(), "");
}

#[test]
fn test_init_sets_head_to_default_branch() {
    let (_dir, repo) = setup();
    assert_eq!(repo.current_branch().unwrap(), Some(DEFAULT_BRANCH.to_string()));
}

#[test]
fn test_init_twice_fails_with_repository_exists() {
    let dir = TempDir::new().unwrap();
    Repository::init(dir.path(), DEFAULT_REPO_DIR, DEFAULT_BRANCH).unwrap();
    assert!(Repository::init(dir.path(), DEFAULT_REPO_DIR, DEFAULT_BRANCH).is_err());
}

#[test]
fn test_init_honors_custom_default_branch() {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path(), DEFAULT_REPO_DIR, "develop").unwrap();
    assert_eq!(repo.current_branch().unwrap(), Some("develop".to_string()));
}

#[test]
fn test_reopen_after_init() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file.rs", b"content");
    let hash = repo.commit_working_dir("Author", "first").unwrap();
    let reopened = open(dir.path());
    assert_eq!(reopened.resolve_commit("HEAD").unwrap(), hash);
}

//
//
// Commit
//
//

#[test]
fn test_first_commit_has_no_parent() {
    let (dir, repo) = setup();
    write_file(dir.path(), "hello.rs", b"fn hello() {}");
    let hash = repo.commit_working_dir("Author", "first").unwrap();
    let commit = repo.load_object(&hash).unwrap().as_commit().unwrap().clone();
    assert!(commit.parent.is_none());
    assert_eq!(commit.message, "first");
}

#[test]
fn test_commit_snapshots_nested_directories() {
    let (dir, repo) = setup();
    write_file(dir.path(), "src/main.rs", b"fn main() {}");
    write_file(dir.path(), "src/lib.rs", b"pub fn foo() {}");
    write_file(dir.path(), "README.md", b"# Hello");
    let hash = repo.commit_working_dir("Author", "nested").unwrap();

    let commit = repo.load_object(&hash).unwrap().as_commit().unwrap().clone();
    let tree = repo.load_object(&commit.tree).unwrap();
    let tree = tree.as_tree().unwrap();
    assert!(tree.get("README.md").is_some());
    assert!(tree.get("src").is_some());
}

#[test]
fn test_commit_excludes_repo_metadata_directory() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file.rs", b"content");
    let hash = repo.commit_working_dir("Author", "msg").unwrap();
    let commit = repo.load_object(&hash).unwrap().as_commit().unwrap().clone();
    let tree = repo.load_object(&commit.tree).unwrap();
    assert!(tree.as_tree().unwrap().get(DEFAULT_REPO_DIR).is_none());
}

#[test]
fn test_second_commit_points_at_first() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file.rs", b"v1");
    let first = repo.commit_working_dir("Author", "one").unwrap();
    write_file(dir.path(), "file.rs", b"v2");
    let second = repo.commit_working_dir("Author", "two").unwrap();

    let commit = repo.load_object(&second).unwrap().as_commit().unwrap().clone();
    assert_eq!(commit.parent, Some(first));
}

#[test]
fn test_commit_hash_is_independent_of_file_mtime() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file.rs", b"same content");
    let first = repo.commit_working_dir("Author", "one").unwrap();

    let old_mtime = FileTime::from_unix_time(1_000_000_000, 0);
    filetime::set_file_mtime(dir.path().join("file.rs"), old_mtime).unwrap();
    let second = repo.commit_working_dir("Author", "two").unwrap();

    let c1 = repo.load_object(&first).unwrap().as_commit().unwrap().clone();
    let c2 = repo.load_object(&second).unwrap().as_commit().unwrap().clone();
    assert_eq!(c1.tree, c2.tree);
}

#[test]
fn test_unchanged_working_dir_still_produces_a_new_commit() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file.rs", b"same");
    let first = repo.commit_working_dir("Author", "one").unwrap();
    let second = repo.commit_working_dir("Author", "two").unwrap();
    assert_ne!(first, second);

    let c1 = repo.load_object(&first).unwrap().as_commit().unwrap().clone();
    let c2 = repo.load_object(&second).unwrap().as_commit().unwrap().clone();
    assert_eq!(c1.tree, c2.tree);
}

//
//
// Branches and tags
//
//

#[test]
fn test_branch_lifecycle() {
    let (dir, repo) = setup();
    write_file(dir.path(), "a.txt", b"hi");
    let hash = repo.commit_working_dir("Author", "msg").unwrap();

    repo.add_branch("feature").unwrap();
    assert!(repo.branch_exists("feature"));
    assert_eq!(repo.list_branches().unwrap(), vec!["feature".to_string()]);
    // a freshly created branch is empty until something points it at a commit.
    assert!(repo.resolve_commit("feature").is_err());

    set_branch(&repo, "feature", &hash);
    assert_eq!(repo.resolve_commit("feature").unwrap(), hash);

    repo.delete_branch("feature").unwrap();
    assert!(!repo.branch_exists("feature"));
}

#[test]
fn test_branch_before_first_commit_is_allowed_and_empty() {
    let (_dir, repo) = setup();
    repo.add_branch("too-soon").unwrap();
    assert!(repo.branch_exists("too-soon"));
    assert!(repo.resolve_commit("too-soon").is_err());
}

#[test]
fn test_tag_lifecycle() {
    let (dir, repo) = setup();
    write_file(dir.path(), "a.txt", b"hi");
    let hash = repo.commit_working_dir("Author", "msg").unwrap();

    repo.create_tag("v1", None).unwrap();
    assert_eq!(repo.list_tags().unwrap(), vec!["v1".to_string()]);
    assert_eq!(repo.resolve_commit("v1").unwrap(), hash);

    repo.delete_tag("v1").unwrap();
    assert!(repo.list_tags().unwrap().is_empty());
}

//
//
// Log
//
//

#[test]
fn test_log_walks_parent_chain() {
    let (dir, repo) = setup();
    write_file(dir.path(), "a.txt", b"1");
    let first = repo.commit_working_dir("Author", "first").unwrap();
    write_file(dir.path(), "a.txt", b"2");
    let second = repo.commit_working_dir("Author", "second").unwrap();

    let chain = caf::log::log_chain(&repo, "HEAD").unwrap();
    let hashes: Vec<_> = chain.into_iter().map(|(h, _)| h).collect();
    assert_eq!(hashes, vec![second, first]);
}

//
//
// Diff
//
//

#[test]
fn test_diff_detects_added_removed_modified() {
    let (dir, repo) = setup();
    write_file(dir.path(), "keep.txt", b"same");
    write_file(dir.path(), "change.txt", b"before");
    write_file(dir.path(), "gone.txt", b"bye");
    let before = repo.commit_working_dir("Author", "before").unwrap();

    fs::remove_file(dir.path().join("gone.txt")).unwrap();
    write_file(dir.path(), "change.txt", b"after");
    write_file(dir.path(), "new.txt", b"hi");
    let after = repo.commit_working_dir("Author", "after").unwrap();

    let entries = repo.diff_commits(&before, &after).unwrap();
    let by_name = |name: &str| entries.iter().find(|e| e.name == name);

    assert!(by_name("keep.txt").is_none());
    assert_eq!(by_name("change.txt").unwrap().change, ChangeKind::Modified);
    assert_eq!(by_name("gone.txt").unwrap().change, ChangeKind::Removed);
    assert_eq!(by_name("new.txt").unwrap().change, ChangeKind::Added);
}

#[test]
fn test_diff_detects_moved_file() {
    let (dir, repo) = setup();
    write_file(dir.path(), "old_name.txt", b"unchanged content");
    let before = repo.commit_working_dir("Author", "before").unwrap();

    fs::rename(dir.path().join("old_name.txt"), dir.path().join("new_name.txt")).unwrap();
    let after = repo.commit_working_dir("Author", "after").unwrap();

    let entries = repo.diff_commits(&before, &after).unwrap();
    assert_eq!(entries.len(), 2);
    let moved_to = entries.iter().find(|e| e.change == ChangeKind::MovedTo).unwrap();
    assert_eq!(moved_to.moved_path.as_deref(), Some("new_name.txt"));
}

//
//
// Merge
//
//

#[test]
fn test_merge_non_conflicting_branches() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file_a.txt", b"base");
    let base = repo.commit_working_dir("Author", "base").unwrap();

    repo.add_branch("feature").unwrap();
    set_branch(&repo, "feature", &base);
    checkout(&repo, "feature");
    write_file(dir.path(), "file_b.txt", b"feature content");
    let feature = repo.commit_working_dir("Author", "feature").unwrap();

    checkout(&repo, DEFAULT_BRANCH);
    set_branch(&repo, DEFAULT_BRANCH, &base);
    fs::remove_file(dir.path().join("file_b.txt")).ok();
    write_file(dir.path(), "file_a.txt", b"main change");
    let main = repo.commit_working_dir("Author", "main").unwrap();

    let result = repo.merge_commits(&main, &feature).unwrap();
    assert!(result.conflicts.is_empty());
    let tree = repo.load_object(&result.tree_hash).unwrap();
    let tree = tree.as_tree().unwrap();
    assert!(tree.get("file_a.txt").is_some());
    assert!(tree.get("file_b.txt").is_some());
}

#[test]
fn test_merge_conflicting_same_file() {
    let (dir, repo) = setup();
    write_file(dir.path(), "file_a.txt", b"base");
    let base = repo.commit_working_dir("Author", "base").unwrap();

    repo.add_branch("feature").unwrap();
    set_branch(&repo, "feature", &base);
    checkout(&repo, "feature");
    write_file(dir.path(), "file_a.txt", b"feature change");
    let feature = repo.commit_working_dir("Author", "feature").unwrap();

    checkout(&repo, DEFAULT_BRANCH);
    set_branch(&repo, DEFAULT_BRANCH, &base);
    write_file(dir.path(), "file_a.txt", b"main change");
    let main = repo.commit_working_dir("Author", "main").unwrap();

    let result = repo.merge_commits(&main, &feature).unwrap();
    assert_eq!(result.conflicts, vec!["file_a.txt".to_string()]);
}

#[test]
fn test_merge_with_no_common_ancestor_fails() {
    let (dir, repo) = setup();
    write_file(dir.path(), "f.txt", b"root a");
    let root_a = repo.commit_working_dir("Author", "root a").unwrap();

    fs::remove_file(repo.head_file()).unwrap();
    refs::write_ref_file(&repo.head_file(), &RefValue::Sym(branch_ref("other"))).unwrap();
    write_file(dir.path(), "f.txt", b"root b");
    let root_b = repo.commit_working_dir("Author", "root b").unwrap();

    assert!(repo.merge_commits(&root_a, &root_b).is_err());
}
