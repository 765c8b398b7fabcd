//! `Repository` binds a working directory to its `.caf` metadata
//! directory and is the one type most callers (the CLI, tests) need.
//! It is a thin façade: almost everything it does is delegate to
//! `store`, `refs`, `commit`, `diff`, and `merge`, adding path
//! bookkeeping and `RepositoryError` context around their results.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::commit;
use crate::diff::{self, DiffEntry};
use crate::error::CafError;
use crate::hash::{is_valid_hash, Hash};
use crate::merge::{self, MergeResult};
use crate::object::Object;
use crate::refs::{self, branch_ref, tag_ref, RefValue};
use crate::store::ObjectStore;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REPO_DIR: &str = ".caf";

pub struct Repository {
    pub working_dir: PathBuf,
    repo_dir_name: String,
    store: ObjectStore,
}

impl Repository {
    #[must_use]
    pub fn repo_dir(&self) -> PathBuf {
        self.working_dir.join(&self.repo_dir_name)
    }

    #[must_use]
    pub fn objects_dir(&self) -> PathBuf {
        self.store.root().to_path_buf()
    }

    #[must_use]
    pub fn head_file(&self) -> PathBuf {
        refs::path_for(&self.repo_dir(), "HEAD")
    }

    #[must_use]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Creates a fresh `.caf` directory under `working_dir`: the object
    /// store, `refs/heads`, `refs/tags`, an empty `refs/heads/<default_branch>`,
    /// and a `HEAD` pointing at it. Fails with `RepositoryExists` if
    /// `repo_dir_name` already exists under `working_dir`.
    pub fn init(working_dir: impl Into<PathBuf>, repo_dir_name: &str, default_branch: &str) -> Result<Self> {
        let working_dir = working_dir.into();
        let repo_dir = working_dir.join(repo_dir_name);
        if repo_dir.exists() {
            return Err(CafError::RepositoryExists(repo_dir.display().to_string()).into());
        }
        fs::create_dir_all(repo_dir.join("objects")).with_context(|| format!("creating {}", repo_dir.display()))?;
        fs::create_dir_all(repo_dir.join("refs/heads"))?;
        fs::create_dir_all(repo_dir.join("refs/tags"))?;

        let store = ObjectStore::new(repo_dir.join("objects"));
        let repo = Repository { working_dir, repo_dir_name: repo_dir_name.to_string(), store };
        refs::write_empty_ref_file(&refs::path_for(&repo.repo_dir(), &branch_ref(default_branch)))?;
        refs::write_ref_file(&repo.head_file(), &RefValue::Sym(branch_ref(default_branch)))?;
        Ok(repo)
    }

    /// Opens an existing repository, failing if `repo_dir_name` isn't one.
    pub fn open(working_dir: impl Into<PathBuf>, repo_dir_name: &str) -> Result<Self> {
        let working_dir = working_dir.into();
        let repo_dir = working_dir.join(repo_dir_name);
        if !repo_dir.join("objects").is_dir() {
            return Err(CafError::Repository(format!("not a repository: {}", repo_dir.display())).into());
        }
        let store = ObjectStore::new(repo_dir.join("objects"));
        Ok(Repository { working_dir, repo_dir_name: repo_dir_name.to_string(), store })
    }

    /// Deletes the `.caf` directory and everything in it. Idempotent.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_dir_all(self.repo_dir()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("deleting repository"),
        }
    }

    pub fn commit_working_dir(&self, author: &str, message: &str) -> Result<Hash> {
        commit::commit_working_dir(&self.store, &self.repo_dir(), &self.working_dir, &self.repo_dir_name, author, message)
    }

    /// The branch HEAD currently points to, or `None` if HEAD is
    /// detached (a direct commit hash).
    pub fn current_branch(&self) -> Result<Option<String>> {
        match refs::read_ref_file(&self.head_file())? {
            Some(RefValue::Sym(path)) => Ok(RefValue::Sym(path).branch_name().map(str::to_string)),
            Some(RefValue::Hash(_)) | None => Ok(None),
        }
    }

    pub fn update_ref(&self, path: &str, hash: &str) -> Result<()> {
        refs::write_ref_file(&refs::path_for(&self.repo_dir(), path), &RefValue::Hash(hash.to_string()))
    }

    #[must_use]
    pub fn branch_exists(&self, name: &str) -> bool {
        refs::path_for(&self.repo_dir(), &branch_ref(name)).is_file()
    }

    /// Creates `name` as an empty branch - it exists but names no commit
    /// until the next `commit_working_dir` while it's checked out.
    pub fn add_branch(&self, name: &str) -> Result<()> {
        if self.branch_exists(name) {
            return Err(CafError::Repository(format!("branch already exists: {name}")).into());
        }
        refs::write_empty_ref_file(&refs::path_for(&self.repo_dir(), &branch_ref(name)))
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        if !self.branch_exists(name) {
            return Err(CafError::Repository(format!("no such branch: {name}")).into());
        }
        refs::delete_ref_file(&refs::path_for(&self.repo_dir(), &branch_ref(name)))
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        list_ref_names(&self.repo_dir().join("refs/heads"))
    }

    pub fn create_tag(&self, name: &str, commit: Option<&str>) -> Result<()> {
        let hash = match commit {
            Some(c) => self.resolve_commit(c)?,
            None => refs::resolve(&self.repo_dir(), "HEAD")?,
        };
        refs::write_ref_file(&refs::path_for(&self.repo_dir(), &tag_ref(name)), &RefValue::Hash(hash))
    }

    pub fn delete_tag(&self, name: &str) -> Result<()> {
        let path = refs::path_for(&self.repo_dir(), &tag_ref(name));
        if !path.is_file() {
            return Err(CafError::Repository(format!("no such tag: {name}")).into());
        }
        refs::delete_ref_file(&path)
    }

    pub fn list_tags(&self) -> Result<Vec<String>> {
        list_ref_names(&self.repo_dir().join("refs/tags"))
    }

    /// Resolves `reference` - `"HEAD"`, a branch name, a tag name, or a
    /// literal commit hash - to a commit `Hash`.
    pub fn resolve_commit(&self, reference: &str) -> Result<Hash> {
        if reference == "HEAD" {
            return refs::resolve(&self.repo_dir(), "HEAD");
        }
        if self.branch_exists(reference) {
            return refs::resolve(&self.repo_dir(), &branch_ref(reference));
        }
        let tag_path = refs::path_for(&self.repo_dir(), &tag_ref(reference));
        if tag_path.is_file() {
            return refs::resolve(&self.repo_dir(), &tag_ref(reference));
        }
        if is_valid_hash(reference) && self.store.hash_exists(reference) {
            return Ok(reference.to_string());
        }
        Err(CafError::Repository(format!("cannot resolve reference: {reference}")).into())
    }

    pub fn diff_commits(&self, old_ref: &str, new_ref: &str) -> Result<Vec<DiffEntry>> {
        let old = self.resolve_commit(old_ref)?;
        let new = self.resolve_commit(new_ref)?;
        let old_tree = self.store.load_commit(&old)?.tree;
        let new_tree = self.store.load_commit(&new)?.tree;
        diff::diff_commits(&self.store, Some(&old_tree), Some(&new_tree))
    }

    pub fn common_ancestor(&self, a_ref: &str, b_ref: &str) -> Result<Option<Hash>> {
        let a = self.resolve_commit(a_ref)?;
        let b = self.resolve_commit(b_ref)?;
        merge::common_ancestor(&self.store, &a, &b)
    }

    pub fn merge_commits(&self, ours_ref: &str, theirs_ref: &str) -> Result<MergeResult> {
        let ours = self.resolve_commit(ours_ref)?;
        let theirs = self.resolve_commit(theirs_ref)?;
        merge::merge_commits(&self.store, &ours, &theirs)
    }

    pub fn load_object(&self, hash: &str) -> Result<Object> {
        if let Ok(commit) = self.store.load_commit(hash) {
            return Ok(Object::Commit(commit));
        }
        if let Ok(tree) = self.store.load_tree(hash) {
            return Ok(Object::Tree(tree));
        }
        Ok(Object::Blob(self.store.load_blob(hash)?))
    }
}

fn list_ref_names(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|e| e.file_name().into_string().ok())
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}
