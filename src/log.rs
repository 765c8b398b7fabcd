//! Walks a commit's parent chain back to the root.

use anyhow::Result;

use crate::hash::Hash;
use crate::object::Commit;
use crate::repository::Repository;

pub fn log_chain(repo: &Repository, start: &str) -> Result<Vec<(Hash, Commit)>> {
    let mut chain = Vec::new();
    let mut current = Some(repo.resolve_commit(start)?);
    while let Some(hash) = current {
        let commit = repo.load_object(&hash)?.as_commit()?.clone();
        current = commit.parent.clone();
        chain.push((hash, commit));
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Repository, DEFAULT_REPO_DIR};
    use std::fs;

    #[test]
    fn walks_parent_chain_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path(), DEFAULT_REPO_DIR, "main").unwrap();
        fs::write(dir.path().join("a.txt"), "1").unwrap();
        let first = repo.commit_working_dir("Author", "first").unwrap();
        fs::write(dir.path().join("a.txt"), "2").unwrap();
        let second = repo.commit_working_dir("Author", "second").unwrap();

        let chain = log_chain(&repo, "HEAD").unwrap();
        assert_eq!(chain.iter().map(|(h, _)| h.clone()).collect::<Vec<_>>(), vec![second, first]);
    }
}
