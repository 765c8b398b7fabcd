//! References: plain-text files under the repo root that name a commit
//! either directly (a `Hash`) or symbolically (`ref: <path>`, pointing
//! at another ref relative to the repo root).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::CafError;
use crate::hash::is_valid_hash;

const SYM_PREFIX: &str = "ref: ";
const MAX_SYMREF_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Hash(String),
    Sym(String),
}

impl RefValue {
    #[must_use]
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            RefValue::Sym(path) => path.strip_prefix("heads/"),
            RefValue::Hash(_) => None,
        }
    }

    fn serialize(&self) -> String {
        match self {
            RefValue::Hash(hash) => hash.clone(),
            RefValue::Sym(path) => format!("{SYM_PREFIX}{path}"),
        }
    }

    /// Parses a ref file's raw content. Empty (or all-whitespace) content
    /// is a valid "no target yet" ref, returned as `None` - a branch can
    /// exist with no commits behind it.
    fn parse(content: &str) -> Result<Option<Self>> {
        let content = content.trim_end_matches('\n').trim();
        if content.is_empty() {
            Ok(None)
        } else if let Some(path) = content.strip_prefix(SYM_PREFIX) {
            Ok(Some(RefValue::Sym(path.trim().to_string())))
        } else if is_valid_hash(content) {
            Ok(Some(RefValue::Hash(content.to_string())))
        } else {
            Err(CafError::Ref(format!("malformed ref content: {content:?}")).into())
        }
    }
}

#[must_use]
pub fn branch_ref(name: &str) -> String {
    format!("heads/{name}")
}

#[must_use]
pub fn tag_ref(name: &str) -> String {
    format!("tags/{name}")
}

/// Reads and parses a ref file's raw content, without following `Sym`.
/// `Ok(None)` means the ref file exists but is empty: a valid ref with
/// no target yet (e.g. a freshly-created branch with no commits).
pub fn read_ref_file(path: &Path) -> Result<Option<RefValue>> {
    let content = fs::read_to_string(path)
        .map_err(|_| CafError::Ref(format!("no such ref: {}", path.display())))?;
    RefValue::parse(&content)
}

pub fn write_ref_file(path: &Path, value: &RefValue) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating ref dir {}", parent.display()))?;
    }
    fs::write(path, value.serialize()).with_context(|| format!("writing ref {}", path.display()))
}

/// Writes an empty ref file: a branch or tag that exists but has no
/// target yet.
pub fn write_empty_ref_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating ref dir {}", parent.display()))?;
    }
    fs::write(path, "").with_context(|| format!("writing ref {}", path.display()))
}

pub fn delete_ref_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("deleting ref {}", path.display())),
    }
}

/// Follows a ref path under `repo_dir/refs/<path>` (or `repo_dir/HEAD`
/// for the literal path `"HEAD"`) through any chain of `Sym` links,
/// up to `MAX_SYMREF_DEPTH` hops, returning the final commit `Hash`.
/// Errors if the chain bottoms out at an empty ref (a branch that
/// exists but has no commits yet has nothing to resolve to).
pub fn resolve(repo_dir: &Path, path: &str) -> Result<String> {
    let mut current = path.to_string();
    for _ in 0..MAX_SYMREF_DEPTH {
        let file = ref_path(repo_dir, &current);
        match read_ref_file(&file)? {
            Some(RefValue::Hash(hash)) => return Ok(hash),
            Some(RefValue::Sym(next)) => current = next,
            None => return Err(CafError::Ref(format!("ref has no target yet: {current}")).into()),
        }
    }
    Err(CafError::Ref(format!("symbolic ref cycle detected resolving {path}")).into())
}

fn ref_path(repo_dir: &Path, path: &str) -> PathBuf {
    if path == "HEAD" {
        repo_dir.join("HEAD")
    } else {
        repo_dir.join("refs").join(path)
    }
}

pub fn path_for(repo_dir: &Path, path: &str) -> PathBuf {
    ref_path(repo_dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_direct_and_symbolic_refs() {
        let hash = "a".repeat(40);
        assert_eq!(RefValue::parse(&hash).unwrap(), Some(RefValue::Hash(hash.clone())));
        assert_eq!(
            RefValue::parse("ref: heads/main\n").unwrap(),
            Some(RefValue::Sym("heads/main".to_string()))
        );
    }

    #[test]
    fn empty_content_is_a_valid_ref_with_no_target() {
        assert_eq!(RefValue::parse("").unwrap(), None);
        assert_eq!(RefValue::parse("\n").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_ref_content() {
        assert!(RefValue::parse("not a hash or symref").is_err());
    }

    #[test]
    fn resolves_through_a_chain() {
        let dir = tempfile::tempdir().unwrap();
        let hash = "b".repeat(40);
        write_ref_file(&path_for(dir.path(), "heads/main"), &RefValue::Hash(hash.clone())).unwrap();
        write_ref_file(&path_for(dir.path(), "HEAD"), &RefValue::Sym("heads/main".to_string())).unwrap();
        assert_eq!(resolve(dir.path(), "HEAD").unwrap(), hash);
    }

    #[test]
    fn detects_symref_cycles() {
        let dir = tempfile::tempdir().unwrap();
        write_ref_file(&path_for(dir.path(), "a"), &RefValue::Sym("a".to_string())).unwrap();
        assert!(resolve(dir.path(), "a").is_err());
    }

    #[test]
    fn empty_ref_has_nothing_to_resolve_to() {
        let dir = tempfile::tempdir().unwrap();
        write_empty_ref_file(&path_for(dir.path(), "heads/feature")).unwrap();
        assert!(resolve(dir.path(), "heads/feature").is_err());
    }
}
