//! Snapshotting a working directory into a `Tree`, bottom-up.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::object::{Object, RecordKind, Tree, TreeRecord};
use crate::store::ObjectStore;

/// Walks `dir` recursively (skipping `repo_dir_name`, the repository's
/// own metadata directory, at the top level), saving a blob per file
/// and a tree per directory, and returns the hash of the tree for `dir`.
pub fn write_tree(store: &ObjectStore, dir: &Path, repo_dir_name: &str) -> Result<String> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    let mut records = Vec::new();
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == repo_dir_name {
            continue;
        }
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let sub_hash = write_tree(store, &path, repo_dir_name)?;
            records.push(TreeRecord { kind: RecordKind::Tree, hash: sub_hash, name });
        } else if file_type.is_file() {
            let data = fs::read(&path).with_context(|| format!("reading file {}", path.display()))?;
            let hash = store.save_blob_bytes(&data)?;
            records.push(TreeRecord { kind: RecordKind::Blob, hash, name });
        }
        // symlinks and other non-regular entries are silently skipped:
        // out of scope per the data model.
    }

    let tree = Tree::from_records(records);
    store.save(&Object::Tree(tree))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_hashes_to_the_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".caf")).unwrap();
        let store = ObjectStore::new(dir.path().join(".caf/objects"));
        let hash = write_tree(&store, dir.path(), ".caf").unwrap();
        assert_eq!(hash, crate::object::Object::Tree(crate::object::Tree::new()).hash());
    }

    #[test]
    fn nested_directories_build_bottom_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".caf")).unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), b"// code").unwrap();
        fs::write(dir.path().join("README.md"), b"docs").unwrap();

        let store = ObjectStore::new(dir.path().join(".caf/objects"));
        let hash = write_tree(&store, dir.path(), ".caf").unwrap();
        let tree = store.load_tree(&hash).unwrap();
        assert_eq!(tree.entries().len(), 2);
        assert_eq!(tree.entries()[0].name, "README.md");
        assert_eq!(tree.entries()[1].name, "src");
    }
}
