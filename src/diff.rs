//! The structural diff engine: a recursive, hierarchical comparison of
//! two trees that reports added, removed, and modified entries, then
//! a second pass that re-labels exact blob-hash matches between a
//! removed and an added leaf as a move.

use std::collections::HashMap;

use anyhow::Result;

use crate::hash::Hash;
use crate::object::{RecordKind, Tree, TreeRecord};
use crate::store::ObjectStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    MovedFrom,
    MovedTo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub name: String,
    pub record_kind: RecordKind,
    pub change: ChangeKind,
    pub old_hash: Option<Hash>,
    pub new_hash: Option<Hash>,
    /// For `MovedFrom`/`MovedTo`: the full slash-joined path on the other side.
    pub moved_path: Option<String>,
    pub children: Vec<DiffEntry>,
}

/// Diffs the tree at `old_hash` against the tree at `new_hash` (either
/// may be `None`, meaning "did not exist"), returning a move-resolved
/// forest sorted lexicographically by name at every level.
pub fn diff_commits(store: &ObjectStore, old_tree: Option<&str>, new_tree: Option<&str>) -> Result<Vec<DiffEntry>> {
    let old = old_tree.map(|h| store.load_tree(h)).transpose()?;
    let new = new_tree.map(|h| store.load_tree(h)).transpose()?;
    let mut forest = diff_trees(store, old.as_ref(), new.as_ref())?;
    resolve_moves(&mut forest);
    Ok(forest)
}

fn diff_trees(store: &ObjectStore, old: Option<&Tree>, new: Option<&Tree>) -> Result<Vec<DiffEntry>> {
    let empty: Vec<TreeRecord> = Vec::new();
    let old_entries = old.map_or(empty.as_slice(), Tree::entries);
    let new_entries = new.map_or(empty.as_slice(), Tree::entries);

    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < old_entries.len() || j < new_entries.len() {
        let take_old = j >= new_entries.len() || (i < old_entries.len() && old_entries[i].name < new_entries[j].name);
        let take_new = i >= old_entries.len() || (j < new_entries.len() && new_entries[j].name < old_entries[i].name);

        if take_old && !take_new {
            result.push(subtree_as_change(store, &old_entries[i], ChangeKind::Removed)?);
            i += 1;
        } else if take_new && !take_old {
            result.push(subtree_as_change(store, &new_entries[j], ChangeKind::Added)?);
            j += 1;
        } else {
            let (o, n) = (&old_entries[i], &new_entries[j]);
            if o.hash == n.hash && o.kind == n.kind {
                // unchanged, omit
            } else if o.kind != n.kind {
                result.push(subtree_as_change(store, o, ChangeKind::Removed)?);
                result.push(subtree_as_change(store, n, ChangeKind::Added)?);
            } else if o.kind == RecordKind::Blob {
                result.push(DiffEntry {
                    name: n.name.clone(),
                    record_kind: RecordKind::Blob,
                    change: ChangeKind::Modified,
                    old_hash: Some(o.hash.clone()),
                    new_hash: Some(n.hash.clone()),
                    moved_path: None,
                    children: Vec::new(),
                });
            } else {
                let old_sub = store.load_tree(&o.hash)?;
                let new_sub = store.load_tree(&n.hash)?;
                let children = diff_trees(store, Some(&old_sub), Some(&new_sub))?;
                if !children.is_empty() {
                    result.push(DiffEntry {
                        name: n.name.clone(),
                        record_kind: RecordKind::Tree,
                        change: ChangeKind::Modified,
                        old_hash: Some(o.hash.clone()),
                        new_hash: Some(n.hash.clone()),
                        moved_path: None,
                        children,
                    });
                }
            }
            i += 1;
            j += 1;
        }
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

/// Renders a record that exists wholly on one side as a fully-expanded
/// Added/Removed subtree, so every leaf blob inside it is individually
/// visible to move detection.
fn subtree_as_change(store: &ObjectStore, record: &TreeRecord, change: ChangeKind) -> Result<DiffEntry> {
    let children = if record.kind == RecordKind::Tree {
        let sub = store.load_tree(&record.hash)?;
        let (old, new) = match change {
            ChangeKind::Removed => (Some(&sub), None),
            _ => (None, Some(&sub)),
        };
        diff_trees(store, old, new)?
    } else {
        Vec::new()
    };

    Ok(DiffEntry {
        name: record.name.clone(),
        record_kind: record.kind,
        change,
        old_hash: if change == ChangeKind::Removed { Some(record.hash.clone()) } else { None },
        new_hash: if change == ChangeKind::Added { Some(record.hash.clone()) } else { None },
        moved_path: None,
        children,
    })
}

/// Flat handle to a blob-level Added/Removed leaf, used only during
/// move resolution.
struct Leaf {
    path: String,
    index_path: Vec<usize>,
}

fn resolve_moves(forest: &mut [DiffEntry]) {
    let mut removed: HashMap<Hash, Vec<Leaf>> = HashMap::new();
    let mut added: HashMap<Hash, Vec<Leaf>> = HashMap::new();
    collect_leaves(forest, String::new(), Vec::new(), &mut removed, &mut added);

    let mut hashes: Vec<Hash> = removed.keys().filter(|h| added.contains_key(*h)).cloned().collect();
    hashes.sort();

    for hash in hashes {
        let mut rs = removed.remove(&hash).unwrap_or_default();
        let mut ads = added.remove(&hash).unwrap_or_default();
        rs.sort_by(|a, b| a.path.cmp(&b.path));
        ads.sort_by(|a, b| a.path.cmp(&b.path));

        for (r, a) in rs.into_iter().zip(ads.into_iter()) {
            let r_path = r.path.clone();
            let a_path = a.path.clone();
            if let Some(entry) = locate_mut(forest, &r.index_path) {
                entry.change = ChangeKind::MovedTo;
                entry.moved_path = Some(a_path);
            }
            if let Some(entry) = locate_mut(forest, &a.index_path) {
                entry.change = ChangeKind::MovedFrom;
                entry.moved_path = Some(r_path);
            }
        }
    }
}

fn collect_leaves(
    entries: &[DiffEntry],
    prefix: String,
    index_path: Vec<usize>,
    removed: &mut HashMap<Hash, Vec<Leaf>>,
    added: &mut HashMap<Hash, Vec<Leaf>>,
) {
    for (idx, entry) in entries.iter().enumerate() {
        let path = if prefix.is_empty() { entry.name.clone() } else { format!("{prefix}/{}", entry.name) };
        let mut my_index_path = index_path.clone();
        my_index_path.push(idx);

        match (entry.record_kind, entry.change) {
            (RecordKind::Blob, ChangeKind::Removed) => {
                let hash = entry.old_hash.clone().expect("removed blob carries old_hash");
                removed.entry(hash).or_default().push(Leaf { path: path.clone(), index_path: my_index_path.clone() });
            }
            (RecordKind::Blob, ChangeKind::Added) => {
                let hash = entry.new_hash.clone().expect("added blob carries new_hash");
                added.entry(hash).or_default().push(Leaf { path: path.clone(), index_path: my_index_path.clone() });
            }
            _ => {}
        }

        if !entry.children.is_empty() {
            collect_leaves(&entry.children, path, my_index_path, removed, added);
        }
    }
}

fn locate_mut<'a>(forest: &'a mut [DiffEntry], index_path: &[usize]) -> Option<&'a mut DiffEntry> {
    let (&first, rest) = index_path.split_first()?;
    let entry = forest.get_mut(first)?;
    if rest.is_empty() {
        Some(entry)
    } else {
        locate_mut(&mut entry.children, rest)
    }
}
