//! Common-ancestor search and three-way merge.
//!
//! Binary blobs are merged by a small ladder of hash comparisons;
//! text blobs go through a classic three-way (diff3-style) line merge
//! that emits conflict markers verbatim, never inserting a newline
//! the source content didn't already have.

use std::collections::HashSet;

use anyhow::Result;

use crate::error::CafError;
use crate::hash::Hash;
use crate::object::{Object, RecordKind, Tree, TreeRecord};
use crate::store::ObjectStore;

pub struct MergeResult {
    pub tree_hash: Hash,
    pub conflicts: Vec<String>,
}

/// Walks `hash`'s parent chain (inclusive) following single-parent links.
fn ancestors(store: &ObjectStore, hash: &str) -> Result<Vec<Hash>> {
    let mut chain = Vec::new();
    let mut current = Some(hash.to_string());
    while let Some(h) = current {
        let commit = store.load_commit(&h)?;
        current = commit.parent.clone();
        chain.push(h);
    }
    Ok(chain)
}

/// Finds the nearest common ancestor of two commits by walking one
/// parent chain into a set and the other chain checking membership.
/// Returns `None` if the two commits share no history.
pub fn common_ancestor(store: &ObjectStore, a: &str, b: &str) -> Result<Option<Hash>> {
    let a_chain = ancestors(store, a)?;
    let seen: HashSet<&str> = a_chain.iter().map(String::as_str).collect();

    let mut current = Some(b.to_string());
    while let Some(h) = current {
        if seen.contains(h.as_str()) {
            return Ok(Some(h));
        }
        current = store.load_commit(&h)?.parent.clone();
    }
    Ok(None)
}

/// Merges `ours` and `theirs` against their common ancestor, returning
/// the merged tree and the list of paths left with conflicts.
pub fn merge_commits(store: &ObjectStore, ours: &str, theirs: &str) -> Result<MergeResult> {
    let base = common_ancestor(store, ours, theirs)?
        .ok_or_else(|| CafError::Repository(format!("no common ancestor between {ours} and {theirs}")))?;

    let base_tree = store.load_commit(&base)?.tree;
    let ours_tree = store.load_commit(ours)?.tree;
    let theirs_tree = store.load_commit(theirs)?.tree;

    let mut conflicts = Vec::new();
    let merged = merge_trees(store, Some(&base_tree), Some(&ours_tree), Some(&theirs_tree), "", &mut conflicts)?;
    let tree_hash = store.save(&Object::Tree(merged))?;
    Ok(MergeResult { tree_hash, conflicts })
}

#[derive(Clone)]
struct Slot(Option<(RecordKind, Hash)>);

impl Slot {
    fn from_record(r: Option<&TreeRecord>) -> Self {
        Slot(r.map(|r| (r.kind, r.hash.clone())))
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

fn tree_entries(tree: Option<&Tree>) -> &[TreeRecord] {
    static EMPTY: Vec<TreeRecord> = Vec::new();
    tree.map_or(EMPTY.as_slice(), Tree::entries)
}

/// Recursively merges three trees (any may be absent) name by name.
fn merge_trees(
    store: &ObjectStore,
    base_hash: Option<&str>,
    ours_hash: Option<&str>,
    theirs_hash: Option<&str>,
    path: &str,
    conflicts: &mut Vec<String>,
) -> Result<Tree> {
    let base = base_hash.map(|h| store.load_tree(h)).transpose()?;
    let ours = ours_hash.map(|h| store.load_tree(h)).transpose()?;
    let theirs = theirs_hash.map(|h| store.load_tree(h)).transpose()?;

    let mut names: Vec<&str> = Vec::new();
    for t in [&base, &ours, &theirs].into_iter().flatten() {
        for r in t.entries() {
            if !names.contains(&r.name.as_str()) {
                names.push(&r.name);
            }
        }
    }
    names.sort_unstable();

    let mut result = Vec::new();
    for name in names {
        let b = tree_entries(base.as_ref()).iter().find(|r| r.name == name);
        let o = tree_entries(ours.as_ref()).iter().find(|r| r.name == name);
        let t = tree_entries(theirs.as_ref()).iter().find(|r| r.name == name);

        let child_path = if path.is_empty() { name.to_string() } else { format!("{path}/{name}") };

        if let Some(record) = merge_entry(store, b, o, t, &child_path, conflicts)? {
            result.push(record);
        }
    }

    Ok(Tree::from_records(result))
}

fn merge_entry(
    store: &ObjectStore,
    b: Option<&TreeRecord>,
    o: Option<&TreeRecord>,
    t: Option<&TreeRecord>,
    path: &str,
    conflicts: &mut Vec<String>,
) -> Result<Option<TreeRecord>> {
    let base_slot = Slot::from_record(b);
    let ours_slot = Slot::from_record(o);
    let theirs_slot = Slot::from_record(t);
    let name = b.or(o).or(t).expect("at least one side names this entry").name.clone();

    if ours_slot == theirs_slot {
        return Ok(o.or(t).cloned());
    }
    if base_slot == ours_slot {
        return Ok(t.cloned());
    }
    if base_slot == theirs_slot {
        return Ok(o.cloned());
    }

    match (o, t) {
        (Some(o), Some(t)) if o.kind == RecordKind::Tree && t.kind == RecordKind::Tree => {
            let base_hash = b.filter(|b| b.kind == RecordKind::Tree).map(|b| b.hash.as_str());
            let merged = merge_trees(store, base_hash, Some(&o.hash), Some(&t.hash), path, conflicts)?;
            let hash = store.save(&Object::Tree(merged))?;
            Ok(Some(TreeRecord { kind: RecordKind::Tree, hash, name }))
        }
        (Some(o), Some(t)) if o.kind == RecordKind::Blob && t.kind == RecordKind::Blob => {
            let base_hash = b.filter(|b| b.kind == RecordKind::Blob).map(|b| b.hash.as_str());
            let (hash, conflicted) = merge_blob(store, base_hash, Some(&o.hash), Some(&t.hash))?;
            if conflicted {
                conflicts.push(path.to_string());
            }
            Ok(Some(TreeRecord { kind: RecordKind::Blob, hash, name }))
        }
        (None, None) => Ok(None),
        (Some(winner), None) | (None, Some(winner)) => {
            conflicts.push(path.to_string());
            Ok(Some(winner.clone()))
        }
        (Some(o), Some(_)) => {
            // same name, incompatible kinds (e.g. blob vs tree): prefer ours, flag it.
            conflicts.push(path.to_string());
            Ok(Some(o.clone()))
        }
    }
}

const BINARY_SAMPLE_LEN: usize = 8192;
const NON_TEXT_RATIO_THRESHOLD: f64 = 0.30;

/// Samples up to the first 8KiB: a null byte anywhere marks the blob
/// binary outright; otherwise more than 30% of sampled bytes falling
/// outside printable ASCII plus tab/LF/CR (or hitting DEL) does.
#[must_use]
pub fn is_binary_blob(data: &[u8]) -> bool {
    let sample = &data[..data.len().min(BINARY_SAMPLE_LEN)];
    if sample.contains(&0) {
        return true;
    }
    if sample.is_empty() {
        return false;
    }
    let non_text = sample
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, 9 | 10 | 13)) || b == 0x7F)
        .count();
    (non_text as f64 / sample.len() as f64) > NON_TEXT_RATIO_THRESHOLD
}

/// Merges one blob entry present on at least one of ours/theirs.
/// Returns the resulting blob hash and whether the merge left a conflict.
fn merge_blob(store: &ObjectStore, base: Option<&str>, ours: Option<&str>, theirs: Option<&str>) -> Result<(Hash, bool)> {
    let base_data = base.map(|h| store.load_blob(h)).transpose()?;
    let ours_data = ours.map(|h| store.load_blob(h)).transpose()?;
    let theirs_data = theirs.map(|h| store.load_blob(h)).transpose()?;

    let any_binary = [&base_data, &ours_data, &theirs_data]
        .into_iter()
        .flatten()
        .any(|d| is_binary_blob(d));

    if any_binary {
        merge_blob_binary(store, base, ours, theirs)
    } else {
        merge_blob_text(store, base_data.as_deref(), ours_data.as_deref(), theirs_data.as_deref())
    }
}

fn merge_blob_binary(store: &ObjectStore, base: Option<&str>, ours: Option<&str>, theirs: Option<&str>) -> Result<(Hash, bool)> {
    if ours == theirs {
        let hash = ours.or(theirs).expect("at least one side present").to_string();
        return Ok((hash, false));
    }
    if base == ours {
        return Ok((theirs.expect("theirs differs from base/ours").to_string(), false));
    }
    if base == theirs {
        return Ok((ours.expect("ours differs from base/theirs").to_string(), false));
    }
    match ours {
        Some(hash) => Ok((hash.to_string(), true)),
        None => match theirs {
            Some(hash) => Ok((hash.to_string(), true)),
            None => Err(CafError::Merge("binary conflict with no content on either side".to_string()).into()),
        },
    }
}

fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Longest common contiguous run between `a[..]` and `b[..]`: returns
/// `(a_start, b_start, len)` of the first maximal-length match found.
fn longest_match<'a>(a: &[&'a [u8]], b: &[&'a [u8]]) -> Option<(usize, usize, usize)> {
    let mut best = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            if a[i] != b[j] {
                continue;
            }
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > best.2 {
                best = (i, j, k);
            }
        }
    }
    if best.2 == 0 {
        None
    } else {
        Some(best)
    }
}

fn matching_blocks_range(a: &[&[u8]], b: &[&[u8]], a_lo: usize, a_hi: usize, b_lo: usize, b_hi: usize, out: &mut Vec<(usize, usize, usize)>) {
    if a_lo >= a_hi || b_lo >= b_hi {
        return;
    }
    if let Some((i, j, k)) = longest_match(&a[a_lo..a_hi], &b[b_lo..b_hi]) {
        let (ai, bj) = (a_lo + i, b_lo + j);
        matching_blocks_range(a, b, a_lo, ai, b_lo, bj, out);
        out.push((ai, bj, k));
        matching_blocks_range(a, b, ai + k, a_hi, bj + k, b_hi, out);
    }
}

fn matching_blocks(a: &[&[u8]], b: &[&[u8]]) -> Vec<(usize, usize, usize)> {
    let mut out = Vec::new();
    matching_blocks_range(a, b, 0, a.len(), 0, b.len(), &mut out);
    out
}

/// Classic three-way line merge: base lines that survive unchanged on
/// both sides act as synchronization anchors; everything between two
/// anchors is resolved independently (take the side that changed, or
/// emit a conflict hunk if both changed and disagree).
fn merge_blob_text(store: &ObjectStore, base: Option<&[u8]>, ours: Option<&[u8]>, theirs: Option<&[u8]>) -> Result<(Hash, bool)> {
    let base = base.unwrap_or(&[]);
    let ours = ours.unwrap_or(&[]);
    let theirs = theirs.unwrap_or(&[]);

    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let ours_blocks = matching_blocks(&base_lines, &ours_lines);
    let theirs_blocks = matching_blocks(&base_lines, &theirs_lines);

    let mut ours_map = vec![None; base_lines.len()];
    for &(bi, oi, len) in &ours_blocks {
        for k in 0..len {
            ours_map[bi + k] = Some(oi + k);
        }
    }
    let mut theirs_map = vec![None; base_lines.len()];
    for &(bi, ti, len) in &theirs_blocks {
        for k in 0..len {
            theirs_map[bi + k] = Some(ti + k);
        }
    }

    let mut anchors = Vec::new();
    for i in 0..base_lines.len() {
        if let (Some(oi), Some(ti)) = (ours_map[i], theirs_map[i]) {
            anchors.push((i, oi, ti));
        }
    }

    let mut out = Vec::new();
    let mut conflicted = false;
    let (mut pb, mut po, mut pt) = (0usize, 0usize, 0usize);

    for (bi, oi, ti) in anchors {
        resolve_group(&base_lines[pb..bi], &ours_lines[po..oi], &theirs_lines[pt..ti], &mut out, &mut conflicted);
        out.extend_from_slice(base_lines[bi]);
        pb = bi + 1;
        po = oi + 1;
        pt = ti + 1;
    }
    resolve_group(&base_lines[pb..], &ours_lines[po..], &theirs_lines[pt..], &mut out, &mut conflicted);

    let hash = store.save_blob_bytes(&out)?;
    Ok((hash, conflicted))
}

fn resolve_group(base: &[&[u8]], ours: &[&[u8]], theirs: &[&[u8]], out: &mut Vec<u8>, conflicted: &mut bool) {
    if ours == base {
        for l in theirs {
            out.extend_from_slice(l);
        }
    } else if theirs == base {
        for l in ours {
            out.extend_from_slice(l);
        }
    } else if ours == theirs {
        for l in ours {
            out.extend_from_slice(l);
        }
    } else {
        *conflicted = true;
        out.extend_from_slice(b"<<<<<<< ours\n");
        for l in ours {
            out.extend_from_slice(l);
        }
        out.extend_from_slice(b"=======\n");
        for l in theirs {
            out.extend_from_slice(l);
        }
        out.extend_from_slice(b">>>>>>> theirs\n");
    }
}
