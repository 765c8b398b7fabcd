//! The object model: blobs, trees, commits, and their canonical
//! on-disk encodings. Hashing an object's canonical encoding (not its
//! in-memory shape) is what gives it its `Hash`.

use anyhow::{bail, Result};

use crate::hash::{hash_bytes, Hash};

/// A `Tree` entry can name either a blob or another tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Blob,
    Tree,
}

impl RecordKind {
    fn as_str(self) -> &'static str {
        match self {
            RecordKind::Blob => "blob",
            RecordKind::Tree => "tree",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(RecordKind::Blob),
            "tree" => Ok(RecordKind::Tree),
            other => bail!("unknown tree record kind: {other}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRecord {
    pub kind: RecordKind,
    pub hash: Hash,
    pub name: String,
}

/// A directory snapshot: child records sorted and unique by name.
///
/// The sort order is the invariant, not an encoding detail - it is
/// enforced whenever a `Tree` is built, so two trees with the same
/// members always hash identically regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    entries: Vec<TreeRecord>,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a `Tree` from arbitrarily-ordered records, sorting by name.
    ///
    /// # Panics
    /// Panics if two records share a name; a working directory can never
    /// produce that, and any other caller has a bug.
    #[must_use]
    pub fn from_records(mut entries: Vec<TreeRecord>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in entries.windows(2) {
            assert!(pair[0].name != pair[1].name, "duplicate tree entry name: {}", pair[0].name);
        }
        Tree { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[TreeRecord] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TreeRecord> {
        self.entries.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The canonical textual encoding: one `<kind> <hash> <name>\n` line
    /// per entry, in sorted order.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for r in &self.entries {
            out.extend_from_slice(r.kind.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(r.hash.as_bytes());
            out.push(b' ');
            out.extend_from_slice(r.name.as_bytes());
            out.push(b'\n');
        }
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)?;
        let mut entries = Vec::new();
        for line in text.lines() {
            let mut parts = line.splitn(3, ' ');
            let (Some(kind), Some(hash), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
                bail!("malformed tree record: {line:?}");
            };
            entries.push(TreeRecord {
                kind: RecordKind::parse(kind)?,
                hash: hash.to_string(),
                name: name.to_string(),
            });
        }
        Ok(Tree { entries })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Hash,
    pub parent: Option<Hash>,
    pub author: String,
    pub message: String,
    pub timestamp: i64,
}

impl Commit {
    /// Canonical encoding: ordered `key value` header lines, a blank
    /// line, then the literal message (not a `message` field - see
    /// `decode` for the corresponding parse).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("tree ");
        out.push_str(&self.tree);
        out.push('\n');
        if let Some(parent) = &self.parent {
            out.push_str("parent ");
            out.push_str(parent);
            out.push('\n');
        }
        out.push_str("author ");
        out.push_str(&self.author);
        out.push('\n');
        out.push_str("timestamp ");
        out.push_str(&self.timestamp.to_string());
        out.push('\n');
        out.push('\n');
        out.push_str("message ");
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)?;
        let (header, rest) = text.split_once("\n\n").ok_or_else(|| anyhow::anyhow!("malformed commit: no header/message separator"))?;

        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut timestamp = None;

        for line in header.lines() {
            let (key, value) = line.split_once(' ').ok_or_else(|| anyhow::anyhow!("malformed commit header line: {line:?}"))?;
            match key {
                "tree" => tree = Some(value.to_string()),
                "parent" => parent = Some(value.to_string()),
                "author" => author = Some(value.to_string()),
                "timestamp" => timestamp = Some(value.parse::<i64>()?),
                other => bail!("unknown commit header key: {other}"),
            }
        }

        let message = rest.strip_prefix("message ").unwrap_or(rest).to_string();

        Ok(Commit {
            tree: tree.ok_or_else(|| anyhow::anyhow!("commit missing tree"))?,
            parent,
            author: author.ok_or_else(|| anyhow::anyhow!("commit missing author"))?,
            message,
            timestamp: timestamp.ok_or_else(|| anyhow::anyhow!("commit missing timestamp"))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Vec<u8>),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Object::Blob(data) => data.clone(),
            Object::Tree(tree) => tree.encode(),
            Object::Commit(commit) => commit.encode(),
        }
    }

    /// The object's content-address: the hash of its canonical encoding.
    #[must_use]
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.encode())
    }

    pub fn as_tree(&self) -> Result<&Tree> {
        match self {
            Object::Tree(t) => Ok(t),
            _ => bail!("expected a tree object"),
        }
    }

    pub fn as_commit(&self) -> Result<&Commit> {
        match self {
            Object::Commit(c) => Ok(c),
            _ => bail!("expected a commit object"),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Object::Blob(b) => Ok(b),
            _ => bail!("expected a blob object"),
        }
    }
}
