//! The object store: one file per object, sharded by the first two
//! hex characters of its hash, under `<repo>/objects/`.
//!
//! Writes land in a temp file in the same shard directory and are
//! renamed into place, so a crash mid-write never leaves a partial
//! object visible under its final name. Reads go through `memmap2`
//! so large blobs/trees don't need a full-size heap copy just to be
//! looked at.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;

use crate::error::CafError;
use crate::hash::{hash_bytes, Hash};
use crate::object::{Commit, Object, Tree};

pub struct ObjectStore {
    root: PathBuf,
}

impl ObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ObjectStore { root: root.into() }
    }

    fn shard_dir(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[0..2])
    }

    fn object_path(&self, hash: &str) -> PathBuf {
        self.shard_dir(hash).join(hash)
    }

    #[must_use]
    pub fn hash_exists(&self, hash: &str) -> bool {
        self.object_path(hash).is_file()
    }

    /// Writes an object's canonical encoding, returning its hash.
    /// A second `save` of an object with the same content is a no-op:
    /// the temp-then-rename always lands on the same path.
    pub fn save(&self, object: &Object) -> Result<Hash> {
        let encoded = object.encode();
        let hash = hash_bytes(&encoded);
        self.save_raw(&hash, &encoded)?;
        Ok(hash)
    }

    fn save_raw(&self, hash: &str, data: &[u8]) -> Result<()> {
        if self.hash_exists(hash) {
            return Ok(());
        }
        let dir = self.shard_dir(hash);
        fs::create_dir_all(&dir).with_context(|| format!("creating object shard dir {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        std::io::Write::write_all(&mut tmp, data)?;
        tmp.persist(self.object_path(hash))
            .map_err(|e| anyhow::anyhow!("renaming object into place: {e}"))?;
        Ok(())
    }

    fn load_raw(&self, hash: &str) -> Result<Vec<u8>> {
        let path = self.object_path(hash);
        let file = File::open(&path).map_err(|_| CafError::ObjectNotFound(hash.to_string()))?;
        // SAFETY: objects are write-once (temp+rename) and never
        // mutated in place after becoming visible under their final name.
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping object {hash}"))?;
        Ok(mmap.to_vec())
    }

    /// Opens an object's content for reading via mmap. The mapping is
    /// dropped when the returned value goes out of scope.
    pub fn open_for_reading(&self, hash: &str) -> Result<Mmap> {
        let path = self.object_path(hash);
        let file = File::open(&path).map_err(|_| CafError::ObjectNotFound(hash.to_string()))?;
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping object {hash}"))?;
        Ok(mmap)
    }

    pub fn load_blob(&self, hash: &str) -> Result<Vec<u8>> {
        self.load_raw(hash)
    }

    pub fn load_tree(&self, hash: &str) -> Result<Tree> {
        let data = self.load_raw(hash)?;
        Tree::decode(&data).with_context(|| format!("decoding tree {hash}"))
    }

    pub fn load_commit(&self, hash: &str) -> Result<Commit> {
        let data = self.load_raw(hash)?;
        Commit::decode(&data).with_context(|| format!("decoding commit {hash}"))
    }

    pub fn save_blob_bytes(&self, data: &[u8]) -> Result<Hash> {
        self.save(&Object::Blob(data.to_vec()))
    }

    /// Deletes an object if present. Deleting an absent hash is a
    /// successful no-op.
    pub fn delete(&self, hash: &str) -> Result<()> {
        let path = self.object_path(hash);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting object {hash}")),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
