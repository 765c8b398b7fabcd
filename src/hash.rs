use std::fs;
use std::path::Path;

use anyhow::Result;
use sha1::{Digest, Sha1};

/// A lowercase 40-character hex SHA-1 digest, the `Hash` of the data model.
pub type Hash = String;

pub const HASH_HEX_LEN: usize = 40;

#[must_use]
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hashes a file's raw bytes directly (not its canonical object encoding).
pub fn hash_file(path: &Path) -> Result<Hash> {
    let data = fs::read(path)?;
    Ok(hash_bytes(&data))
}

/// A syntactically valid `Hash`: exactly 40 lowercase hex characters.
#[must_use]
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_determinism_vector() {
        assert_eq!(
            hash_bytes(b"hello\n"),
            "f572d396fae9206628714fb2ce00f72e94f2258f"
        );
    }

    #[test]
    fn hash_is_deterministic_and_sensitive() {
        let a = hash_bytes(b"same content");
        let b = hash_bytes(b"same content");
        assert_eq!(a, b);
        assert_ne!(a, hash_bytes(b"different content"));
    }

    #[test]
    fn validates_hash_syntax() {
        assert!(is_valid_hash("f572d396fae9206628714fb2ce00f72e94f2258f"));
        assert!(!is_valid_hash("F572D396FAE9206628714FB2CE00F72E94F2258F"));
        assert!(!is_valid_hash("not a hash"));
    }
}
