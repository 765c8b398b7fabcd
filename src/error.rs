//! Typed error kinds for the object graph and repository layers.
//!
//! Lower layers still build and propagate these with `anyhow::Error`
//! (via `bail!` or `anyhow::Error::new`), matching the rest of the
//! crate's `anyhow::Result` idiom. `CafError` exists so the CLI layer
//! can downcast and pick a stable message prefix instead of stringifying
//! whatever the innermost layer happened to say.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CafError {
    #[error("repository error: {0}")]
    Repository(String),

    #[error("repository already exists: {0}")]
    RepositoryExists(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("ref error: {0}")]
    Ref(String),

    #[error("merge error: {0}")]
    Merge(String),

    #[error("decode error: {0}")]
    Decode(String),
}
