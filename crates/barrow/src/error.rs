//! Error taxonomy for the retrieval and verification paths.

use thiserror::Error;

use crate::id::{BlobId, Hash256};

/// A specific integrity violation found while verifying a blob.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Corruption {
    #[error("entries are misaligned: expected stream at {expected}, found {actual}")]
    Misaligned { expected: u64, actual: u64 },

    #[error("entry drained to stream position {actual}, expected {expected}")]
    EntrySizeMismatch { expected: u64, actual: u64 },

    #[error("entry hash mismatch: expected {expected}, got {actual}")]
    EntryHashMismatch { expected: Hash256, actual: Hash256 },

    #[error("entry decompressed to {actual} bytes, hashes table says {expected}")]
    PlainSizeMismatch { expected: u64, actual: u64 },

    #[error("non-zero padding at blob tail")]
    NonZeroPadding,

    #[error("blob stream ended at {actual} bytes, blob row says {expected}")]
    BlobSizeMismatch { expected: u64, actual: u64 },

    #[error("post-encryption digest mismatch: expected {expected}, got {actual}")]
    BlobHashMismatch { expected: Hash256, actual: Hash256 },

    #[error("decompression failed: {0}")]
    Decompress(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// Missing hash, blob, or placement in the metadata store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport or remote failure. Retry policy belongs to the backend;
    /// the core surfaces these as-is.
    #[error("backend error: {0}")]
    Backend(String),

    /// An integrity invariant failed. Identifies the blob and, where one
    /// was being verified, the entry. Never mutates state.
    #[error("blob {blob} is corrupt{}: {reason}", entry.as_ref().map(|e| format!(" (entry {e})")).unwrap_or_default())]
    Corrupt {
        blob: BlobId,
        entry: Option<Hash256>,
        reason: Corruption,
    },

    /// A row violated a schema constraint at read time (wrong blob length,
    /// unknown enum tag, broken reference).
    #[error("schema violation: {0}")]
    Schema(String),

    /// Malformed caller input, e.g. a hash that is not 64 hex characters.
    #[error("invalid input: {0}")]
    Invalid(String),
}

impl Error {
    pub(crate) fn corrupt(blob: &BlobId, entry: Option<&Hash256>, reason: Corruption) -> Self {
        Error::Corrupt {
            blob: *blob,
            entry: entry.copied(),
            reason,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("no matching row".into()),
            other => Error::Schema(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
