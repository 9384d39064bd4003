use dagfs_crypto::HasherError;
use dagfs_types::{Cid, ErrorKind, TypeError};

use crate::abort::Aborted;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The block is not held locally and no peer supplied it.
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// Bytes do not hash to the CID they were offered under.
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: Cid, computed: Cid },

    /// Unsupported codec, hash function, or CID version combination.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Hasher(#[from] HasherError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Aborted(#[from] Aborted),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored file could not be mapped back to a block.
    #[error("corrupt block store entry {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("exchange error: {0}")]
    Exchange(String),
}

impl StoreError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::HashMismatch { .. } => ErrorKind::HashMismatch,
            Self::InvalidInput(_) | Self::Hasher(_) | Self::Type(_) => ErrorKind::InvalidArgument,
            Self::Aborted(Aborted::Cancelled) => ErrorKind::Cancelled,
            Self::Aborted(Aborted::TimedOut) => ErrorKind::TimedOut,
            Self::Io(_) | Self::Exchange(_) => ErrorKind::Io,
            Self::Corrupt { .. } => ErrorKind::Corrupt,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
