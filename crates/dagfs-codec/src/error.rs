use dagfs_store::StoreError;
use dagfs_types::{Cid, ErrorKind, TypeError};

/// Errors from encoding, decoding, and resolving blocks.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid dag-pb node: {0}")]
    DagPb(String),

    #[error("invalid UnixFS data: {0}")]
    UnixFs(String),

    #[error("invalid dag-cbor: {0}")]
    Cbor(String),

    #[error("invalid dag-json: {0}")]
    Json(String),

    /// The value has no representation in the requested codec.
    #[error("cannot encode as {codec}: {reason}")]
    Unrepresentable { codec: String, reason: String },

    /// A path segment named nothing in the node it was applied to.
    #[error("no link named {segment:?} under {cid}")]
    PathNotFound { cid: Cid, segment: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CodecError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::PathNotFound { .. } => ErrorKind::NotFound,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

impl From<dagfs_store::Aborted> for CodecError {
    fn from(aborted: dagfs_store::Aborted) -> Self {
        Self::Store(StoreError::Aborted(aborted))
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
