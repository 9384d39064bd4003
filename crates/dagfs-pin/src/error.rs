use dagfs_codec::CodecError;
use dagfs_store::{Aborted, StoreError};
use dagfs_types::{Cid, ErrorKind, TypeError};

/// Errors from pin and GC operations.
#[derive(Debug, thiserror::Error)]
pub enum PinError {
    #[error("{0} is not pinned")]
    NotPinned(Cid),

    #[error("{0} already pinned recursively")]
    AlreadyPinnedRecursively(Cid),

    /// A recursive pin cannot be removed as a direct one.
    #[error("{0} is pinned recursively")]
    PinnedRecursively(Cid),

    #[error("{cid} is pinned indirectly under {via}")]
    PinnedIndirectly { cid: Cid, via: Cid },

    #[error("pin records: {0}")]
    Records(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotPinned(_) => ErrorKind::NotPinned,
            Self::AlreadyPinnedRecursively(_) | Self::PinnedRecursively(_) => {
                ErrorKind::AlreadyPinnedRecursively
            }
            Self::PinnedIndirectly { .. } => ErrorKind::PinnedIndirectly,
            Self::Records(_) | Self::Serialization(_) => ErrorKind::Corrupt,
            Self::Io(_) => ErrorKind::Io,
            Self::Type(_) => ErrorKind::InvalidArgument,
            Self::Store(e) => e.kind(),
            Self::Codec(e) => e.kind(),
        }
    }
}

impl From<Aborted> for PinError {
    fn from(aborted: Aborted) -> Self {
        Self::Store(StoreError::Aborted(aborted))
    }
}

pub type PinResult<T> = Result<T, PinError>;
