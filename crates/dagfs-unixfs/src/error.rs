use dagfs_codec::CodecError;
use dagfs_store::{Aborted, StoreError};
use dagfs_types::{Cid, ErrorKind, TypeError};

/// Errors from UnixFS operations.
#[derive(Debug, thiserror::Error)]
pub enum UnixFsError {
    #[error("no entry named {0:?}")]
    NoSuchEntry(String),

    #[error("directory already has entry by that name: {0:?}")]
    AlreadyExists(String),

    #[error("{0} is not a directory")]
    NotADirectory(Cid),

    #[error("{0} is a directory")]
    IsADirectory(Cid),

    #[error("invalid entry name {0:?}")]
    InvalidName(String),

    #[error("entry names collide at every shard depth: {0:?}")]
    ShardCollision(Vec<String>),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// The block decodes but is not a UnixFS node dagfs can interpret.
    #[error("{cid} is not a usable UnixFS node: {reason}")]
    Unsupported { cid: Cid, reason: String },

    /// The block is structurally inconsistent.
    #[error("corrupt UnixFS node {cid}: {reason}")]
    Corrupt { cid: Cid, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl UnixFsError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchEntry(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::IsADirectory(_) => ErrorKind::IsADirectory,
            Self::InvalidName(_)
            | Self::ShardCollision(_)
            | Self::InvalidOption(_)
            | Self::Unsupported { .. }
            | Self::Type(_) => ErrorKind::InvalidArgument,
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::Corrupt { .. } => ErrorKind::Corrupt,
            Self::Codec(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

impl From<Aborted> for UnixFsError {
    fn from(aborted: Aborted) -> Self {
        Self::Store(StoreError::Aborted(aborted))
    }
}

/// Result alias for UnixFS operations.
pub type UnixFsResult<T> = Result<T, UnixFsError>;
