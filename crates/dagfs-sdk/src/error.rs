use dagfs_codec::CodecError;
use dagfs_mfs::FilesError;
use dagfs_pin::PinError;
use dagfs_store::{Aborted, StoreError};
use dagfs_types::{Cid, ErrorKind, TypeError};
use dagfs_unixfs::UnixFsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("repository not initialized at {0}")]
    NotInitialized(String),

    #[error("{0} is pinned")]
    Pinned(Cid),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    UnixFs(#[from] UnixFsError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error(transparent)]
    Pin(#[from] PinError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized(_) => ErrorKind::NotFound,
            Self::Pinned(_) => ErrorKind::Pinned,
            Self::InvalidArgument(_) | Self::Config(_) | Self::Type(_) => ErrorKind::InvalidArgument,
            Self::Io(_) => ErrorKind::Io,
            Self::Store(e) => e.kind(),
            Self::Codec(e) => e.kind(),
            Self::UnixFs(e) => e.kind(),
            Self::Files(e) => e.kind(),
            Self::Pin(e) => e.kind(),
        }
    }
}

impl From<Aborted> for SdkError {
    fn from(aborted: Aborted) -> Self {
        Self::Store(StoreError::Aborted(aborted))
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
