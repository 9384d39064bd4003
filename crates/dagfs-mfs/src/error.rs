use dagfs_store::{Aborted, StoreError};
use dagfs_types::{ErrorKind, TypeError};
use dagfs_unixfs::UnixFsError;

/// Errors from MFS operations. Lower-layer errors pass through unchanged;
/// the path-level variants carry the path the caller gave.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    #[error("{0} does not exist")]
    DoesNotExist(String),

    #[error("directory already has entry by that name: {0}")]
    AlreadyExists(String),

    #[error("{0} is not a directory")]
    NotADirectory(String),

    #[error("{0} is a directory")]
    IsADirectory(String),

    #[error("{0} is a directory, use -r to remove directories")]
    NotEmpty(String),

    #[error("paths must start with a leading slash: {0:?}")]
    InvalidPath(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("cannot delete root")]
    CannotRemoveRoot,

    #[error("root pointer: {0}")]
    RootStore(String),

    #[error(transparent)]
    UnixFs(#[from] UnixFsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FilesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DoesNotExist(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotADirectory(_) => ErrorKind::NotADirectory,
            Self::IsADirectory(_) => ErrorKind::IsADirectory,
            Self::NotEmpty(_) => ErrorKind::NotEmpty,
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::InvalidArgument(_) | Self::CannotRemoveRoot | Self::Type(_) => {
                ErrorKind::InvalidArgument
            }
            Self::RootStore(_) | Self::Io(_) => ErrorKind::Io,
            Self::UnixFs(e) => e.kind(),
            Self::Store(e) => e.kind(),
        }
    }
}

impl From<Aborted> for FilesError {
    fn from(aborted: Aborted) -> Self {
        Self::Store(StoreError::Aborted(aborted))
    }
}

pub type FilesResult<T> = Result<T, FilesError>;
