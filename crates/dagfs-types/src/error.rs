use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    #[error("unsupported codec: 0x{0:x}")]
    UnsupportedCodec(u64),

    #[error("unsupported hash function: 0x{0:x}")]
    UnsupportedHash(u64),

    #[error("unknown codec name: {0}")]
    UnknownCodecName(String),

    #[error("unknown hash function name: {0}")]
    UnknownHashName(String),

    #[error("invalid CID version: {0}")]
    InvalidCidVersion(u8),

    /// CIDv0 can only name dag-pb blocks hashed with sha2-256.
    #[error("CIDv0 requires dag-pb and sha2-256, got {codec} and {hash}")]
    IncompatibleV0 { codec: String, hash: String },
}

impl TypeError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Stable classification of failures across every dagfs layer.
///
/// Callers branch on the kind rather than on message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidPath,
    InvalidArgument,
    IsADirectory,
    NotADirectory,
    NotEmpty,
    Pinned,
    AlreadyPinnedRecursively,
    NotPinned,
    PinnedIndirectly,
    HashMismatch,
    Cancelled,
    TimedOut,
    /// Stored bytes could not be decoded.
    Corrupt,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::InvalidPath => "invalid-path",
            Self::InvalidArgument => "invalid-argument",
            Self::IsADirectory => "is-a-directory",
            Self::NotADirectory => "not-a-directory",
            Self::NotEmpty => "not-empty",
            Self::Pinned => "pinned",
            Self::AlreadyPinnedRecursively => "already-pinned-recursively",
            Self::NotPinned => "not-pinned",
            Self::PinnedIndirectly => "pinned-indirectly",
            Self::HashMismatch => "hash-mismatch",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed-out",
            Self::Corrupt => "corrupt",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}
