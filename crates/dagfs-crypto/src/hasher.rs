use dagfs_types::{Cid, CidVersion, Codec, HashAlg, Multihash, TypeError};
use sha2::{Digest, Sha256, Sha512};

/// Largest digest a [`Multihash`] can hold. Identity hashes longer than
/// this cannot be expressed as a CID.
pub const MAX_DIGEST_LEN: usize = 64;

/// Multihash computer for a single hash function.
///
/// Each hasher is bound to one [`HashAlg`]; the resulting multihash carries
/// the algorithm code so a digest can always be re-verified later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    alg: HashAlg,
}

impl ContentHasher {
    /// The default hasher for UnixFS content and CIDv0.
    pub const SHA2_256: Self = Self {
        alg: HashAlg::Sha2_256,
    };
    pub const SHA2_512: Self = Self {
        alg: HashAlg::Sha2_512,
    };
    pub const BLAKE3: Self = Self {
        alg: HashAlg::Blake3,
    };
    /// Embeds the content itself as the digest.
    pub const IDENTITY: Self = Self {
        alg: HashAlg::Identity,
    };

    /// Create a hasher for the given algorithm.
    pub const fn new(alg: HashAlg) -> Self {
        Self { alg }
    }

    /// The hash function this hasher computes.
    pub fn alg(&self) -> HashAlg {
        self.alg
    }

    /// Compute the multihash of `data`.
    pub fn digest(&self, data: &[u8]) -> HasherResult<Multihash> {
        match self.alg {
            HashAlg::Identity => {
                if data.len() > MAX_DIGEST_LEN {
                    return Err(HasherError::DigestTooLong(data.len()));
                }
                wrap(self.alg, data)
            }
            HashAlg::Sha2_256 => wrap(self.alg, Sha256::digest(data).as_slice()),
            HashAlg::Sha2_512 => wrap(self.alg, Sha512::digest(data).as_slice()),
            HashAlg::Blake3 => wrap(self.alg, blake3::hash(data).as_bytes()),
        }
    }

    /// Verify that `data` hashes to `expected`.
    pub fn verify(&self, data: &[u8], expected: &Multihash) -> bool {
        self.digest(data).map(|mh| mh == *expected).unwrap_or(false)
    }
}

fn wrap(alg: HashAlg, digest: &[u8]) -> HasherResult<Multihash> {
    Multihash::wrap(alg.code(), digest).map_err(|e| HasherError::Multihash(e.to_string()))
}

/// Derive the CID of a block.
///
/// CIDv0 only exists for dag-pb blocks hashed with sha2-256; any other
/// combination is rejected rather than silently upgraded.
pub fn cid_for(data: &[u8], codec: Codec, alg: HashAlg, version: CidVersion) -> HasherResult<Cid> {
    let mh = ContentHasher::new(alg).digest(data)?;
    match version {
        CidVersion::V1 => Ok(Cid::new_v1(codec.code(), mh)),
        CidVersion::V0 => {
            if codec != Codec::DagPb || alg != HashAlg::Sha2_256 {
                return Err(HasherError::Type(TypeError::IncompatibleV0 {
                    codec: codec.name().to_string(),
                    hash: alg.name().to_string(),
                }));
            }
            Cid::new_v0(mh).map_err(|e| HasherError::Multihash(e.to_string()))
        }
    }
}

/// Check that `data` is the content addressed by `cid`.
///
/// Fails if the CID uses a hash function dagfs cannot compute.
pub fn verify_cid(cid: &Cid, data: &[u8]) -> HasherResult<bool> {
    let alg = HashAlg::from_code(cid.hash().code())?;
    Ok(ContentHasher::new(alg).verify(data, cid.hash()))
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum HasherError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("identity digest of {0} bytes exceeds the 64 byte limit")]
    DigestTooLong(usize),

    #[error("multihash error: {0}")]
    Multihash(String),
}

impl HasherError {
    /// Classification of this error.
    pub fn kind(&self) -> dagfs_types::ErrorKind {
        dagfs_types::ErrorKind::InvalidArgument
    }
}

/// Result alias for hashing operations.
pub type HasherResult<T> = Result<T, HasherError>;
