//! Foundation types for dagfs.
//!
//! Every other dagfs crate depends on `dagfs-types`. It pins down how
//! content is named and which encodings the system understands.
//!
//! # Key Types
//!
//! - [`Cid`] — self-describing content identifier (re-exported from `cid`)
//! - [`Codec`] — the block encodings dagfs can store and interpret
//! - [`HashAlg`] — the multihash functions dagfs can compute
//! - [`CidVersion`] — v0 (dag-pb + sha2-256, base58btc) or v1 (any codec, base32)
//! - [`Mtime`] — modification time attached to UnixFS nodes
//!
//! CIDv0 and CIDv1 naming the same codec and multihash are equivalent:
//! [`block_key`] maps both to the same storage key.

pub mod error;
pub mod ident;
pub mod metadata;
pub mod serde_cid;

pub use error::{ErrorKind, TypeError};
pub use ident::{
    block_key, cid_equivalent, cid_version, codec_of, hash_alg_of, parse_cid, to_v0, to_v1, Cid,
    CidVersion, Codec, HashAlg, Multihash,
};
pub use metadata::{format_mode, Mtime, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
