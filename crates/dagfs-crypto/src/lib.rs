//! Hashing primitives for dagfs.
//!
//! Provides multihash computation for every supported [`HashAlg`], CID
//! derivation from block bytes, and the murmur3 hash that places names in
//! HAMT-sharded directories.
//!
//! All digests wrap established libraries (`sha2`, `blake3`). Murmur3 is
//! not a cryptographic hash and is only used for directory sharding.
//!
//! [`HashAlg`]: dagfs_types::HashAlg

pub mod hasher;
pub mod murmur;

pub use hasher::{cid_for, verify_cid, ContentHasher, HasherError, HasherResult};
pub use murmur::{murmur3_x64_128, murmur3_x64_64};
