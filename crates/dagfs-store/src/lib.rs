//! Content-addressed block storage for dagfs.
//!
//! A block is an immutable byte string named by the CID of its contents.
//! This crate stores blocks and nothing else: it never interprets what a
//! block encodes.
//!
//! # Layers
//!
//! - [`BlockStore`] -- synchronous key/value backend keyed by CIDv1 bytes,
//!   implemented by [`InMemoryBlockStore`] and [`FsBlockStore`]
//! - [`BlockService`] -- the async front door: hashes and verifies puts,
//!   answers identity CIDs without storage, and falls back to an
//!   [`Exchange`] for blocks that are not held locally
//! - [`AbortOptions`] -- caller supplied timeout and cancellation signal
//! - [`GcLock`] -- shared lock ordering writers against garbage collection
//!
//! # Rules
//!
//! 1. A stored block always hashes to its CID. Backends trust the service
//!    to verify; the service never stores unverified bytes.
//! 2. CIDv0 and CIDv1 naming the same multihash address the same entry.
//! 3. Puts are idempotent.

pub mod abort;
pub mod error;
pub mod exchange;
pub mod fs;
pub mod gc_lock;
pub mod memory;
pub mod service;
pub mod traits;

pub use abort::{AbortOptions, Aborted};
pub use error::{StoreError, StoreResult};
pub use exchange::{Exchange, OfflineExchange};
pub use fs::FsBlockStore;
pub use gc_lock::{CollectorGuard, GcLock, WriterGuard};
pub use memory::InMemoryBlockStore;
pub use service::{is_identity, BlockService, BlockStat, PutOptions};
pub use traits::BlockStore;
