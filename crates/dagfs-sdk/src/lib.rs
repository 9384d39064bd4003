//! High-level API for dagfs.
//!
//! A [`Node`] ties the subsystems together: a block service over an
//! in-memory or on-disk store, the pin set, and the mutable file system.
//! Its sub-APIs mirror the usual command groups:
//!
//! - [`Node::block`] -- raw blocks
//! - [`Node::dag`] -- structured values in dag-cbor, dag-json or dag-pb
//! - [`Node::object`] -- low-level dag-pb nodes and patches
//! - [`Node::pin`] -- pins
//! - [`Node::files`] -- the MFS
//! - [`Node::add`], [`Node::cat`], [`Node::ls`], [`Node::get`] -- UnixFS
//!   import and export
//! - [`Node::repo_gc`] -- garbage collection

pub mod block;
pub mod config;
pub mod dag;
pub mod error;
pub mod node;
pub mod object;
pub mod pin;
pub mod unixfs;

pub use block::{BlockApi, BlockPutOptions, BlockRmOptions};
pub use config::{NodeConfig, UnixFsDefaults, CONFIG_FILE};
pub use dag::{DagApi, DagGetOptions, DagPutOptions, DagResolution, DagValue};
pub use error::{SdkError, SdkResult};
pub use node::{Node, BLOCKS_DIR};
pub use object::{ObjectApi, ObjectStat, ObjectTemplate};
pub use pin::PinApi;
pub use unixfs::{AddOptions, ExportedEntry, ListedEntry};

// Re-export key types
pub use dagfs_codec::{Ipld, PbLink, PbNode};
pub use dagfs_mfs::{
    ChmodOptions, Content, CpOptions, FileStat, Files, Layout, LsEntry, LsOptions, MkdirOptions,
    ModeSpec, MvOptions, ReadOptions, RmOptions, StatOptions, TouchOptions, WriteOptions,
};
pub use dagfs_pin::{GcReport, Pin, PinAddOptions, PinEntry, PinFilter, PinMode, PinStatus};
pub use dagfs_store::{AbortOptions, BlockStat};
pub use dagfs_types::{
    parse_cid, to_v0, to_v1, Cid, CidVersion, Codec, ErrorKind, HashAlg, Mtime,
};
pub use dagfs_unixfs::{ImportEntry, ImportedEntry, NodeKind};
