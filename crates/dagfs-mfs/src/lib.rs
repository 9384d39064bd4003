//! Mutable file system for dagfs.
//!
//! A path-addressed view over immutable UnixFS DAGs. The whole tree hangs
//! off one root CID; every mutation resolves paths from the current root,
//! writes new nodes for the changed entry and each of its ancestors, and
//! then repoints the root in a single step. Mutations are serialized by a
//! write lock. Reads take a snapshot of the root and never wait on
//! writers.
//!
//! # Modules
//!
//! - [`files`] -- the [`Files`] handle and its operations
//! - [`chmod`] -- numeric and symbolic (`u+x`, `go-w`, `a=rX`) modes
//! - [`path`] -- `/a/b` and `/ipfs/<cid>/a` paths
//! - [`options`] -- per-call options
//! - [`root`] -- persistence of the root pointer

pub mod chmod;
mod edit;
pub mod error;
pub mod files;
pub mod options;
pub mod path;
pub mod root;

pub use chmod::ModeSpec;
pub use error::{FilesError, FilesResult};
pub use files::{Content, Files, FilesConfig, FileStat, LsEntry};
pub use options::{
    ChmodOptions, CpOptions, Layout, LsOptions, MkdirOptions, MvOptions, ReadOptions, RmOptions,
    StatOptions, TouchOptions, WriteOptions,
};
pub use path::FilesPath;
pub use root::{FsRootStore, InMemoryRootStore, RootStore};
