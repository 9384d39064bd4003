//! UnixFS for dagfs.
//!
//! Files and directories are trees of dag-pb nodes. Every operation here
//! is copy-on-write: it reads existing blocks through a [`Dag`] handle and
//! returns the CID of a new subtree, never touching a stored block.
//!
//! # Components
//!
//! - [`Dag`] -- block access plus the CID settings new nodes are written with
//! - [`FileBuilder`] -- fixed-size chunking into a balanced tree
//! - [`FileReader`] -- pull reader honouring offset and length
//! - [`Dag::overwrite_file`] -- partial rewrites that keep untouched leaves
//! - Directory engine -- basic directories and HAMT shards behind one API
//!   ([`Dag::dir_insert`], [`Dag::dir_remove`], [`Dag::dir_lookup`],
//!   [`DirectoryLister`])
//! - [`import`] -- one-pass import of a whole tree
//! - [`resolve_path`] -- `/ipfs/<cid>/a/b` style lookups
//!
//! # Determinism
//!
//! A HAMT's shape is a pure function of its entry set: a slot holding one
//! entry is a leaf link and a slot holding several is a sub-shard built
//! from them. Inserting, removing, and importing all preserve that form,
//! so the same entries always produce the same CID no matter how they got
//! there.

pub mod dag;
pub mod directory;
pub mod error;
pub mod file;
pub mod hamt;
pub mod importer;
pub mod lister;
pub mod metadata;
pub mod node;
pub mod path;
pub mod reader;
pub mod rewrite;

pub use dag::{CidOptions, Dag};
pub use directory::{validate_name, DirLink, DEFAULT_SHARD_SPLIT_THRESHOLD};
pub use error::{UnixFsError, UnixFsResult};
pub use file::{BuiltFile, FileBuilder, FileOptions, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CHILDREN};
pub use hamt::HAMT_FANOUT;
pub use importer::{import, ImportContent, ImportEntry, ImportOptions, ImportedEntry};
pub use lister::DirectoryLister;
pub use metadata::MetadataUpdate;
pub use node::{LoadedNode, NodeKind};
pub use path::{parse_ipfs_path, resolve_path, IpfsPath};
pub use reader::FileReader;
