//! Block codecs for dagfs.
//!
//! Every block is interpreted through one of four codecs:
//!
//! - `raw` -- opaque bytes
//! - `dag-pb` -- [`PbNode`] with `Data` and named `Links`, carrying a
//!   [`UnixFsData`] message for files, directories, and HAMT shards
//! - `dag-cbor` / `dag-json` -- arbitrary [`Ipld`] values with inline links
//!
//! Encodings are canonical: the same logical node always yields the same
//! bytes, so the same CID. [`links`] and [`to_ipld`] give a uniform view
//! over any block for DAG walks, and [`resolve`] follows a path across
//! blocks.

pub mod error;
pub mod ipld;
pub mod pb;
pub mod resolve;
pub mod structured;
pub mod unixfs;

pub use error::{CodecError, CodecResult};
pub use ipld::{from_ipld, links, to_ipld};
pub use ipld_core::ipld::Ipld;
pub use pb::{PbLink, PbNode};
pub use resolve::{resolve, Resolution};
pub use unixfs::{DataType, UnixFsData, HAMT_HASH_TYPE};
