//! Decoded UnixFS nodes.

use std::fmt;

use bytes::Bytes;
use dagfs_codec::{pb, DataType, PbLink, UnixFsData};
use dagfs_types::{codec_of, Cid, Codec, Mtime, DEFAULT_FILE_MODE};
use serde::{Deserialize, Serialize};

use crate::error::{UnixFsError, UnixFsResult};

/// What a node is, as far as the file system is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    /// A raw-codec block: file content with no UnixFS wrapper.
    Raw,
    File,
    Directory,
    HamtShardedDirectory,
    Symlink,
}

impl NodeKind {
    pub fn is_directory(self) -> bool {
        matches!(self, Self::Directory | Self::HamtShardedDirectory)
    }

    pub fn is_file(self) -> bool {
        matches!(self, Self::Raw | Self::File)
    }

    /// The user-facing type: `file`, `directory` or `symlink`.
    pub fn entry_type(self) -> &'static str {
        match self {
            Self::Raw | Self::File => "file",
            Self::Directory | Self::HamtShardedDirectory => "directory",
            Self::Symlink => "symlink",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::File => "file",
            Self::Directory => "directory",
            Self::HamtShardedDirectory => "hamt-sharded-directory",
            Self::Symlink => "symlink",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub enum NodeBody {
    Raw(Bytes),
    Pb { links: Vec<PbLink>, data: UnixFsData },
}

/// A block decoded as a UnixFS node.
#[derive(Clone, Debug)]
pub struct LoadedNode {
    pub cid: Cid,
    /// Encoded length of the block itself.
    pub block_size: u64,
    pub body: NodeBody,
}

impl LoadedNode {
    pub fn decode(cid: Cid, bytes: Bytes) -> UnixFsResult<Self> {
        let block_size = bytes.len() as u64;
        let body = match codec_of(&cid)? {
            Codec::Raw => NodeBody::Raw(bytes),
            Codec::DagPb => {
                let node = pb::decode(&bytes)?;
                let data = node.data.as_deref().ok_or_else(|| UnixFsError::Unsupported {
                    cid,
                    reason: "dag-pb node carries no UnixFS data".into(),
                })?;
                NodeBody::Pb {
                    data: UnixFsData::decode(data)?,
                    links: node.links,
                }
            }
            other => {
                return Err(UnixFsError::Unsupported {
                    cid,
                    reason: format!("{} blocks are not UnixFS", other.name()),
                })
            }
        };
        Ok(Self {
            cid,
            block_size,
            body,
        })
    }

    pub fn kind(&self) -> UnixFsResult<NodeKind> {
        match &self.body {
            NodeBody::Raw(_) => Ok(NodeKind::Raw),
            NodeBody::Pb { data, .. } => match data.data_type {
                DataType::Raw | DataType::File => Ok(NodeKind::File),
                DataType::Directory => Ok(NodeKind::Directory),
                DataType::HamtShard => Ok(NodeKind::HamtShardedDirectory),
                DataType::Symlink => Ok(NodeKind::Symlink),
                DataType::Metadata => Err(UnixFsError::Unsupported {
                    cid: self.cid,
                    reason: "metadata nodes are not supported".into(),
                }),
            },
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind().is_ok_and(NodeKind::is_directory)
    }

    pub fn links(&self) -> &[PbLink] {
        match &self.body {
            NodeBody::Raw(_) => &[],
            NodeBody::Pb { links, .. } => links,
        }
    }

    pub fn data(&self) -> Option<&UnixFsData> {
        match &self.body {
            NodeBody::Raw(_) => None,
            NodeBody::Pb { data, .. } => Some(data),
        }
    }

    /// Logical content size; zero for directories.
    pub fn file_size(&self) -> u64 {
        match &self.body {
            NodeBody::Raw(bytes) => bytes.len() as u64,
            NodeBody::Pb { data, .. } => data.file_size(),
        }
    }

    /// Block size plus the recorded sizes of all linked subtrees.
    pub fn cumulative_size(&self) -> u64 {
        self.block_size + self.links().iter().map(|l| l.size.unwrap_or(0)).sum::<u64>()
    }

    /// Effective permission bits.
    pub fn mode(&self) -> u32 {
        self.data().map_or(DEFAULT_FILE_MODE, UnixFsData::mode)
    }

    pub fn mtime(&self) -> Option<Mtime> {
        self.data().and_then(|d| d.mtime)
    }

    /// Fail with `NotADirectory` unless this node is a directory.
    pub fn expect_directory(&self) -> UnixFsResult<NodeKind> {
        match self.kind()? {
            kind if kind.is_directory() => Ok(kind),
            _ => Err(UnixFsError::NotADirectory(self.cid)),
        }
    }

    /// Fail with `IsADirectory` unless this node holds file content.
    pub fn expect_file(&self) -> UnixFsResult<NodeKind> {
        match self.kind()? {
            kind if kind.is_directory() => Err(UnixFsError::IsADirectory(self.cid)),
            NodeKind::Symlink => Err(UnixFsError::Unsupported {
                cid: self.cid,
                reason: "symlinks have no content".into(),
            }),
            kind => Ok(kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagfs_crypto::cid_for;
    use dagfs_types::{CidVersion, HashAlg};

    fn decode(codec: Codec, bytes: Vec<u8>) -> UnixFsResult<LoadedNode> {
        let cid = cid_for(&bytes, codec, HashAlg::Sha2_256, CidVersion::V1).unwrap();
        LoadedNode::decode(cid, Bytes::from(bytes))
    }

    #[test]
    fn raw_block_is_a_file() {
        let node = decode(Codec::Raw, b"hello".to_vec()).unwrap();
        assert_eq!(node.kind().unwrap(), NodeKind::Raw);
        assert_eq!(node.file_size(), 5);
        assert_eq!(node.cumulative_size(), 5);
        assert_eq!(node.mode(), DEFAULT_FILE_MODE);
        assert!(node.expect_directory().is_err());
    }

    #[test]
    fn directory_node() {
        let bytes = pb::encode(pb::node(Some(UnixFsData::directory().encode().unwrap()), vec![]));
        let node = decode(Codec::DagPb, bytes).unwrap();
        assert_eq!(node.kind().unwrap(), NodeKind::Directory);
        assert_eq!(node.mode(), 0o755);
        assert!(matches!(node.expect_file(), Err(UnixFsError::IsADirectory(_))));
    }

    #[test]
    fn dag_pb_without_data_is_unsupported() {
        let bytes = pb::encode(pb::node(None, vec![]));
        assert!(matches!(
            decode(Codec::DagPb, bytes),
            Err(UnixFsError::Unsupported { .. })
        ));
    }

    #[test]
    fn cbor_is_not_unixfs() {
        assert!(decode(Codec::DagCbor, vec![0xa0]).is_err());
    }

    #[test]
    fn kind_names() {
        assert_eq!(NodeKind::HamtShardedDirectory.to_string(), "hamt-sharded-directory");
        assert_eq!(NodeKind::HamtShardedDirectory.entry_type(), "directory");
        assert_eq!(NodeKind::Raw.entry_type(), "file");
    }
}
