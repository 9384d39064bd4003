use bytes::Bytes;
use dagfs_codec::{pb, PbLink, UnixFsData};
use dagfs_store::{AbortOptions, BlockService, PutOptions};
use dagfs_types::{Cid, CidVersion, Codec, HashAlg};
use serde::{Deserialize, Serialize};

use crate::error::UnixFsResult;
use crate::node::LoadedNode;

/// CID settings for newly written nodes.
///
/// dag-pb nodes use `cid_version` only when it can express the hash:
/// CIDv0 implies sha2-256, so any other hash writes CIDv1. Raw leaves are
/// always CIDv1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CidOptions {
    pub cid_version: CidVersion,
    pub hash_alg: HashAlg,
}

impl Default for CidOptions {
    fn default() -> Self {
        Self {
            cid_version: CidVersion::V0,
            hash_alg: HashAlg::Sha2_256,
        }
    }
}

impl CidOptions {
    pub fn new(cid_version: CidVersion, hash_alg: HashAlg) -> Self {
        Self {
            cid_version,
            hash_alg,
        }
    }

    /// Put options for a block of `codec`.
    pub fn put_options(&self, codec: Codec) -> PutOptions {
        let version = match (codec, self.cid_version, self.hash_alg) {
            (Codec::DagPb, CidVersion::V0, HashAlg::Sha2_256) => CidVersion::V0,
            _ => CidVersion::V1,
        };
        PutOptions::new(codec, self.hash_alg, version)
    }
}

/// Handle for reading and writing UnixFS nodes.
///
/// Bundles the block service with the abort options and CID settings of
/// the current operation. Cloning is cheap.
#[derive(Clone)]
pub struct Dag {
    blocks: BlockService,
    abort: AbortOptions,
    cid: CidOptions,
}

impl Dag {
    pub fn new(blocks: BlockService) -> Self {
        Self {
            blocks,
            abort: AbortOptions::default(),
            cid: CidOptions::default(),
        }
    }

    pub fn with_abort(mut self, abort: AbortOptions) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_cid_options(mut self, cid: CidOptions) -> Self {
        self.cid = cid;
        self
    }

    pub fn blocks(&self) -> &BlockService {
        &self.blocks
    }

    pub fn abort(&self) -> &AbortOptions {
        &self.abort
    }

    pub fn cid_options(&self) -> CidOptions {
        self.cid
    }

    /// Fetch a block, honouring the abort options.
    pub async fn get(&self, cid: &Cid) -> UnixFsResult<Bytes> {
        self.abort.check()?;
        Ok(self.blocks.get(cid, &self.abort).await?)
    }

    /// Fetch and decode a node.
    pub async fn load(&self, cid: &Cid) -> UnixFsResult<LoadedNode> {
        let bytes = self.get(cid).await?;
        LoadedNode::decode(*cid, bytes)
    }

    /// Write a dag-pb node. Returns its CID and the cumulative size a
    /// parent link should record.
    pub async fn put_node(&self, data: &UnixFsData, links: Vec<PbLink>) -> UnixFsResult<(Cid, u64)> {
        let linked: u64 = links.iter().map(|l| l.size.unwrap_or(0)).sum();
        let bytes = pb::encode(pb::node(Some(data.encode()?), links));
        let tsize = bytes.len() as u64 + linked;
        let cid = self
            .blocks
            .put(bytes, &self.cid.put_options(Codec::DagPb))
            .await?;
        Ok((cid, tsize))
    }

    /// Write a raw leaf.
    pub async fn put_raw(&self, data: Bytes) -> UnixFsResult<(Cid, u64)> {
        let tsize = data.len() as u64;
        let cid = self
            .blocks
            .put(data, &self.cid.put_options(Codec::Raw))
            .await?;
        Ok((cid, tsize))
    }
}

impl std::fmt::Debug for Dag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dag").field("cid", &self.cid).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v0_needs_sha2() {
        let opts = CidOptions::new(CidVersion::V0, HashAlg::Blake3);
        assert_eq!(opts.put_options(Codec::DagPb).cid_version, CidVersion::V1);

        let opts = CidOptions::default();
        assert_eq!(opts.put_options(Codec::DagPb).cid_version, CidVersion::V0);
        assert_eq!(opts.put_options(Codec::Raw).cid_version, CidVersion::V1);
    }

    #[tokio::test]
    async fn empty_directory_has_well_known_cid() {
        let dag = Dag::new(BlockService::in_memory());
        let (cid, tsize) = dag.put_node(&UnixFsData::directory(), vec![]).await.unwrap();
        assert_eq!(cid.to_string(), "QmUNLLsPACCz1vLxQVkXqqLX5R1X345qqfHbsf67hvA3Nn");
        assert_eq!(tsize, 4);
    }
}
