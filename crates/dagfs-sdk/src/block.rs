//! Raw block access.

use bytes::Bytes;
use dagfs_pin::PinAddOptions;
use dagfs_store::{AbortOptions, BlockStat, PutOptions, StoreError};
use dagfs_types::{Cid, CidVersion, Codec, HashAlg};
use tracing::debug;

use crate::error::{SdkError, SdkResult};
use crate::node::Node;

/// How [`BlockApi::put`] names a block.
#[derive(Clone, Debug, Default)]
pub struct BlockPutOptions {
    /// Defaults to `raw`.
    pub codec: Option<Codec>,
    /// Defaults to sha2-256.
    pub hash_alg: Option<HashAlg>,
    /// Defaults to CIDv0 for dag-pb hashed with sha2-256, CIDv1 otherwise.
    pub cid_version: Option<CidVersion>,
    /// Pin the block recursively once stored.
    pub pin: bool,
    pub abort: AbortOptions,
}

impl BlockPutOptions {
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_hash_alg(mut self, alg: HashAlg) -> Self {
        self.hash_alg = Some(alg);
        self
    }

    pub fn with_cid_version(mut self, version: CidVersion) -> Self {
        self.cid_version = Some(version);
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pin = true;
        self
    }

    fn put_options(&self) -> PutOptions {
        let codec = self.codec.unwrap_or(Codec::Raw);
        let hash_alg = self.hash_alg.unwrap_or(HashAlg::Sha2_256);
        let cid_version = self.cid_version.unwrap_or(match (codec, hash_alg) {
            (Codec::DagPb, HashAlg::Sha2_256) => CidVersion::V0,
            _ => CidVersion::V1,
        });
        PutOptions::new(codec, hash_alg, cid_version)
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockRmOptions {
    /// Delete pinned blocks too, and treat missing blocks as removed.
    pub force: bool,
    pub abort: AbortOptions,
}

impl BlockRmOptions {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

/// Block operations of a [`Node`].
pub struct BlockApi<'a> {
    node: &'a Node,
}

impl<'a> BlockApi<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Store `data` and return its CID. Storing the same bytes twice
    /// returns the same CID and keeps one copy.
    pub async fn put(&self, data: impl Into<Bytes>, opts: &BlockPutOptions) -> SdkResult<Cid> {
        let abort = self.node.abort_or_default(&opts.abort);
        let _gc = self.node.blocks().gc_lock().writer().await;
        let cid = self.node.blocks().put(data, &opts.put_options()).await?;
        if opts.pin {
            let pin = PinAddOptions {
                abort,
                ..PinAddOptions::recursive()
            };
            self.node.pinner().add(&cid, &pin).await?;
        }
        Ok(cid)
    }

    pub async fn get(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<Bytes> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.blocks().get(cid, &abort).await?)
    }

    pub async fn stat(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<BlockStat> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.blocks().stat(cid, &abort).await?)
    }

    /// Delete blocks. Each CID gets its own result; one failure does not
    /// stop the rest.
    ///
    /// Without `force`, pinned blocks (directly, recursively or
    /// indirectly) are refused with [`SdkError::Pinned`] and missing ones
    /// report not found.
    pub async fn rm(&self, cids: &[Cid], opts: &BlockRmOptions) -> Vec<(Cid, SdkResult<()>)> {
        let abort = self.node.abort_or_default(&opts.abort);
        let mut out = Vec::with_capacity(cids.len());
        for cid in cids {
            let result = self.rm_one(cid, opts.force, &abort).await;
            out.push((*cid, result));
        }
        out
    }

    async fn rm_one(&self, cid: &Cid, force: bool, abort: &AbortOptions) -> SdkResult<()> {
        abort.check()?;
        if !force && self.node.pinner().is_pinned(cid, abort).await?.is_some() {
            return Err(SdkError::Pinned(*cid));
        }
        let deleted = self.node.blocks().delete(cid)?;
        if !deleted && !force {
            return Err(StoreError::NotFound(*cid).into());
        }
        debug!(%cid, deleted, "block rm");
        Ok(())
    }
}
