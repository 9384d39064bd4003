use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dagfs_crypto::{cid_for, verify_cid};
use dagfs_types::{codec_of, hash_alg_of, Cid, CidVersion, Codec, HashAlg};
use tracing::{debug, warn};

use crate::abort::AbortOptions;
use crate::error::{StoreError, StoreResult};
use crate::exchange::{Exchange, OfflineExchange};
use crate::gc_lock::GcLock;
use crate::memory::InMemoryBlockStore;
use crate::traits::BlockStore;

/// How a block put derives its CID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PutOptions {
    pub codec: Codec,
    pub hash_alg: HashAlg,
    pub cid_version: CidVersion,
}

impl Default for PutOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Raw,
            hash_alg: HashAlg::Sha2_256,
            cid_version: CidVersion::V1,
        }
    }
}

impl PutOptions {
    pub fn new(codec: Codec, hash_alg: HashAlg, cid_version: CidVersion) -> Self {
        Self {
            codec,
            hash_alg,
            cid_version,
        }
    }
}

/// Size of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockStat {
    pub cid: Cid,
    pub size: u64,
}

/// Async front door to block storage.
///
/// Verifies every block before it reaches the backend, answers identity
/// CIDs from the CID itself, and asks the [`Exchange`] for blocks that
/// are not held locally.
#[derive(Clone)]
pub struct BlockService {
    store: Arc<dyn BlockStore>,
    exchange: Arc<dyn Exchange>,
    gc_lock: GcLock,
}

impl BlockService {
    /// Service over `store` with no peers.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self::with_exchange(store, Arc::new(OfflineExchange))
    }

    pub fn with_exchange(store: Arc<dyn BlockStore>, exchange: Arc<dyn Exchange>) -> Self {
        Self {
            store,
            exchange,
            gc_lock: GcLock::new(),
        }
    }

    /// Offline service over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBlockStore::new()))
    }

    /// The backend this service writes to.
    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// The lock shared by every writer of this service and the collector.
    pub fn gc_lock(&self) -> &GcLock {
        &self.gc_lock
    }

    pub fn is_online(&self) -> bool {
        self.exchange.is_online()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch a block, asking the exchange if it is not held locally.
    pub async fn get(&self, cid: &Cid, opts: &AbortOptions) -> StoreResult<Bytes> {
        if let Some(data) = self.get_local(cid)? {
            return Ok(data);
        }
        opts.run(self.fetch_remote(cid)).await
    }

    /// Fetch a block without touching the network.
    pub fn get_local(&self, cid: &Cid) -> StoreResult<Option<Bytes>> {
        if let Some(inline) = identity_content(cid) {
            return Ok(Some(inline));
        }
        self.store.get(cid)
    }

    /// Whether the block can be read without the network.
    pub fn has_local(&self, cid: &Cid) -> StoreResult<bool> {
        if is_identity(cid) {
            return Ok(true);
        }
        self.store.has(cid)
    }

    /// Size of a block, fetching it if needed.
    pub async fn stat(&self, cid: &Cid, opts: &AbortOptions) -> StoreResult<BlockStat> {
        if let Some(inline) = identity_content(cid) {
            return Ok(BlockStat {
                cid: *cid,
                size: inline.len() as u64,
            });
        }
        if let Some(size) = self.store.size(cid)? {
            return Ok(BlockStat { cid: *cid, size });
        }
        let data = self.get(cid, opts).await?;
        Ok(BlockStat {
            cid: *cid,
            size: data.len() as u64,
        })
    }

    /// Every locally stored block, as CIDv1.
    pub fn list(&self) -> StoreResult<Vec<Cid>> {
        self.store.list()
    }

    async fn fetch_remote(&self, cid: &Cid) -> StoreResult<Bytes> {
        if !self.exchange.is_online() {
            return Err(StoreError::NotFound(*cid));
        }
        let data = self
            .exchange
            .want_block(cid)
            .await?
            .ok_or(StoreError::NotFound(*cid))?;
        if !verify_cid(cid, &data)? {
            warn!(%cid, "exchange returned bytes that do not match the requested CID");
            return Err(StoreError::HashMismatch {
                expected: *cid,
                computed: recompute(cid, &data)?,
            });
        }
        self.store.put(cid, data.clone())?;
        debug!(%cid, bytes = data.len(), "cached block from exchange");
        Ok(data)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Hash `data` per `opts` and store it. Idempotent.
    pub async fn put(&self, data: impl Into<Bytes>, opts: &PutOptions) -> StoreResult<Cid> {
        let data = data.into();
        let cid = cid_for(&data, opts.codec, opts.hash_alg, opts.cid_version)
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        self.put_verified(cid, data).await?;
        Ok(cid)
    }

    /// Store `data` under a caller supplied CID after checking it hashes
    /// to that CID.
    pub async fn put_with_cid(&self, cid: &Cid, data: impl Into<Bytes>) -> StoreResult<Cid> {
        let data = data.into();
        codec_of(cid)?;
        if !verify_cid(cid, &data)? {
            return Err(StoreError::HashMismatch {
                expected: *cid,
                computed: recompute(cid, &data)?,
            });
        }
        self.put_verified(*cid, data).await?;
        Ok(*cid)
    }

    async fn put_verified(&self, cid: Cid, data: Bytes) -> StoreResult<()> {
        if is_identity(&cid) {
            return Ok(());
        }
        let len = data.len();
        if self.store.put(&cid, data)? {
            debug!(%cid, bytes = len, "put block");
            self.exchange.notify_new_blocks(&[cid]).await;
        }
        Ok(())
    }

    /// Remove a block from local storage. Returns `true` if it existed.
    ///
    /// Pin checks are the caller's concern.
    pub fn delete(&self, cid: &Cid) -> StoreResult<bool> {
        let existed = self.store.delete(cid)?;
        if existed {
            debug!(%cid, "deleted block");
        }
        Ok(existed)
    }
}

impl fmt::Debug for BlockService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockService")
            .field("online", &self.exchange.is_online())
            .finish()
    }
}

/// Whether the CID embeds its content in an identity multihash.
pub fn is_identity(cid: &Cid) -> bool {
    cid.hash().code() == HashAlg::Identity.code()
}

fn identity_content(cid: &Cid) -> Option<Bytes> {
    is_identity(cid).then(|| Bytes::copy_from_slice(cid.hash().digest()))
}

fn recompute(cid: &Cid, data: &[u8]) -> StoreResult<Cid> {
    let codec = codec_of(cid)?;
    let alg = hash_alg_of(cid)?;
    let version = dagfs_types::cid_version(cid);
    Ok(cid_for(data, codec, alg, version)?)
}
