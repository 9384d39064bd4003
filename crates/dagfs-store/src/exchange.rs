use async_trait::async_trait;
use bytes::Bytes;
use dagfs_types::Cid;

use crate::error::StoreResult;

/// Source of blocks that are not held locally.
///
/// A networked node plugs its block-exchange protocol in here. The block
/// service verifies whatever comes back before storing it, so an exchange
/// does not need to trust its peers.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Ask peers for a block. `Ok(None)` means nobody had it.
    async fn want_block(&self, cid: &Cid) -> StoreResult<Option<Bytes>>;

    /// Tell the exchange that blocks became available locally so it can
    /// serve them or stop asking for them.
    async fn notify_new_blocks(&self, _cids: &[Cid]) {}

    /// Whether the exchange can reach any peers at all.
    fn is_online(&self) -> bool;
}

/// Exchange for a node with no peers. Never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineExchange;

#[async_trait]
impl Exchange for OfflineExchange {
    async fn want_block(&self, _cid: &Cid) -> StoreResult<Option<Bytes>> {
        Ok(None)
    }

    fn is_online(&self) -> bool {
        false
    }
}
