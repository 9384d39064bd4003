use dagfs_pin::{Pin, PinAddOptions, PinEntry, PinFilter, PinStatus};
use dagfs_store::AbortOptions;
use dagfs_types::Cid;

use crate::error::SdkResult;
use crate::node::Node;

/// Pin operations of a [`Node`].
pub struct PinApi<'a> {
    node: &'a Node,
}

impl<'a> PinApi<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self { node }
    }

    /// Pin `cid`. Holds the writer side of the GC lock so a collection
    /// cannot run between fetching the DAG and recording the pin.
    pub async fn add(&self, cid: &Cid, opts: &PinAddOptions) -> SdkResult<Pin> {
        let opts = PinAddOptions {
            abort: self.node.abort_or_default(&opts.abort),
            ..opts.clone()
        };
        let _gc = self.node.blocks().gc_lock().writer().await;
        Ok(self.node.pinner().add(cid, &opts).await?)
    }

    /// Remove one pin; any failure fails the call.
    pub async fn rm(&self, cid: &Cid, recursive: bool, abort: &AbortOptions) -> SdkResult<Pin> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.pinner().rm(cid, recursive, &abort).await?)
    }

    /// Remove several pins, with a result per CID.
    pub async fn rm_all(
        &self,
        cids: &[Cid],
        recursive: bool,
        abort: &AbortOptions,
    ) -> SdkResult<Vec<(Cid, SdkResult<Pin>)>> {
        let abort = self.node.abort_or_default(abort);
        let results = self.node.pinner().rm_all(cids, recursive, &abort).await?;
        Ok(results
            .into_iter()
            .map(|(cid, result)| (cid, result.map_err(Into::into)))
            .collect())
    }

    pub async fn ls(&self, filter: PinFilter, abort: &AbortOptions) -> SdkResult<Vec<PinEntry>> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.pinner().ls(filter, &abort).await?)
    }

    /// Status of specific CIDs; fails on the first one that is not pinned.
    pub async fn ls_cids(
        &self,
        cids: &[Cid],
        filter: PinFilter,
        abort: &AbortOptions,
    ) -> SdkResult<Vec<PinEntry>> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.pinner().ls_cids(cids, filter, &abort).await?)
    }

    pub async fn is_pinned(&self, cid: &Cid, abort: &AbortOptions) -> SdkResult<Option<PinStatus>> {
        let abort = self.node.abort_or_default(abort);
        Ok(self.node.pinner().is_pinned(cid, &abort).await?)
    }
}
